//! Application configuration for tabreport.
//!
//! User config lives at `~/.tabreport/tabreport.toml`.
//! CLI flags override config file values, which override defaults.
//! The object-store API key is never stored in the file; only the name of the
//! environment variable holding it is.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabreportError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tabreport.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tabreport";

// ---------------------------------------------------------------------------
// Config structs (matching tabreport.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Object store and FIFO settings.
    #[serde(default)]
    pub bucket: BucketConfig,

    /// Bucket poller settings.
    #[serde(default)]
    pub poller: PollerConfig,

    /// Wire protocol peer settings.
    #[serde(default)]
    pub wire: WireConfig,

    /// Webhook callback settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Enrichment lookup service settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Field-mapping table and version.
    #[serde(default)]
    pub mapper: MapperConfig,

    /// Document service settings.
    #[serde(default)]
    pub document: DocumentConfig,
}

/// `[bucket]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Object store base endpoint (e.g., `https://xyz.supabase.co`).
    #[serde(default)]
    pub endpoint: String,

    /// Name of the env var holding the store API key (never the key itself).
    #[serde(default = "default_store_key_env")]
    pub api_key_env: String,

    /// Bucket holding the incoming CSV objects.
    #[serde(default = "default_bucket_name")]
    pub name: String,

    /// Maximum CSV objects retained before FIFO eviction.
    #[serde(default = "default_max_objects")]
    pub max_objects: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key_env: default_store_key_env(),
            name: default_bucket_name(),
            max_objects: default_max_objects(),
        }
    }
}

fn default_store_key_env() -> String {
    "TABREPORT_STORE_KEY".into()
}
fn default_bucket_name() -> String {
    "tabreport-data".into()
}
fn default_max_objects() -> usize {
    3
}

/// `[poller]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between bucket polls.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    10
}

/// `[wire]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConfig {
    /// Document service host.
    #[serde(default = "default_wire_host")]
    pub host: String,

    /// Document service TCP port.
    #[serde(default = "default_wire_port")]
    pub port: u16,

    /// Connect/read timeout in seconds.
    #[serde(default = "default_wire_timeout")]
    pub timeout_secs: u64,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            host: default_wire_host(),
            port: default_wire_port(),
            timeout_secs: default_wire_timeout(),
        }
    }
}

fn default_wire_host() -> String {
    "127.0.0.1".into()
}
fn default_wire_port() -> u16 {
    8888
}
fn default_wire_timeout() -> u64 {
    30
}

/// `[webhook]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Callback URL sent with each submission.
    #[serde(default = "default_webhook_url")]
    pub url: String,

    /// Port the admin/webhook HTTP listener binds on the poller side.
    #[serde(default = "default_webhook_port")]
    pub listen_port: u16,

    /// Notification POST timeout in seconds.
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: default_webhook_url(),
            listen_port: default_webhook_port(),
            timeout_secs: default_webhook_timeout(),
        }
    }
}

fn default_webhook_url() -> String {
    "http://127.0.0.1:5001/webhook".into()
}
fn default_webhook_port() -> u16 {
    5001
}
fn default_webhook_timeout() -> u64 {
    10
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Lookup service base URL.
    #[serde(default = "default_enrichment_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_enrichment_timeout")]
    pub timeout_secs: u64,

    /// Maximum lookup attempts per query variant.
    #[serde(default = "default_enrichment_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit in milliseconds (attempt index × unit).
    #[serde(default = "default_backoff_unit")]
    pub backoff_unit_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_url: default_enrichment_base_url(),
            timeout_secs: default_enrichment_timeout(),
            max_attempts: default_enrichment_attempts(),
            backoff_unit_ms: default_backoff_unit(),
        }
    }
}

fn default_enrichment_base_url() -> String {
    "https://restcountries.com/v3.1".into()
}
fn default_enrichment_timeout() -> u64 {
    15
}
fn default_enrichment_attempts() -> u32 {
    3
}
fn default_backoff_unit() -> u64 {
    500
}

/// `[mapper]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Version tag stamped on every document.
    #[serde(default = "default_mapper_version")]
    pub version: String,

    /// Raw CSV column → canonical field key.
    #[serde(default = "default_mapper_table")]
    pub table: BTreeMap<String, String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            version: default_mapper_version(),
            table: default_mapper_table(),
        }
    }
}

fn default_mapper_version() -> String {
    "1.0".into()
}

fn default_mapper_table() -> BTreeMap<String, String> {
    [
        ("ID_Interno", "IDInterno"),
        ("Nome_Pais", "Nome"),
        ("Regiao", "Continente"),
        ("Populacao_Milhoes", "PopulacaoMilhoes"),
        ("Populacao_Total", "PopulacaoTotal"),
        ("Data_Coleta", "DataColeta"),
        ("Unidade", "Unidade"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// `[document]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Path to the libSQL database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Optional path to a document schema definition. Absence means
    /// well-formedness-only validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            schema_path: None,
        }
    }
}

fn default_db_path() -> String {
    "var/tabreport.db".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.tabreport/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TabreportError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.tabreport/tabreport.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TabreportError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TabreportError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TabreportError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TabreportError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TabreportError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the object-store API key from the configured environment variable.
pub fn resolve_store_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.bucket.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(TabreportError::config(format!(
            "object store API key not found. Set the {var_name} environment variable."
        ))),
    }
}

//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing::info;

use tabreport_bucket::{BucketFifoManager, ObjectStoreClient};
use tabreport_core::{DocumentService, Notifier, Poller, admin_router};
use tabreport_document::DocumentValidator;
use tabreport_enrich::{EnrichmentCache, EnrichmentClient};
use tabreport_shared::config::{
    AppConfig, init_config, load_config, load_config_from, resolve_store_key,
};
use tabreport_storage::Storage;
use tabreport_transform::RecordTransformer;
use tabreport_wire::WireClient;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// tabreport — bucket-to-document ingestion pipeline.
#[derive(Parser)]
#[command(
    name = "tabreport",
    version,
    about = "Poll a CSV bucket, enrich and transform records, and persist report documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a config file (defaults to ~/.tabreport/tabreport.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the bucket poller and the admin/webhook HTTP listener.
    Poller,

    /// Run the document service behind the wire server.
    Serve,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Poller => cmd_poller(cli.config.as_deref()).await,
        Command::Serve => cmd_serve(cli.config.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()).await,
        },
    }
}

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    Ok(match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_poller(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let api_key = resolve_store_key(&config)?;

    let store = ObjectStoreClient::new(&config.bucket.endpoint, &api_key, &config.bucket.name)?;
    let fifo = Arc::new(BucketFifoManager::new(store, config.bucket.max_objects));

    let cache = Arc::new(EnrichmentCache::new());
    let enrich = Arc::new(EnrichmentClient::new(&config.enrichment, cache.clone())?);
    let transformer = RecordTransformer::new(config.mapper.table.clone(), enrich);

    let poller = Poller::new(
        fifo,
        transformer,
        WireClient::new(&config.wire),
        config.mapper.clone(),
        config.webhook.url.clone(),
        Duration::from_secs(config.poller.interval_secs),
    );

    let listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.webhook.listen_port)).await?;
    info!(port = config.webhook.listen_port, "admin listener bound");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, admin_router(cache)).await {
            tracing::error!(error = %e, "admin listener stopped");
        }
    });

    info!(
        bucket = %config.bucket.name,
        wire = format!("{}:{}", config.wire.host, config.wire.port),
        "poller starting"
    );
    poller.run().await;
    Ok(())
}

async fn cmd_serve(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;

    let storage = Arc::new(Storage::open(Path::new(&config.document.db_path)).await?);
    let validator =
        DocumentValidator::from_schema_path(config.document.schema_path.as_deref().map(Path::new))?;
    let notifier = Notifier::new(&config.webhook)?;
    let service = Arc::new(DocumentService::new(storage, validator, notifier));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.wire.port)).await?;
    info!(port = config.wire.port, db = %config.document.db_path, "document service starting");

    tabreport_wire::serve(
        listener,
        Duration::from_secs(config.wire.timeout_secs),
        move |request| {
            let service = service.clone();
            async move { service.process(request).await }
        },
    )
    .await?;
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

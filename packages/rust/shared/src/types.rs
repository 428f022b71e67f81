//! Core domain types for the tabreport pipeline.
//!
//! The wire field names (`id_requisicao`, `dados`, `IDInterno`, …) are the
//! external data contract shared with peer services and are kept verbatim;
//! everything else uses Rust naming.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder substituted for missing or falsy categorical fields.
pub const SENTINEL: &str = "N/A";

/// Placeholder substituted for missing or zero numeric fields.
pub const NUMERIC_SENTINEL: &str = "0";

// ---------------------------------------------------------------------------
// CanonicalRecord
// ---------------------------------------------------------------------------

/// A tabular row after field-mapping and enrichment.
///
/// Every field is optional: a raw column missing from the input is simply
/// absent here, never defaulted. Defaults are applied once, during document
/// construction. Absent fields are omitted from the wire JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Structured internal identifier (`CSV_<NAME_TOKENS>_<n>`).
    #[serde(rename = "IDInterno", default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,

    /// Entity name, also the enrichment lookup key.
    #[serde(rename = "Nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Continent / region from the raw data.
    #[serde(rename = "Continente", default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,

    /// Population in millions, textual as collected.
    #[serde(
        rename = "PopulacaoMilhoes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub population_millions: Option<String>,

    /// Total population, textual as collected.
    #[serde(
        rename = "PopulacaoTotal",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub population_total: Option<String>,

    /// Collection date of the raw row.
    #[serde(rename = "DataColeta", default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<String>,

    /// Measurement unit tag from the raw data.
    #[serde(rename = "Unidade", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    // --- Enrichment fields, merged in by the transformer ---
    /// Capital city from the lookup service.
    #[serde(rename = "Capital", default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<String>,

    /// Subregion from the lookup service.
    #[serde(rename = "Subregiao", default, skip_serializing_if = "Option::is_none")]
    pub subregion: Option<String>,

    /// Currency display name from the lookup service.
    #[serde(rename = "Moeda", default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Population density (population / area).
    #[serde(
        rename = "DensidadePopulacao",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub density: Option<f64>,

    /// Derived area metric (area / 1000, 2 decimals).
    #[serde(rename = "Media30d", default, skip_serializing_if = "Option::is_none")]
    pub avg_30d: Option<f64>,

    /// Derived population metric (population / 1e6, 2 decimals).
    #[serde(rename = "Maximo6m", default, skip_serializing_if = "Option::is_none")]
    pub max_6m: Option<f64>,
}

impl CanonicalRecord {
    /// Assign a mapped value by canonical field key.
    ///
    /// Returns `false` when the key is not part of the canonical schema so
    /// callers can log mapping-table entries that point nowhere.
    pub fn set_mapped(&mut self, canonical_key: &str, value: String) -> bool {
        match canonical_key {
            "IDInterno" => self.internal_id = Some(value),
            "Nome" => self.name = Some(value),
            "Continente" => self.continent = Some(value),
            "PopulacaoMilhoes" => self.population_millions = Some(value),
            "PopulacaoTotal" => self.population_total = Some(value),
            "DataColeta" => self.collected_at = Some(value),
            "Unidade" => self.unit = Some(value),
            _ => return false,
        }
        true
    }

    /// Merge the six enrichment fields into this record.
    pub fn apply_enrichment(&mut self, data: &EnrichmentData) {
        self.capital = Some(data.capital.clone());
        self.subregion = Some(data.subregion.clone());
        self.currency = Some(data.currency.clone());
        self.density = Some(data.density);
        self.avg_30d = Some(data.avg_30d);
        self.max_6m = Some(data.max_6m);
    }
}

// ---------------------------------------------------------------------------
// EnrichmentData
// ---------------------------------------------------------------------------

/// Best-effort data for one entity from the external lookup service,
/// or deterministic synthetic values when the service is unreachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentData {
    /// Area metric: area / 1000, rounded to 2 decimals.
    pub avg_30d: f64,
    /// Population metric: population / 1e6, rounded to 2 decimals.
    pub max_6m: f64,
    /// Capital city, or the sentinel when unknown.
    pub capital: String,
    /// Subregion, or the sentinel when unknown.
    pub subregion: String,
    /// Currency display name, or the sentinel when unknown.
    pub currency: String,
    /// Population density (population / area; 0 when area is 0).
    pub density: f64,
}

// ---------------------------------------------------------------------------
// Wire messages
// ---------------------------------------------------------------------------

/// One submission from the transform stage to the document stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    /// Opaque request identifier correlating the webhook back to this
    /// submission (UUID v4).
    pub id_requisicao: String,

    /// The field-mapping table used to produce `dados` (informational).
    #[serde(default)]
    pub mapper: BTreeMap<String, String>,

    /// Version tag of the mapping table.
    #[serde(default = "default_mapper_version")]
    pub mapper_version: String,

    /// Callback endpoint for the terminal-status notification.
    pub webhook_url: String,

    /// The canonical records to persist.
    #[serde(default)]
    pub dados: Vec<CanonicalRecord>,
}

fn default_mapper_version() -> String {
    "1.0".into()
}

/// Terminal status of one document submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireStatus {
    /// Document built, validated, and persisted.
    #[serde(rename = "OK")]
    Ok,
    /// Document failed validation.
    #[serde(rename = "ERRO_VALIDACAO")]
    ValidationFailed,
    /// Document failed the transactional insert.
    #[serde(rename = "ERRO_PERSISTENCIA")]
    PersistenceFailed,
    /// The request itself could not be processed (malformed frame, bad JSON).
    #[serde(rename = "ERRO")]
    Error,
}

impl std::fmt::Display for WireStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::ValidationFailed => "ERRO_VALIDACAO",
            Self::PersistenceFailed => "ERRO_PERSISTENCIA",
            Self::Error => "ERRO",
        };
        f.write_str(s)
    }
}

/// The single response frame for one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResponse {
    /// Terminal status.
    pub status: WireStatus,

    /// Durable document identifier, present only on `OK`.
    #[serde(
        rename = "documento_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_id: Option<i64>,

    /// Failure detail, present only on failure statuses.
    #[serde(rename = "erro", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WireResponse {
    /// Successful response carrying the persisted document id.
    pub fn ok(document_id: i64) -> Self {
        Self {
            status: WireStatus::Ok,
            document_id: Some(document_id),
            error: None,
        }
    }

    /// Failure response with the given status and diagnostic text.
    pub fn failure(status: WireStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            document_id: None,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Webhook notification
// ---------------------------------------------------------------------------

/// Body of the asynchronous terminal-status callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotification {
    /// Request identifier from the original submission.
    pub id_requisicao: String,
    /// Terminal status reached.
    pub status: WireStatus,
    /// Persisted document id, 0 on failure.
    pub documento_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_omits_absent_fields() {
        let record = CanonicalRecord {
            name: Some("Portugal".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["Nome"], "Portugal");
        assert!(json.get("IDInterno").is_none());
        assert!(json.get("Capital").is_none());
    }

    #[test]
    fn record_wire_keys_roundtrip() {
        let mut record = CanonicalRecord::default();
        assert!(record.set_mapped("IDInterno", "CSV_INDIA_1".into()));
        assert!(record.set_mapped("Nome", "India".into()));
        assert!(!record.set_mapped("ColunaInexistente", "x".into()));

        record.apply_enrichment(&EnrichmentData {
            avg_30d: 3287.26,
            max_6m: 1428.63,
            capital: "New Delhi".into(),
            subregion: "Southern Asia".into(),
            currency: "Indian rupee".into(),
            density: 434.61,
        });

        let json = serde_json::to_string(&record).expect("serialize");
        let parsed: CanonicalRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, record);
        assert!(json.contains("\"DensidadePopulacao\":434.61"));
    }

    #[test]
    fn wire_status_contract_names() {
        assert_eq!(
            serde_json::to_string(&WireStatus::ValidationFailed).unwrap(),
            "\"ERRO_VALIDACAO\""
        );
        assert_eq!(serde_json::to_string(&WireStatus::Ok).unwrap(), "\"OK\"");
        let parsed: WireStatus = serde_json::from_str("\"ERRO_PERSISTENCIA\"").unwrap();
        assert_eq!(parsed, WireStatus::PersistenceFailed);
    }

    #[test]
    fn wire_request_defaults() {
        let json = r#"{
            "id_requisicao": "abc-123",
            "webhook_url": "http://127.0.0.1:5001/webhook"
        }"#;
        let req: WireRequest = serde_json::from_str(json).expect("deserialize");
        assert_eq!(req.mapper_version, "1.0");
        assert!(req.dados.is_empty());
        assert!(req.mapper.is_empty());
    }

    #[test]
    fn response_ok_carries_id_only() {
        let json = serde_json::to_value(WireResponse::ok(42)).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["documento_id"], 42);
        assert!(json.get("erro").is_none());

        let json =
            serde_json::to_value(WireResponse::failure(WireStatus::Error, "short frame")).unwrap();
        assert_eq!(json["status"], "ERRO");
        assert_eq!(json["erro"], "short frame");
        assert!(json.get("documento_id").is_none());
    }
}

//! Typed report tree and its construction from canonical records.
//!
//! Every leaf value is text: the persisted document is a rendering, not a
//! data-interchange format, and downstream consumers treat it as opaque.
//! Defaults are applied here and only here — upstream stages keep absent
//! fields absent.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tabreport_shared::{CanonicalRecord, NUMERIC_SENTINEL, SENTINEL};

/// Tag prefixed to the random validator suffix.
const SERVICE_TAG: &str = "tabreport-document";

/// Tag prefixed to the request-id fragment.
const REQUESTER_TAG: &str = "tabreport-poller";

// ---------------------------------------------------------------------------
// Document tree
// ---------------------------------------------------------------------------

/// Top-level wrapper, serialized as `{"report": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub report: Report,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Build date, `YYYY-MM-DD`.
    pub generated_at: String,
    pub mapper_version: String,
    pub metadata: Metadata,
    pub countries: Vec<CountryNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Service tag plus a random suffix, unique per build.
    pub validated_by: String,
    /// Requester tag plus a prefix of the originating request id.
    pub requested_by: String,
}

/// One record, grouped into four sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryNode {
    pub identity: Identity,
    pub magnitudes: Magnitudes,
    pub geo: Geo,
    pub history: History,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub internal_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Magnitudes {
    pub population_millions: String,
    pub population_total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geo {
    pub continent: String,
    pub subregion: String,
    pub capital: String,
    pub currency: String,
    pub density: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub avg_30d: String,
    pub max_6m: String,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Build the report tree for one submission.
///
/// An empty record slice is a legal document with an empty `countries` list.
pub fn build_document(
    records: &[CanonicalRecord],
    mapper_version: &str,
    request_id: &str,
) -> ReportDocument {
    let suffix = Uuid::new_v4().simple().to_string();
    let request_fragment: String = request_id.chars().take(8).collect();

    ReportDocument {
        report: Report {
            generated_at: Utc::now().format("%Y-%m-%d").to_string(),
            mapper_version: mapper_version.to_string(),
            metadata: Metadata {
                validated_by: format!("{SERVICE_TAG}-{}", &suffix[..8]),
                requested_by: format!("{REQUESTER_TAG}-{request_fragment}"),
            },
            countries: records.iter().map(country_node).collect(),
        },
    }
}

/// Serialize the tree to the canonical persisted form.
pub fn render(document: &ReportDocument) -> tabreport_shared::Result<String> {
    serde_json::to_string_pretty(document)
        .map_err(|e| tabreport_shared::TabreportError::validation(format!("render document: {e}")))
}

fn country_node(record: &CanonicalRecord) -> CountryNode {
    CountryNode {
        identity: Identity {
            internal_id: text_or_empty(&record.internal_id),
            name: text_or_empty(&record.name),
        },
        magnitudes: Magnitudes {
            population_millions: numeric_text(&record.population_millions),
            population_total: numeric_text(&record.population_total),
        },
        geo: Geo {
            continent: categorical(&record.continent),
            subregion: categorical(&record.subregion),
            capital: categorical(&record.capital),
            currency: categorical(&record.currency),
            density: float_text(record.density),
        },
        history: History {
            avg_30d: float_text(record.avg_30d),
            max_6m: float_text(record.max_6m),
        },
    }
}

fn text_or_empty(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or("").to_string()
}

/// Categorical coercion: absent, blank, and the sentinel all land on the
/// sentinel, so the rendered field is never empty.
fn categorical(value: &Option<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() && v != SENTINEL => v.to_string(),
        _ => SENTINEL.to_string(),
    }
}

fn numeric_text(value: &Option<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NUMERIC_SENTINEL.to_string(),
    }
}

fn float_text(value: Option<f64>) -> String {
    match value {
        Some(v) if v != 0.0 => format!("{v}"),
        _ => NUMERIC_SENTINEL.to_string(),
    }
}

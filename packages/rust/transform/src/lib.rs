//! CSV-to-canonical transformation.
//!
//! Takes raw CSV bytes, applies the configured column-mapping table, derives
//! an enrichment key per row, merges lookup data, and returns the records in
//! input order. Unmapped columns are dropped; mapped-but-absent columns stay
//! absent rather than defaulting.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, instrument, warn};

use tabreport_enrich::EnrichmentClient;
use tabreport_shared::{CanonicalRecord, Result, TabreportError};

/// UTF-8 byte-order mark some upstream exporters prepend.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Yield briefly after this many rows so a large file cannot starve the
/// runtime or hammer the lookup service.
const THROTTLE_EVERY: usize = 10;
const THROTTLE_PAUSE: Duration = Duration::from_millis(100);

/// Turns raw CSV bytes into enriched canonical records.
pub struct RecordTransformer {
    mapper: BTreeMap<String, String>,
    enrich: Arc<EnrichmentClient>,
}

impl RecordTransformer {
    /// Build a transformer around a mapping table and a shared lookup client.
    pub fn new(mapper: BTreeMap<String, String>, enrich: Arc<EnrichmentClient>) -> Self {
        Self { mapper, enrich }
    }

    /// Parse, map, and enrich one CSV payload.
    ///
    /// The first row is the header. Row order is preserved. A row that the
    /// CSV parser rejects fails the whole payload; partial output would be
    /// indistinguishable from a complete one downstream.
    #[instrument(skip(self, raw), fields(bytes = raw.len()))]
    pub async fn transform(&self, raw: &[u8]) -> Result<Vec<CanonicalRecord>> {
        let raw = strip_bom(raw);
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(raw);

        let headers = reader
            .headers()
            .map_err(|e| TabreportError::parse(format!("CSV header: {e}")))?
            .clone();

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|e| TabreportError::parse(format!("CSV row {index}: {e}")))?;

            let mut record = CanonicalRecord::default();
            for (column, header) in headers.iter().enumerate() {
                let Some(canonical) = self.mapper.get(header.trim()) else {
                    continue;
                };
                let Some(value) = row.get(column) else {
                    continue;
                };
                if !record.set_mapped(canonical, value.trim().to_string()) {
                    warn!(header, canonical, "mapping table entry points nowhere");
                }
            }

            let key = enrichment_key(&record);
            let data = self.enrich.lookup(&key).await;
            record.apply_enrichment(&data);
            records.push(record);

            if (index + 1) % THROTTLE_EVERY == 0 {
                tokio::time::sleep(THROTTLE_PAUSE).await;
            }
        }

        debug!(rows = records.len(), "transformed CSV payload");
        Ok(records)
    }
}

fn strip_bom(raw: &[u8]) -> &[u8] {
    raw.strip_prefix(UTF8_BOM).unwrap_or(raw)
}

/// Minimum length for a usable name-derived lookup key.
const MIN_KEY_LEN: usize = 3;

/// Derive the lookup key for a mapped row.
///
/// Prefers the name field with separators flattened to spaces. When the name
/// is absent or shorter than three characters, recovers the name tokens from
/// a structured internal id of the form `CSV_<TOKENS>_<n>`. A row yielding
/// neither falls back to the (possibly empty) name key, which the lookup
/// client resolves to deterministic fallback data.
fn enrichment_key(record: &CanonicalRecord) -> String {
    static ID_NAME_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^CSV_([A-Z_]+)_\d+").expect("valid regex"));

    let name_key = record
        .name
        .as_deref()
        .map(|name| name.replace('_', " ").trim().to_string())
        .unwrap_or_default();
    if name_key.len() >= MIN_KEY_LEN {
        return name_key;
    }

    record
        .internal_id
        .as_deref()
        .and_then(|id| ID_NAME_RE.captures(id.trim()))
        .and_then(|captures| captures.get(1))
        .map(|tokens| tokens.as_str().replace('_', " ").trim().to_string())
        .unwrap_or(name_key)
}

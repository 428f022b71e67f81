//! Document validation: well-formedness plus optional declarative rules.
//!
//! Validation always re-parses the rendered text rather than trusting the
//! in-memory tree; what gets persisted is the text, so the text is what must
//! hold up.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tabreport_shared::{Result, TabreportError};

/// Declarative rule set loaded from the configured schema file.
///
/// `required` paths are dotted and anchored at the document root.
/// `numeric_text` paths are dotted and anchored at each country node; the
/// addressed field must hold text that parses as a number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaRules {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub numeric_text: Vec<String>,
}

/// Validates rendered documents, with or without a schema.
#[derive(Debug, Default)]
pub struct DocumentValidator {
    rules: Option<SchemaRules>,
}

impl DocumentValidator {
    /// Well-formedness-only validator.
    pub fn new() -> Self {
        Self { rules: None }
    }

    /// Validator with rules loaded from a schema file. A `None` path means
    /// no schema is configured, which is not an error.
    pub fn from_schema_path(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::new());
        };

        let text = std::fs::read_to_string(path).map_err(|e| TabreportError::io(path, e))?;
        let rules: SchemaRules = serde_json::from_str(&text)
            .map_err(|e| TabreportError::config(format!("schema {}: {e}", path.display())))?;

        debug!(
            required = rules.required.len(),
            numeric = rules.numeric_text.len(),
            "loaded schema rules"
        );
        Ok(Self { rules: Some(rules) })
    }

    /// Validate one rendered document.
    pub fn validate(&self, rendered: &str) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(rendered).map_err(|e| {
            TabreportError::validation(format!(
                "document is not well-formed (line {}, column {}): {e}",
                e.line(),
                e.column()
            ))
        })?;

        let Some(rules) = &self.rules else {
            return Ok(());
        };

        for path in &rules.required {
            if lookup(&value, path).is_none() {
                return Err(TabreportError::validation(format!(
                    "required section `{path}` is missing"
                )));
            }
        }

        let countries = lookup(&value, "report.countries")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        for (index, node) in countries.iter().enumerate() {
            for path in &rules.numeric_text {
                let Some(field) = lookup(node, path) else {
                    return Err(TabreportError::validation(format!(
                        "country {index}: field `{path}` is missing"
                    )));
                };
                let ok = field
                    .as_str()
                    .is_some_and(|text| text.trim().parse::<f64>().is_ok());
                if !ok {
                    let leaf = path.rsplit('.').next().unwrap_or(path);
                    let line = line_of(rendered, leaf, index);
                    return Err(TabreportError::validation(format!(
                        "country {index}: field `{path}` must be numeric text (line {line})"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Walk a dotted path through JSON objects.
fn lookup<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(value, |node, key| node.get(key))
}

/// 1-based line of the `occurrence`-th appearance of `"key"` in the text.
/// Each country node holds each leaf key exactly once, so the occurrence
/// index is the country index.
fn line_of(rendered: &str, key: &str, occurrence: usize) -> usize {
    let needle = format!("\"{key}\"");
    let mut seen = 0;
    for (number, line) in rendered.lines().enumerate() {
        if line.contains(&needle) {
            if seen == occurrence {
                return number + 1;
            }
            seen += 1;
        }
    }
    0
}

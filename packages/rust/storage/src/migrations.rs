//! SQL migration definitions for the document database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: documents",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Persisted report documents, one row per accepted submission
CREATE TABLE IF NOT EXISTS documents (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    raw_document   TEXT NOT NULL,
    mapper_version TEXT NOT NULL,
    request_id     TEXT NOT NULL,
    status         TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_request_id ON documents(request_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

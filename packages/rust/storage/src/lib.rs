//! libSQL storage layer for persisted report documents.
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! accepted submission. The insert is the durability point of the pipeline:
//! a document id returned from here is the id the requester sees.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};

use tabreport_shared::{Result, TabreportError};

/// One persisted document row, as read back.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: i64,
    pub raw_document: String,
    pub mapper_version: String,
    pub request_id: String,
    pub status: String,
    pub created_at: String,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TabreportError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| TabreportError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| TabreportError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    TabreportError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Document operations
    // -----------------------------------------------------------------------

    /// Insert one document and return its generated id.
    ///
    /// Single-statement insert; either the row lands with an id or the
    /// original store error text is preserved for the failure notification.
    pub async fn insert_document(
        &self,
        raw_document: &str,
        mapper_version: &str,
        request_id: &str,
        status: &str,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO documents (raw_document, mapper_version, request_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![raw_document, mapper_version, request_id, status, now.as_str()],
            )
            .await
            .map_err(|e| TabreportError::Storage(e.to_string()))?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Get a document by id.
    pub async fn get_document(&self, id: i64) -> Result<Option<DocumentRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, raw_document, mapper_version, request_id, status, created_at
                 FROM documents WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| TabreportError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(DocumentRow {
                id: row
                    .get::<i64>(0)
                    .map_err(|e| TabreportError::Storage(e.to_string()))?,
                raw_document: row
                    .get::<String>(1)
                    .map_err(|e| TabreportError::Storage(e.to_string()))?,
                mapper_version: row
                    .get::<String>(2)
                    .map_err(|e| TabreportError::Storage(e.to_string()))?,
                request_id: row
                    .get::<String>(3)
                    .map_err(|e| TabreportError::Storage(e.to_string()))?,
                status: row
                    .get::<String>(4)
                    .map_err(|e| TabreportError::Storage(e.to_string()))?,
                created_at: row
                    .get::<String>(5)
                    .map_err(|e| TabreportError::Storage(e.to_string()))?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(TabreportError::Storage(e.to_string())),
        }
    }

    /// Count persisted documents.
    pub async fn count_documents(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM documents", params![])
            .await
            .map_err(|e| TabreportError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| TabreportError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(TabreportError::Storage(e.to_string())),
        }
    }
}

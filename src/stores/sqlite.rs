//! SQLite-backed relational store.
//!
//! All access is serialized through a `Mutex<Connection>`, which is fine for
//! SQLite (which serializes writes anyway). WAL mode is enabled for
//! concurrent read performance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::data_model::{DocumentRecord, FinalReport, NewDocumentRecord, ProcessingStatus};
use crate::stores::{MetadataStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id      INTEGER NOT NULL,
    filename        TEXT NOT NULL,
    size            INTEGER NOT NULL,
    mime_type       TEXT NOT NULL,
    content_hash    TEXT NOT NULL,
    status          TEXT NOT NULL,
    cross_store_ref TEXT,
    error_detail    TEXT,
    created_at      TEXT NOT NULL,
    UNIQUE (filename, content_hash)
);
CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
CREATE TABLE IF NOT EXISTS ingest_runs (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at         TEXT NOT NULL,
    finished_at        TEXT NOT NULL,
    total              INTEGER NOT NULL,
    processed          INTEGER NOT NULL,
    failed             INTEGER NOT NULL,
    skipped_duplicates INTEGER NOT NULL,
    orphan_candidates  INTEGER NOT NULL,
    duration_secs      REAL NOT NULL,
    throughput_per_sec REAL NOT NULL,
    clean_drain        INTEGER NOT NULL
);
";

/// Thread-safe handle to the relational store. Cloning is cheap (inner Arc).
#[derive(Clone)]
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    /// Opens (or creates) the database at the given path and applies the
    /// schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Connection(format!("{}: {}", path.display(), e)))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }
}

fn record_from_row(row: &Row<'_>) -> Result<DocumentRecord, rusqlite::Error> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    Ok(DocumentRecord {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        filename: row.get("filename")?,
        size: row.get::<_, i64>("size")? as u64,
        mime_type: row.get("mime_type")?,
        content_hash: row.get("content_hash")?,
        status: ProcessingStatus::parse(&status).unwrap_or(ProcessingStatus::Error),
        cross_store_ref: row.get("cross_store_ref")?,
        error_detail: row.get("error_detail")?,
        created_at: parse_timestamp(&created_at),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
    }

    async fn find_by_identity(
        &self,
        filename: &str,
        content_hash: &str,
    ) -> Result<Option<DocumentRecord>, StoreError> {
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    "SELECT * FROM documents WHERE filename = ?1 AND content_hash = ?2",
                    params![filename, content_hash],
                    record_from_row,
                )
                .optional()?;
            Ok(record)
        })
    }

    async fn insert_pending(&self, record: &NewDocumentRecord) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents
                 (company_id, filename, size, mime_type, content_hash, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.company_id,
                    record.filename,
                    record.size as i64,
                    record.mime_type,
                    record.content_hash,
                    ProcessingStatus::Pending.as_str(),
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    async fn mark_processed(&self, id: i64, detail_key: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE documents SET status = ?2, cross_store_ref = ?3 WHERE id = ?1",
                params![id, ProcessingStatus::Processed.as_str(), detail_key],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("document {}", id)));
            }
            Ok(())
        })
    }

    async fn mark_error(&self, id: i64, detail: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE documents SET status = ?2, error_detail = ?3 WHERE id = ?1",
                params![id, ProcessingStatus::Error.as_str(), detail],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("document {}", id)));
            }
            Ok(())
        })
    }

    async fn get(&self, id: i64) -> Result<Option<DocumentRecord>, StoreError> {
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    "SELECT * FROM documents WHERE id = ?1",
                    params![id],
                    record_from_row,
                )
                .optional()?;
            Ok(record)
        })
    }

    async fn count_by_status(&self, status: ProcessingStatus) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    async fn save_report(&self, report: &FinalReport) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ingest_runs
                 (started_at, finished_at, total, processed, failed, skipped_duplicates,
                  orphan_candidates, duration_secs, throughput_per_sec, clean_drain)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    report.started_at.to_rfc3339(),
                    report.finished_at.to_rfc3339(),
                    report.total as i64,
                    report.processed as i64,
                    report.failed as i64,
                    report.skipped_duplicates as i64,
                    report.orphan_candidates as i64,
                    report.duration_secs,
                    report.throughput_per_sec,
                    report.clean_drain as i64,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(hash: &str) -> NewDocumentRecord {
        NewDocumentRecord {
            company_id: 7,
            filename: "invoice.txt".to_string(),
            size: 120,
            mime_type: "text/plain".to_string(),
            content_hash: hash.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_lookup_roundtrip() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let id = store.insert_pending(&new_record("abc123")).await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Pending);
        assert_eq!(record.cross_store_ref, None);
        assert_eq!(record.company_id, 7);

        let found = store
            .find_by_identity("invoice.txt", "abc123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
        // Same content under another name is a different identity.
        assert!(store
            .find_by_identity("renamed.txt", "abc123")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_by_identity("invoice.txt", "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_identity_is_rejected() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store.insert_pending(&new_record("dup")).await.unwrap();
        assert!(store.insert_pending(&new_record("dup")).await.is_err());
    }

    #[tokio::test]
    async fn mark_processed_backfills_reference() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let id = store.insert_pending(&new_record("h1")).await.unwrap();
        store.mark_processed(id, "detail-key-1").await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Processed);
        assert_eq!(record.cross_store_ref.as_deref(), Some("detail-key-1"));
    }

    #[tokio::test]
    async fn mark_error_keeps_detail() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let id = store.insert_pending(&new_record("h2")).await.unwrap();
        store.mark_error(id, "detail insert failed").await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Error);
        assert_eq!(record.error_detail.as_deref(), Some("detail insert failed"));
        assert!(store.mark_error(9999, "nope").await.is_err());
    }
}

//! libSQL outcome log — one `pitch_log` row per processed query.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DatabaseError, OutcomeLogError};
use crate::pipeline::types::{OutcomeLog, OutcomeStatus, QueryRecord};
use crate::store::migrations;

/// A stored outcome row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PitchLogEntry {
    pub id: Uuid,
    pub logged_at: DateTime<Utc>,
    pub title: String,
    pub publication: String,
    pub query_text: String,
    pub reply_to: Option<String>,
    pub pitch: String,
    pub status: String,
}

/// libSQL-backed outcome log.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlOutcomeLog {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlOutcomeLog {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let log = Self::from_database(db).await?;
        info!(path = %path.display(), "Outcome database opened");
        Ok(log)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Insert one outcome row.
    pub async fn insert(
        &self,
        query: &QueryRecord,
        pitch: &str,
        status: OutcomeStatus,
        logged_at: DateTime<Utc>,
    ) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO pitch_log (id, logged_at, title, publication, query_text, reply_to, pitch, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.to_string(),
                    logged_at.to_rfc3339(),
                    query.title.as_str(),
                    query.publication.as_str(),
                    query.query_text.as_str(),
                    query.reply_to.clone(),
                    pitch,
                    status.label(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert pitch_log row: {e}")))?;

        debug!(%id, status = status.label(), "Outcome stored");
        Ok(id)
    }

    /// Most recent rows first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<PitchLogEntry>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, logged_at, title, publication, query_text, reply_to, pitch, status
                 FROM pitch_log ORDER BY logged_at DESC, rowid DESC LIMIT ?1",
                params![i64::from(limit)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to query pitch_log: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read pitch_log row: {e}")))?
        {
            entries.push(
                row_to_entry(&row)
                    .map_err(|e| DatabaseError::Query(format!("Malformed pitch_log row: {e}")))?,
            );
        }
        Ok(entries)
    }

    /// Row counts per status label.
    pub async fn count_by_status(&self, status: OutcomeStatus) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM pitch_log WHERE status = ?1",
                params![status.label()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to count pitch_log: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read count: {e}")))?
        {
            Some(row) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("Failed to parse count: {e}"))),
            None => Ok(0),
        }
    }
}

/// Parse an RFC 3339 datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Column order: 0:id, 1:logged_at, 2:title, 3:publication, 4:query_text,
/// 5:reply_to, 6:pitch, 7:status
fn row_to_entry(row: &libsql::Row) -> Result<PitchLogEntry, libsql::Error> {
    let id: String = row.get(0)?;
    let logged_at: String = row.get(1)?;
    Ok(PitchLogEntry {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        logged_at: parse_datetime(&logged_at),
        title: row.get(2)?,
        publication: row.get(3)?,
        query_text: row.get(4)?,
        reply_to: row.get(5)?,
        pitch: row.get(6)?,
        status: row.get(7)?,
    })
}

#[async_trait]
impl OutcomeLog for LibSqlOutcomeLog {
    fn name(&self) -> &str {
        "libsql"
    }

    async fn record(
        &self,
        query: &QueryRecord,
        text: &str,
        status: OutcomeStatus,
    ) -> Result<(), OutcomeLogError> {
        self.insert(query, text, status, Utc::now()).await?;
        Ok(())
    }
}

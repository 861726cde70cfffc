//! libSQL storage layer for scoring runs (offline mode).
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! run (with its manifest) and the scored records of every run.
//!
//! **Access rules:**
//! - `noticescore score`: read-write via [`Storage::open`]
//! - `noticescore runs`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use noticescore_shared::{NoticeScoreError, Result, RunManifest, ScoredRecord};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// One line of the run history.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub feed_path: String,
    pub model_digest: String,
    pub record_count: usize,
}

fn storage_err(e: impl std::fmt::Display) -> NoticeScoreError {
    NoticeScoreError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NoticeScoreError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NoticeScoreError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
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
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        NoticeScoreError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
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

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(NoticeScoreError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run operations
    // -----------------------------------------------------------------------

    /// Record a finished run and its scored records in one transaction.
    ///
    /// `position` preserves the pipeline's output order.
    pub async fn insert_run(&self, manifest: &RunManifest, records: &[ScoredRecord]) -> Result<()> {
        self.check_writable()?;
        let run_id = manifest.run_id.to_string();
        let manifest_json = serde_json::to_string(manifest)
            .map_err(|e| NoticeScoreError::Serialization(e.to_string()))?;

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute(
            "INSERT INTO runs (id, created_at, feed_path, model_path, model_digest, record_count, manifest_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id.as_str(),
                manifest.created_at.to_rfc3339(),
                manifest.feed_path.as_str(),
                manifest.model_path.as_str(),
                manifest.model_digest.as_str(),
                manifest.record_count as i64,
                manifest_json,
            ],
        )
        .await
        .map_err(storage_err)?;

        for (position, record) in records.iter().enumerate() {
            tx.execute(
                "INSERT INTO scored_records
                   (run_id, position, notice_type, notice_number, notice_url, attachment_url, prediction, distance)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    run_id.as_str(),
                    position as i64,
                    record.notice_type.as_str(),
                    record.notice_number.as_str(),
                    record.notice_url.as_str(),
                    record.attachment_url.as_str(),
                    record.prediction,
                    record.decision_boundary_distance,
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(run_id, records = records.len(), "run stored");
        Ok(())
    }

    /// List runs, newest first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, created_at, feed_path, model_digest, record_count
                 FROM runs ORDER BY created_at DESC, id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let created_at: String = row.get(1).map_err(storage_err)?;
            results.push(RunSummary {
                run_id: row.get::<String>(0).map_err(storage_err)?,
                created_at: parse_timestamp(&created_at)?,
                feed_path: row.get::<String>(2).map_err(storage_err)?,
                model_digest: row.get::<String>(3).map_err(storage_err)?,
                record_count: row.get::<i64>(4).map_err(storage_err)? as usize,
            });
        }
        Ok(results)
    }

    /// Get a run's manifest by ID.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<RunManifest>> {
        let mut rows = self
            .conn
            .query(
                "SELECT manifest_json FROM runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row.get(0).map_err(storage_err)?;
                let manifest = serde_json::from_str(&json).map_err(|e| {
                    NoticeScoreError::Storage(format!("corrupt manifest for run {run_id}: {e}"))
                })?;
                Ok(Some(manifest))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Scored records of a run, in output order.
    pub async fn records_for_run(&self, run_id: &str) -> Result<Vec<ScoredRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT notice_type, notice_number, notice_url, attachment_url, prediction, distance
                 FROM scored_records WHERE run_id = ?1 ORDER BY position",
                params![run_id],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(ScoredRecord {
                notice_type: row.get::<String>(0).map_err(storage_err)?,
                notice_number: row.get::<String>(1).map_err(storage_err)?,
                notice_url: row.get::<String>(2).map_err(storage_err)?,
                attachment_url: row.get::<String>(3).map_err(storage_err)?,
                prediction: row.get::<i64>(4).map_err(storage_err)?,
                decision_boundary_distance: row.get::<f64>(5).map_err(storage_err)?,
            });
        }
        Ok(results)
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| NoticeScoreError::Storage(format!("invalid date: {e}")))
}

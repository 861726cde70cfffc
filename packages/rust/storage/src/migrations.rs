//! SQL migration definitions for the noticescore database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

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
        description: "Initial schema: runs, scored_records",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per scoring run
CREATE TABLE IF NOT EXISTS runs (
    id            TEXT PRIMARY KEY,
    created_at    TEXT NOT NULL,
    feed_path     TEXT NOT NULL,
    model_path    TEXT NOT NULL,
    model_digest  TEXT NOT NULL,
    record_count  INTEGER NOT NULL,
    manifest_json TEXT NOT NULL
);

-- Scored attachments, in pipeline output order
CREATE TABLE IF NOT EXISTS scored_records (
    run_id         TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    position       INTEGER NOT NULL,
    notice_type    TEXT NOT NULL,
    notice_number  TEXT NOT NULL,
    notice_url     TEXT NOT NULL,
    attachment_url TEXT NOT NULL,
    prediction     INTEGER NOT NULL,
    distance       REAL NOT NULL,
    PRIMARY KEY (run_id, position)
);

CREATE INDEX IF NOT EXISTS idx_scored_records_notice ON scored_records(notice_number);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

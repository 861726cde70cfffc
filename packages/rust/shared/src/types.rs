//! Core domain types for noticescore runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Current schema version for the run manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Notice identifier fields, in resolution priority order.
///
/// Solicitation, award, line, modification, delivery-order number. When a
/// notice carries several of these, the earliest entry in this table wins.
pub const IDENTIFIER_KEYS: [&str; 5] = ["solnbr", "awdnbr", "linenbr", "modnbr", "donbr"];

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for scoring run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One (notice, attachment) pair flattened out of the feed, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct PreScoringRecord {
    /// Feed section the notice came from (e.g. `PRESOL`, `COMBINE`).
    pub notice_type: String,
    /// Resolved notice identifier, empty when the notice carries none.
    pub notice_number: String,
    /// Link to the notice itself.
    pub notice_url: String,
    /// Link to the attachment document.
    pub attachment_url: String,
    /// Raw extracted text as it appeared in the feed.
    ///
    /// Kept as a JSON value so that a null text can be told apart from a
    /// missing one (missing text is stored as an empty string).
    pub text: serde_json::Value,
}

/// The pipeline's output unit: one scored attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    #[serde(rename = "notice type")]
    pub notice_type: String,
    #[serde(rename = "notice number")]
    pub notice_number: String,
    #[serde(rename = "notice url")]
    pub notice_url: String,
    #[serde(rename = "attachment url")]
    pub attachment_url: String,
    /// Predicted class label.
    pub prediction: i64,
    /// Absolute value of the classifier margin.
    #[serde(rename = "decision boundary distance")]
    pub decision_boundary_distance: f64,
}

// ---------------------------------------------------------------------------
// CorrelationStats
// ---------------------------------------------------------------------------

/// Counters describing what the correlator kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationStats {
    /// Notice-type sections with at least one notice.
    pub notice_types: usize,
    /// Notices visited across all sections.
    pub notices_seen: usize,
    /// Notices without an `attachments` field.
    pub notices_without_attachments: usize,
    /// Notices with attachments but no `url`; all their attachments are dropped.
    pub notices_missing_url: usize,
    /// Notices emitted with an empty identifier.
    pub notices_missing_identifier: usize,
    /// Feed entries that were not notice mappings.
    pub malformed_entries: usize,
    /// Pre-scoring records produced.
    pub records: usize,
}

// ---------------------------------------------------------------------------
// RunManifest
// ---------------------------------------------------------------------------

/// The `manifest.json` written beside every run's score table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Unique identifier for this run.
    pub run_id: RunId,
    /// Tool version that produced the run.
    pub tool_version: String,
    /// When the run finished.
    pub created_at: DateTime<Utc>,
    /// Feed file that was scored.
    pub feed_path: String,
    /// Model artifact used for scoring.
    pub model_path: String,
    /// SHA-256 of the model artifact bytes.
    pub model_digest: String,
    /// Number of scored records.
    pub record_count: usize,
    /// Correlation counters.
    pub stats: CorrelationStats,
    /// Number of records per predicted label.
    #[serde(default)]
    pub label_counts: BTreeMap<i64, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn identifier_priority_order() {
        assert_eq!(IDENTIFIER_KEYS[0], "solnbr");
        assert_eq!(IDENTIFIER_KEYS[1], "awdnbr");
        assert_eq!(IDENTIFIER_KEYS.len(), 5);
    }

    #[test]
    fn scored_record_uses_table_column_names() {
        let record = ScoredRecord {
            notice_type: "PRESOL".into(),
            notice_number: "W912-18-R-0001".into(),
            notice_url: "https://www.fbo.gov/notice/1".into(),
            attachment_url: "https://www.fbo.gov/attachment/1".into(),
            prediction: 1,
            decision_boundary_distance: 0.8,
        };

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["notice type"], "PRESOL");
        assert_eq!(json["notice number"], "W912-18-R-0001");
        assert_eq!(json["attachment url"], "https://www.fbo.gov/attachment/1");
        assert_eq!(json["decision boundary distance"], 0.8);
    }

    #[test]
    fn manifest_serialization() {
        let mut label_counts = BTreeMap::new();
        label_counts.insert(0, 4);
        label_counts.insert(1, 2);
        let manifest = RunManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id: RunId::new(),
            tool_version: "0.1.0".into(),
            created_at: Utc::now(),
            feed_path: "nightly_files/fbo_nightly_20180506.json".into(),
            model_path: "binaries/clf.json".into(),
            model_digest: sha256_hex(b"model"),
            record_count: 6,
            stats: CorrelationStats::default(),
            label_counts,
        };

        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        let parsed: RunManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(parsed.record_count, 6);
        assert_eq!(parsed.label_counts.get(&1), Some(&2));
    }

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

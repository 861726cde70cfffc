//! Nightly notice feed loading and notice/attachment correlation.
//!
//! A feed is the JSON form of one nightly procurement file: an object whose
//! keys are notice types (`PRESOL`, `COMBINE`, `AWARD`, ...) and whose values
//! are arrays of notices. Attachment text has already been filled in by the
//! attachment fetcher before the feed reaches this crate.

mod correlator;

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use noticescore_shared::{NoticeScoreError, Result};

pub use correlator::{Correlation, correlate};

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// One nightly feed: notice type → notices, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    sections: Map<String, Value>,
}

impl Feed {
    /// Build a feed from an already-parsed JSON value.
    ///
    /// Accepts the feed object itself, or a JSON string whose content is the
    /// feed object (the upstream scraper writes nightly files that way).
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(sections) => Ok(Self { sections }),
            Value::String(inner) => {
                debug!(len = inner.len(), "feed is double-encoded, decoding inner document");
                match serde_json::from_str(&inner) {
                    Ok(Value::Object(sections)) => Ok(Self { sections }),
                    Ok(other) => Err(NoticeScoreError::parse(format!(
                        "encoded feed must contain an object, found {}",
                        kind_of(&other)
                    ))),
                    Err(e) => Err(NoticeScoreError::parse(format!(
                        "encoded feed is not valid JSON: {e}"
                    ))),
                }
            }
            other => Err(NoticeScoreError::parse(format!(
                "feed must be an object of notice types, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Parse a feed from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| NoticeScoreError::parse(format!("feed is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Notice-type sections in document order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of notice-type keys, including empty ones.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the feed has no notice-type keys at all.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Read and parse a nightly feed file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_feed(path: &Path) -> Result<Feed> {
    let content = std::fs::read_to_string(path).map_err(|e| NoticeScoreError::io(path, e))?;
    let feed = Feed::from_json_str(&content).map_err(|e| match e {
        NoticeScoreError::Parse { message } => {
            NoticeScoreError::parse(format!("{}: {message}", path.display()))
        }
        other => other,
    })?;
    debug!(notice_types = feed.len(), "feed loaded");
    Ok(feed)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{
        "PRESOL": [{"solnbr": "A-1", "url": "https://x/1"}],
        "AWARD": null,
        "COMBINE": []
    }"#;

    #[test]
    fn sections_keep_document_order() {
        let feed = Feed::from_json_str(FEED).expect("parse");
        let keys: Vec<&str> = feed.sections().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["PRESOL", "AWARD", "COMBINE"]);
        assert_eq!(feed.len(), 3);
    }

    #[test]
    fn double_encoded_feed_matches_plain() {
        let plain = Feed::from_json_str(FEED).expect("plain");
        let encoded = serde_json::to_string(FEED).expect("encode");
        let decoded = Feed::from_json_str(&encoded).expect("double-encoded");
        assert_eq!(plain, decoded);
    }

    #[test]
    fn non_object_feed_is_rejected() {
        let err = Feed::from_json_str("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("found an array"));

        let err = Feed::from_json_str("\"[]\"").unwrap_err();
        assert!(err.to_string().contains("encoded feed must contain an object"));

        let err = Feed::from_json_str("{not json").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn load_feed_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fbo_nightly_20180506.json");
        std::fs::write(&path, FEED).expect("write");

        let feed = load_feed(&path).expect("load");
        assert_eq!(feed.len(), 3);

        let missing = dir.path().join("absent.json");
        let err = load_feed(&missing).unwrap_err();
        assert!(matches!(err, NoticeScoreError::Io { .. }));
    }

    #[test]
    fn load_feed_names_file_in_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "42").expect("write");

        let err = load_feed(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}

//! Flattens a nested feed into one pre-scoring record per (notice, attachment).
//!
//! The feed is untrusted nightly data. Notices that cannot be attributed
//! (no `url`) are dropped with every attachment they carry; notices without an
//! identifier are kept with an empty one. Neither case is an error.

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use noticescore_shared::{CorrelationStats, IDENTIFIER_KEYS, PreScoringRecord};

use crate::Feed;

/// Output of [`correlate`]: records in feed traversal order plus counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correlation {
    pub records: Vec<PreScoringRecord>,
    pub stats: CorrelationStats,
}

/// Walk the feed and emit one record per eligible (notice, attachment) pair.
///
/// Order is notice-type order, then notice order within the type, then
/// attachment order within the notice.
#[instrument(skip_all, fields(notice_types = feed.len()))]
pub fn correlate(feed: &Feed) -> Correlation {
    let mut out = Correlation::default();

    for (notice_type, notices) in feed.sections() {
        let notices = match notices {
            Value::Null => continue,
            Value::Array(notices) if notices.is_empty() => continue,
            Value::Array(notices) => notices,
            other => {
                warn!(notice_type, found = ?other, "notice type is not a list, skipping");
                out.stats.malformed_entries += 1;
                continue;
            }
        };
        out.stats.notice_types += 1;

        for (index, notice) in notices.iter().enumerate() {
            let Value::Object(notice) = notice else {
                debug!(notice_type, index, "feed entry is not a notice object, skipping");
                out.stats.malformed_entries += 1;
                continue;
            };
            out.stats.notices_seen += 1;
            correlate_notice(notice_type, index, notice, &mut out);
        }
    }

    out.stats.records = out.records.len();
    debug!(stats = ?out.stats, "correlation complete");
    out
}

fn correlate_notice(
    notice_type: &str,
    index: usize,
    notice: &Map<String, Value>,
    out: &mut Correlation,
) {
    let Some(attachments) = notice.get("attachments") else {
        out.stats.notices_without_attachments += 1;
        return;
    };

    // Checked before the identifier: a notice with neither is dropped, not kept.
    let Some(notice_url) = notice.get("url").and_then(scalar_text) else {
        debug!(notice_type, index, "notice has attachments but no url, dropping");
        out.stats.notices_missing_url += 1;
        return;
    };

    let notice_number = match resolve_identifier(notice) {
        Some(id) => id,
        None => {
            debug!(notice_type, index, %notice_url, "notice has no identifier, keeping with empty one");
            out.stats.notices_missing_identifier += 1;
            String::new()
        }
    };

    for attachment in attachment_entries(attachments) {
        let Value::Object(attachment) = attachment else {
            debug!(notice_type, %notice_url, "attachment entry is not an object, skipping");
            out.stats.malformed_entries += 1;
            continue;
        };

        out.records.push(PreScoringRecord {
            notice_type: notice_type.to_string(),
            notice_number: notice_number.clone(),
            notice_url: notice_url.clone(),
            attachment_url: attachment
                .get("url")
                .and_then(scalar_text)
                .unwrap_or_default(),
            text: attachment
                .get("text")
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
        });
    }
}

/// Resolve a notice's identifier by walking [`IDENTIFIER_KEYS`] in order.
///
/// The first key in the table that the notice carries (with a non-null value)
/// wins, whatever order the notice's own fields appear in.
pub(crate) fn resolve_identifier(notice: &Map<String, Value>) -> Option<String> {
    IDENTIFIER_KEYS
        .iter()
        .find_map(|key| notice.get(*key).and_then(scalar_text))
}

/// Attachments are keyed by attachment name; older feeds use a plain list.
fn attachment_entries(attachments: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match attachments {
        Value::Object(map) => Box::new(map.values()),
        Value::Array(list) => Box::new(list.iter()),
        Value::Null => Box::new(std::iter::empty()),
        other => {
            warn!(found = ?other, "attachments field is neither a map nor a list");
            Box::new(std::iter::empty())
        }
    }
}

/// Text of a scalar field; `None` for null.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

//! End-to-end scoring pipeline: feed → correlate → normalize → score → table.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};

use noticescore_feed::{Correlation, Feed};
use noticescore_scoring::{Classifier, LinearTextModel, ScoringEngine};
use noticescore_shared::{
    CURRENT_SCHEMA_VERSION, CorrelationStats, NoticeScoreError, OutputFormat, Result, RunId,
    RunManifest, ScoredRecord, ScoringConfig,
};
use noticescore_storage::Storage;

use crate::output;

// ---------------------------------------------------------------------------
// In-memory pipeline
// ---------------------------------------------------------------------------

/// Scored table for one feed, plus what the correlator dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    pub records: Vec<ScoredRecord>,
    pub stats: CorrelationStats,
}

/// Score every eligible attachment in `feed` with `model`.
///
/// The model is called on the whole batch of normalized texts (or on
/// consecutive chunks of it), and results are zipped back onto records by
/// position. Raw and normalized text do not survive into the output.
#[instrument(skip_all, fields(chunk_size = scoring.chunk_size))]
pub fn score_feed(
    feed: &Feed,
    model: &dyn Classifier,
    scoring: &ScoringConfig,
) -> Result<PipelineOutput> {
    let Correlation { records, stats } = noticescore_feed::correlate(feed);

    let texts: Vec<String> = records
        .iter()
        .map(|r| noticescore_normalize::normalize_value(&r.text, scoring.missing_text))
        .collect();

    let batch = ScoringEngine::new(model)
        .with_chunk_size(scoring.chunk_size)
        .score(&texts)?;

    if batch.len() != records.len() {
        return Err(NoticeScoreError::scoring(format!(
            "{} scores for {} records",
            batch.len(),
            records.len()
        )));
    }

    let records: Vec<ScoredRecord> = records
        .into_iter()
        .zip(batch.labels)
        .zip(batch.distances)
        .map(|((record, prediction), distance)| ScoredRecord {
            notice_type: record.notice_type,
            notice_number: record.notice_number,
            notice_url: record.notice_url,
            attachment_url: record.attachment_url,
            prediction,
            decision_boundary_distance: distance,
        })
        .collect();

    info!(
        records = records.len(),
        dropped_notices = stats.notices_missing_url,
        "feed scored"
    );

    Ok(PipelineOutput { records, stats })
}

/// Number of records per predicted label.
pub fn label_counts(records: &[ScoredRecord]) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.prediction).or_insert(0) += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// File-to-file run
// ---------------------------------------------------------------------------

/// Configuration for [`run`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Nightly feed file (attachment text already filled in).
    pub feed_path: PathBuf,
    /// Frozen model artifact.
    pub model_path: PathBuf,
    /// Directory receiving one sub-directory per run.
    pub output_root: PathBuf,
    /// Score table format.
    pub format: OutputFormat,
    /// Chunking and missing-text policy.
    pub scoring: ScoringConfig,
    /// Database to record the run in; `None` skips persistence.
    pub db_path: Option<PathBuf>,
    /// Tool version string.
    pub tool_version: String,
}

/// Result of [`run`].
#[derive(Debug)]
pub struct RunResult {
    pub run_id: RunId,
    pub run_dir: PathBuf,
    pub scores_path: PathBuf,
    pub record_count: usize,
    pub stats: CorrelationStats,
    pub label_counts: BTreeMap<i64, usize>,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the run completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &RunResult) {}
}

/// Score a feed file and write the run's outputs.
///
/// 1. Load the feed
/// 2. Load the model (once; failure aborts before anything is written)
/// 3. Correlate, normalize and score
/// 4. Write the score table and manifest
/// 5. Record the run in storage, if configured
#[instrument(skip_all, fields(feed = %config.feed_path.display(), model = %config.model_path.display()))]
pub async fn run(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<RunResult> {
    let start = Instant::now();
    let run_id = RunId::new();
    info!(%run_id, "starting scoring run");

    progress.phase("Loading feed");
    let feed = noticescore_feed::load_feed(&config.feed_path)?;

    progress.phase("Loading model");
    let model = LinearTextModel::load(&config.model_path)?;

    progress.phase("Scoring attachments");
    let PipelineOutput { records, stats } = score_feed(&feed, &model, &config.scoring)?;
    let label_counts = label_counts(&records);

    progress.phase("Writing results");
    let manifest = RunManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id: run_id.clone(),
        tool_version: config.tool_version.clone(),
        created_at: Utc::now(),
        feed_path: config.feed_path.display().to_string(),
        model_path: config.model_path.display().to_string(),
        model_digest: model.digest().to_string(),
        record_count: records.len(),
        stats: stats.clone(),
        label_counts: label_counts.clone(),
    };
    let written = output::write_run(&config.output_root, &manifest, &records, config.format)?;

    if let Some(db_path) = &config.db_path {
        progress.phase("Recording run");
        let storage = Storage::open(db_path).await?;
        storage.insert_run(&manifest, &records).await?;
    }

    let result = RunResult {
        run_id,
        run_dir: written.run_dir,
        scores_path: written.scores_path,
        record_count: records.len(),
        stats,
        label_counts,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        run_id = %result.run_id,
        records = result.record_count,
        elapsed_ms = result.elapsed.as_millis(),
        "scoring run complete"
    );

    Ok(result)
}

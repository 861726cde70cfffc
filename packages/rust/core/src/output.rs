//! Run output writer.
//!
//! Every run gets its own directory under the output root:
//! ```text
//! <output_root>/<run_id>/
//! ├── manifest.json
//! └── scores.json      (or scores.jsonl)
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use noticescore_shared::{
    CURRENT_SCHEMA_VERSION, NoticeScoreError, OutputFormat, Result, RunManifest, ScoredRecord,
};

/// Manifest file name inside a run directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Paths written for one run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_dir: PathBuf,
    pub scores_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Write the score table and manifest for a run.
///
/// Files are written to a temp name and renamed into place, so a crashed run
/// never leaves a half-written table behind under the final name.
#[instrument(skip_all, fields(run_id = %manifest.run_id, records = records.len(), format = ?format))]
pub fn write_run(
    output_root: &Path,
    manifest: &RunManifest,
    records: &[ScoredRecord],
    format: OutputFormat,
) -> Result<RunOutput> {
    let run_dir = output_root.join(manifest.run_id.to_string());
    std::fs::create_dir_all(&run_dir).map_err(|e| NoticeScoreError::io(&run_dir, e))?;

    let scores = render_scores(records, format)?;
    let scores_path = run_dir.join(format.file_name());
    write_atomic(&scores_path, scores.as_bytes())?;

    let manifest_json = serde_json::to_string_pretty(manifest)
        .map_err(|e| NoticeScoreError::Serialization(e.to_string()))?;
    let manifest_path = run_dir.join(MANIFEST_FILE_NAME);
    write_atomic(&manifest_path, manifest_json.as_bytes())?;

    info!(path = %run_dir.display(), "run output written");

    Ok(RunOutput {
        run_dir,
        scores_path,
        manifest_path,
    })
}

/// Read and check the manifest of a run directory.
pub fn read_manifest(run_dir: &Path) -> Result<RunManifest> {
    let path = run_dir.join(MANIFEST_FILE_NAME);
    let content = std::fs::read_to_string(&path).map_err(|e| NoticeScoreError::io(&path, e))?;
    let manifest: RunManifest = serde_json::from_str(&content)
        .map_err(|e| NoticeScoreError::parse(format!("invalid {}: {e}", path.display())))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(NoticeScoreError::parse(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }
    Ok(manifest)
}

/// Read the score table of a run directory, whichever format it was written in.
pub fn read_scores(run_dir: &Path) -> Result<Vec<ScoredRecord>> {
    let format = [OutputFormat::Json, OutputFormat::Jsonl]
        .into_iter()
        .find(|f| run_dir.join(f.file_name()).is_file())
        .ok_or_else(|| {
            NoticeScoreError::parse(format!("no score table in {}", run_dir.display()))
        })?;

    let path = run_dir.join(format.file_name());
    let content = std::fs::read_to_string(&path).map_err(|e| NoticeScoreError::io(&path, e))?;
    let invalid = |e: serde_json::Error| {
        NoticeScoreError::parse(format!("invalid {}: {e}", path.display()))
    };

    match format {
        OutputFormat::Json => serde_json::from_str(&content).map_err(invalid),
        OutputFormat::Jsonl => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(invalid))
            .collect(),
    }
}

fn render_scores(records: &[ScoredRecord], format: OutputFormat) -> Result<String> {
    let to_err = |e: serde_json::Error| NoticeScoreError::Serialization(e.to_string());
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(records).map_err(to_err),
        OutputFormat::Jsonl => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record).map_err(to_err)?);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    let mut file = std::fs::File::create(&temp).map_err(|e| NoticeScoreError::io(&temp, e))?;
    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| NoticeScoreError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| NoticeScoreError::io(path, e))?;

    debug!(path = %path.display(), bytes = content.len(), "wrote file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use noticescore_shared::{CorrelationStats, RunId};

    fn manifest() -> RunManifest {
        RunManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id: RunId::new(),
            tool_version: "0.1.0".into(),
            created_at: Utc::now(),
            feed_path: "feed.json".into(),
            model_path: "model.json".into(),
            model_digest: "abc".into(),
            record_count: 2,
            stats: CorrelationStats::default(),
            label_counts: Default::default(),
        }
    }

    fn records() -> Vec<ScoredRecord> {
        (0..2)
            .map(|n| ScoredRecord {
                notice_type: "PRESOL".into(),
                notice_number: format!("SOL-{n}"),
                notice_url: "https://x".into(),
                attachment_url: format!("https://y/{n}"),
                prediction: n,
                decision_boundary_distance: 0.25,
            })
            .collect()
    }

    #[test]
    fn json_output_is_an_array_of_rows() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = manifest();
        let out = write_run(dir.path(), &manifest, &records(), OutputFormat::Json).unwrap();

        assert!(out.scores_path.ends_with("scores.json"));
        let content = std::fs::read_to_string(&out.scores_path).unwrap();
        let parsed: Vec<ScoredRecord> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, records());
        assert!(content.contains("\"decision boundary distance\""));

        let read_back = read_manifest(&out.run_dir).unwrap();
        assert_eq!(read_back.run_id, manifest.run_id);
    }

    #[test]
    fn jsonl_output_has_one_row_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let out = write_run(dir.path(), &manifest(), &records(), OutputFormat::Jsonl).unwrap();

        let content = std::fs::read_to_string(&out.scores_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: ScoredRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.attachment_url, "https://y/1");
    }

    #[test]
    fn read_scores_returns_rows_in_either_format() {
        for format in [OutputFormat::Json, OutputFormat::Jsonl] {
            let dir = tempfile::tempdir().unwrap();
            let out = write_run(dir.path(), &manifest(), &records(), format).unwrap();
            assert_eq!(read_scores(&out.run_dir).unwrap(), records());
        }
    }

    #[test]
    fn read_scores_without_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_scores(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no score table"));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let out = write_run(dir.path(), &manifest(), &[], OutputFormat::Json).unwrap();
        let names: Vec<String> = std::fs::read_dir(&out.run_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn read_manifest_rejects_unknown_schema() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = manifest();
        manifest.schema_version = 99;
        let out = write_run(dir.path(), &manifest, &[], OutputFormat::Json).unwrap();

        let err = read_manifest(&out.run_dir).unwrap_err();
        assert!(err.to_string().contains("schema_version: 99"));
    }
}

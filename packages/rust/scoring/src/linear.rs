//! Frozen TF-IDF + linear-margin text classifier.
//!
//! The artifact is a JSON export of a fitted bag-of-words vectorizer and a
//! linear decision function: a vocabulary mapping terms to columns, optional
//! IDF weights, one coefficient per column, an intercept, and the two class
//! labels. Scoring a text is `coef · tfidf(text) + intercept`; the positive
//! class is `classes[1]`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use noticescore_shared::{NoticeScoreError, Result, sha256_hex};

use crate::Classifier;

/// Artifact format versions this build can read.
const SUPPORTED_FORMAT_VERSION: u32 = 1;

/// Longest n-gram an artifact may ask for.
const MAX_NGRAM: usize = 8;

/// Tokens are runs of two or more word characters.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// Row normalization applied to term vectors before the dot product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    #[default]
    L2,
    None,
}

/// On-disk representation of a [`LinearTextModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelArtifact {
    pub format_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    /// Inclusive (min, max) n-gram lengths.
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default)]
    pub norm: Norm,
    /// Term → column index. Sorted, so the serialized artifact is canonical.
    pub vocabulary: BTreeMap<String, usize>,
    /// Per-column inverse document frequency; absent means plain term counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idf: Option<Vec<f64>>,
    pub coef: Vec<f64>,
    pub intercept: f64,
    pub classes: [i64; 2],
}

fn default_true() -> bool {
    true
}
fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

impl LinearModelArtifact {
    /// Check internal consistency. Returns a description of the first problem.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {SUPPORTED_FORMAT_VERSION})",
                self.format_version
            ));
        }
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n || max_n > MAX_NGRAM {
            return Err(format!(
                "invalid ngram_range ({min_n}, {max_n}): need 1 <= min <= max <= {MAX_NGRAM}"
            ));
        }
        if self.coef.is_empty() {
            return Err("coef is empty".into());
        }
        if self.vocabulary.len() != self.coef.len() {
            return Err(format!(
                "vocabulary has {} terms but coef has {} entries",
                self.vocabulary.len(),
                self.coef.len()
            ));
        }
        if let Some((term, column)) = self
            .vocabulary
            .iter()
            .find(|(_, column)| **column >= self.coef.len())
        {
            return Err(format!("term '{term}' maps to out-of-range column {column}"));
        }
        let columns: BTreeSet<usize> = self.vocabulary.values().copied().collect();
        if columns.len() != self.vocabulary.len() {
            return Err(format!(
                "{} terms share a column with another term",
                self.vocabulary.len() - columns.len()
            ));
        }
        if let Some(idf) = &self.idf {
            if idf.len() != self.coef.len() {
                return Err(format!(
                    "idf has {} entries but coef has {}",
                    idf.len(),
                    self.coef.len()
                ));
            }
        }
        let finite = self.coef.iter().all(|c| c.is_finite())
            && self.intercept.is_finite()
            && self.idf.iter().flatten().all(|w| w.is_finite());
        if !finite {
            return Err("model weights contain non-finite values".into());
        }
        if self.classes[0] == self.classes[1] {
            return Err(format!("classes must differ, got {:?}", self.classes));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Short description of a loaded model, for logs and `model inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: Option<String>,
    pub path: PathBuf,
    pub digest: String,
    pub vocabulary_size: usize,
    pub ngram_range: (usize, usize),
    pub norm: Norm,
    pub has_idf: bool,
    pub classes: [i64; 2],
}

/// A loaded, validated linear text classifier.
#[derive(Debug, Clone)]
pub struct LinearTextModel {
    artifact: LinearModelArtifact,
    path: PathBuf,
    digest: String,
}

impl LinearTextModel {
    /// Load and validate a model artifact. Any failure is a `ModelLoad` error.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| NoticeScoreError::model_load(path, format!("cannot read artifact: {e}")))?;
        let artifact: LinearModelArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| NoticeScoreError::model_load(path, format!("invalid artifact: {e}")))?;
        artifact
            .validate()
            .map_err(|msg| NoticeScoreError::model_load(path, msg))?;

        let model = Self {
            artifact,
            path: path.to_path_buf(),
            digest: sha256_hex(&bytes),
        };
        info!(
            digest = %model.digest,
            vocabulary = model.artifact.vocabulary.len(),
            "model loaded"
        );
        Ok(model)
    }

    /// Build a model from an in-memory artifact (tests, embedding).
    pub fn from_artifact(artifact: LinearModelArtifact) -> Result<Self> {
        let path = PathBuf::from("<memory>");
        artifact
            .validate()
            .map_err(|msg| NoticeScoreError::model_load(&path, msg))?;
        let bytes = serde_json::to_vec(&artifact)
            .map_err(|e| NoticeScoreError::Serialization(e.to_string()))?;
        Ok(Self {
            artifact,
            path,
            digest: sha256_hex(&bytes),
        })
    }

    /// SHA-256 of the artifact bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            name: self.artifact.name.clone(),
            path: self.path.clone(),
            digest: self.digest.clone(),
            vocabulary_size: self.artifact.vocabulary.len(),
            ngram_range: self.artifact.ngram_range,
            norm: self.artifact.norm,
            has_idf: self.artifact.idf.is_some(),
            classes: self.artifact.classes,
        }
    }

    /// Raw margin for one text.
    fn margin(&self, text: &str) -> f64 {
        let features = self.features(text);
        let dot: f64 = features
            .iter()
            .map(|(column, value)| self.artifact.coef[*column] * value)
            .sum();
        dot + self.artifact.intercept
    }

    /// Weighted, normalized term vector as (column, value) pairs.
    ///
    /// Columns are kept sorted so that summation order, and therefore every
    /// bit of the margin, is the same from run to run.
    fn features(&self, text: &str) -> BTreeMap<usize, f64> {
        let lowered;
        let text = if self.artifact.lowercase {
            lowered = text.to_lowercase();
            lowered.as_str()
        } else {
            text
        };

        let tokens: Vec<&str> = TOKEN_RE.find_iter(text).map(|m| m.as_str()).collect();
        let (min_n, max_n) = self.artifact.ngram_range;

        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for n in min_n..=max_n.min(tokens.len()) {
            for window in tokens.windows(n) {
                let term = window.join(" ");
                if let Some(&column) = self.artifact.vocabulary.get(&term) {
                    *counts.entry(column).or_insert(0.0) += 1.0;
                }
            }
        }

        for (column, value) in counts.iter_mut() {
            if self.artifact.sublinear_tf {
                *value = 1.0 + value.ln();
            }
            if let Some(idf) = &self.artifact.idf {
                *value *= idf[*column];
            }
        }

        if self.artifact.norm == Norm::L2 {
            let length = counts.values().map(|v| v * v).sum::<f64>().sqrt();
            if length > 0.0 {
                for value in counts.values_mut() {
                    *value /= length;
                }
            }
        }

        counts
    }
}

impl Classifier for LinearTextModel {
    fn predict(&self, texts: &[String]) -> Result<Vec<i64>> {
        let [negative, positive] = self.artifact.classes;
        Ok(texts
            .iter()
            .map(|text| {
                if self.margin(text) > 0.0 {
                    positive
                } else {
                    negative
                }
            })
            .collect())
    }

    fn decision_function(&self, texts: &[String]) -> Result<Vec<f64>> {
        Ok(texts.iter().map(|text| self.margin(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> LinearModelArtifact {
        let vocabulary = [("accessibility", 0), ("section", 1), ("508", 2), ("pizza", 3)]
            .into_iter()
            .map(|(term, column)| (term.to_string(), column))
            .collect();
        LinearModelArtifact {
            format_version: 1,
            name: Some("test".into()),
            lowercase: true,
            ngram_range: (1, 1),
            sublinear_tf: false,
            norm: Norm::None,
            vocabulary,
            idf: None,
            coef: vec![1.0, 0.5, 0.5, -2.0],
            intercept: -0.25,
            classes: [0, 1],
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn margins_and_labels_from_raw_counts() {
        let model = LinearTextModel::from_artifact(artifact()).expect("model");
        let input = texts(&["Section 508 ACCESSIBILITY", "pizza", ""]);

        let margins = model.decision_function(&input).unwrap();
        assert_close(margins[0], 1.75);
        assert_close(margins[1], -2.25);
        assert_close(margins[2], -0.25);
        assert_eq!(model.predict(&input).unwrap(), vec![1, 0, 0]);
    }

    #[test]
    fn single_character_tokens_are_ignored() {
        let mut art = artifact();
        art.vocabulary.insert("a".into(), 3);
        art.vocabulary.remove("pizza");
        let model = LinearTextModel::from_artifact(art).unwrap();
        let margins = model.decision_function(&texts(&["a a a"])).unwrap();
        assert_close(margins[0], -0.25);
    }

    #[test]
    fn l2_norm_scales_term_vector() {
        let mut art = artifact();
        art.norm = Norm::L2;
        let model = LinearTextModel::from_artifact(art).unwrap();
        let margins = model
            .decision_function(&texts(&["section section 508"]))
            .unwrap();
        assert_close(margins[0], 1.5 / 5f64.sqrt() - 0.25);
    }

    #[test]
    fn idf_and_sublinear_tf_apply_per_column() {
        let mut art = artifact();
        art.idf = Some(vec![2.0, 1.0, 1.0, 1.0]);
        art.sublinear_tf = true;
        let model = LinearTextModel::from_artifact(art).unwrap();
        let margins = model
            .decision_function(&texts(&["accessibility accessibility"]))
            .unwrap();
        assert_close(margins[0], (1.0 + 2f64.ln()) * 2.0 - 0.25);
    }

    #[test]
    fn bigrams_are_matched_when_enabled() {
        let mut art = artifact();
        art.ngram_range = (1, 2);
        art.vocabulary.remove("pizza");
        art.vocabulary.insert("section 508".into(), 3);
        art.coef[3] = 3.0;
        let model = LinearTextModel::from_artifact(art).unwrap();
        let margins = model.decision_function(&texts(&["Section 508"])).unwrap();
        assert_close(margins[0], 0.5 + 0.5 + 3.0 - 0.25);
    }

    #[test]
    fn custom_class_labels_are_returned() {
        let mut art = artifact();
        art.classes = [-1, 7];
        let model = LinearTextModel::from_artifact(art).unwrap();
        assert_eq!(model.predict(&texts(&["508", "pizza"])).unwrap(), vec![7, -1]);
    }

    #[test]
    fn inconsistent_artifacts_are_rejected() {
        let mut art = artifact();
        art.coef.pop();
        let err = LinearTextModel::from_artifact(art).unwrap_err();
        assert!(err.to_string().contains("vocabulary has 4 terms but coef has 3"));

        let mut art = artifact();
        art.vocabulary.insert("pizza".into(), 9);
        let err = LinearTextModel::from_artifact(art).unwrap_err();
        assert!(err.to_string().contains("out-of-range column 9"));

        let mut art = artifact();
        art.idf = Some(vec![1.0]);
        assert!(LinearTextModel::from_artifact(art).is_err());

        let mut art = artifact();
        art.ngram_range = (2, 1);
        assert!(LinearTextModel::from_artifact(art).is_err());

        let mut art = artifact();
        art.format_version = 2;
        let err = LinearTextModel::from_artifact(art).unwrap_err();
        assert!(err.to_string().contains("unsupported format_version 2"));

        let mut art = artifact();
        art.classes = [1, 1];
        assert!(LinearTextModel::from_artifact(art).is_err());
    }

    #[test]
    fn unbounded_ngram_range_is_rejected() {
        let mut art = artifact();
        art.ngram_range = (1, usize::MAX);
        let err = LinearTextModel::from_artifact(art).unwrap_err();
        assert!(matches!(err, NoticeScoreError::ModelLoad { .. }));
        assert!(err.to_string().contains("invalid ngram_range"));

        let mut art = artifact();
        art.ngram_range = (1, MAX_NGRAM);
        let model = LinearTextModel::from_artifact(art).expect("largest allowed range");
        let margins = model.decision_function(&texts(&["section 508"])).unwrap();
        assert_close(margins[0], 0.75);
    }

    #[test]
    fn shared_columns_are_rejected() {
        let mut art = artifact();
        art.vocabulary.insert("pizza".into(), 0);
        let err = LinearTextModel::from_artifact(art).unwrap_err();
        assert!(err.to_string().contains("1 terms share a column"));
    }

    #[test]
    fn digest_is_stable_for_equal_artifacts() {
        let mut art = artifact();
        art.vocabulary = (0..50).map(|n| (format!("term{n}"), n)).collect();
        art.coef = vec![0.1; 50];

        let a = LinearTextModel::from_artifact(art.clone()).unwrap();
        let b = LinearTextModel::from_artifact(art).unwrap();
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn load_reads_artifact_and_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("best_clf.json");
        let bytes = serde_json::to_vec(&artifact()).unwrap();
        std::fs::write(&path, &bytes).unwrap();

        let model = LinearTextModel::load(&path).expect("load");
        assert_eq!(model.digest(), sha256_hex(&bytes));
        let summary = model.summary();
        assert_eq!(summary.vocabulary_size, 4);
        assert_eq!(summary.classes, [0, 1]);
        assert!(!summary.has_idf);
    }

    #[test]
    fn load_failures_are_model_load_errors() {
        let dir = tempfile::tempdir().expect("tempdir");

        let missing = dir.path().join("absent.json");
        let err = LinearTextModel::load(&missing).unwrap_err();
        assert!(matches!(err, NoticeScoreError::ModelLoad { .. }));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, b"\x80\x04pickle").unwrap();
        let err = LinearTextModel::load(&corrupt).unwrap_err();
        assert!(matches!(err, NoticeScoreError::ModelLoad { .. }));
        assert!(err.to_string().contains("invalid artifact"));
    }
}

//! Classifier seam and batch scoring for normalized attachment text.
//!
//! The pipeline never talks to a concrete model. It holds a
//! [`Classifier`] trait object, loaded once per run and shared read-only,
//! and hands the whole batch of normalized texts to a [`ScoringEngine`].
//! [`LinearTextModel`] is the frozen model shipped with the tool.

mod engine;
mod linear;

use noticescore_shared::Result;

pub use engine::{ScoreBatch, ScoringEngine};
pub use linear::{LinearModelArtifact, LinearTextModel, ModelSummary, Norm};

/// A trained binary text classifier.
///
/// Both entry points take the full ordered batch and must return one output
/// per input, in input order.
pub trait Classifier: Send + Sync {
    /// Predicted class label for each text.
    fn predict(&self, texts: &[String]) -> Result<Vec<i64>>;

    /// Signed distance of each text from the decision boundary.
    fn decision_function(&self, texts: &[String]) -> Result<Vec<f64>>;
}

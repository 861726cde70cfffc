//! Batch scoring over an injected classifier.

use tracing::{debug, instrument};

use noticescore_shared::{NoticeScoreError, Result};

use crate::Classifier;

/// Parallel label/distance sequences, aligned with the scored texts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBatch {
    pub labels: Vec<i64>,
    pub distances: Vec<f64>,
}

impl ScoreBatch {
    /// Number of scored texts.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether nothing was scored.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Scores normalized texts with a borrowed classifier.
pub struct ScoringEngine<'m> {
    model: &'m dyn Classifier,
    chunk_size: usize,
}

impl<'m> ScoringEngine<'m> {
    /// Engine that scores every batch in a single classifier call.
    pub fn new(model: &'m dyn Classifier) -> Self {
        Self {
            model,
            chunk_size: 0,
        }
    }

    /// Split batches into chunks of at most `chunk_size` texts (0 = no split).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Score `texts`, returning one label and one distance per text, in order.
    ///
    /// Distance is the absolute value of the classifier margin. A classifier
    /// that returns the wrong number of outputs, or a non-finite margin, is a
    /// defect and fails the whole batch.
    #[instrument(skip_all, fields(texts = texts.len(), chunk_size = self.chunk_size))]
    pub fn score(&self, texts: &[String]) -> Result<ScoreBatch> {
        let mut batch = ScoreBatch {
            labels: Vec::with_capacity(texts.len()),
            distances: Vec::with_capacity(texts.len()),
        };
        if texts.is_empty() {
            return Ok(batch);
        }

        let chunk_size = if self.chunk_size == 0 {
            texts.len()
        } else {
            self.chunk_size
        };

        for (index, chunk) in texts.chunks(chunk_size).enumerate() {
            let labels = self.model.predict(chunk)?;
            let margins = self.model.decision_function(chunk)?;

            if labels.len() != chunk.len() || margins.len() != chunk.len() {
                return Err(NoticeScoreError::scoring(format!(
                    "classifier returned {} labels and {} margins for {} texts",
                    labels.len(),
                    margins.len(),
                    chunk.len()
                )));
            }

            for (offset, margin) in margins.iter().enumerate() {
                if !margin.is_finite() {
                    return Err(NoticeScoreError::scoring(format!(
                        "non-finite margin {margin} for text {}",
                        index * chunk_size + offset
                    )));
                }
                batch.distances.push(margin.abs());
            }
            batch.labels.extend(labels);
            debug!(chunk = index, size = chunk.len(), "chunk scored");
        }

        Ok(batch)
    }
}

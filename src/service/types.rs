//! Service layer types

use std::time::Duration;

use crate::engine::labels::CompositeLabel;
use crate::error::CascadeError;

/// Outcome of a full inference run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    /// Predictions per composite label
    pub label_counts: [usize; CompositeLabel::COUNT],
}

impl InferenceSummary {
    pub fn from_results(
        results: &[Result<CompositeLabel, CascadeError>],
        elapsed: Duration,
    ) -> Self {
        let mut label_counts = [0usize; CompositeLabel::COUNT];
        let mut succeeded = 0;
        for label in results.iter().filter_map(|r| r.as_ref().ok()) {
            label_counts[label.value() as usize] += 1;
            succeeded += 1;
        }

        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            elapsed_ms: elapsed.as_millis() as u64,
            label_counts,
        }
    }
}

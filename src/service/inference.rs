//! Inference Service - batch orchestration
//!
//! Splits the image list into batches and routes each batch on Tokio's
//! blocking pool. At most `num_workers` batches run at once. Results come
//! back in input order, one per image.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::InferenceConfig;
use crate::engine::labels::CompositeLabel;
use crate::engine::preprocess::{ImageTensor, Preprocessor};
use crate::engine::routing::RoutingPolicy;
use crate::error::CascadeError;
use crate::storage::InfoTable;

use super::types::InferenceSummary;

/// Turns an image file into the input type the classifiers accept
pub trait ImageLoader: Send + Sync + 'static {
    type Image: Send + 'static;

    fn load(&self, path: &Path) -> Result<Self::Image, CascadeError>;
}

impl ImageLoader for Preprocessor {
    type Image = ImageTensor;

    fn load(&self, path: &Path) -> Result<ImageTensor, CascadeError> {
        Preprocessor::load(self, path)
    }
}

type ImageResult = Result<CompositeLabel, CascadeError>;

/// Batch inference over a routing policy
pub struct InferenceService<L: ImageLoader> {
    loader: Arc<L>,
    policy: Arc<RoutingPolicy<L::Image>>,
    batch_size: usize,
    num_workers: usize,
}

impl<L: ImageLoader> InferenceService<L> {
    pub fn new(loader: L, policy: RoutingPolicy<L::Image>, config: &InferenceConfig) -> Self {
        Self {
            loader: Arc::new(loader),
            policy: Arc::new(policy),
            batch_size: config.batch_size.max(1),
            num_workers: config.num_workers.max(1),
        }
    }

    /// Route every image, one result per path in input order
    pub async fn predict(&self, paths: Vec<PathBuf>) -> Result<Vec<ImageResult>> {
        let total = paths.len();
        let batches: Vec<Vec<PathBuf>> = paths
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let num_batches = batches.len();

        let semaphore = Arc::new(Semaphore::new(self.num_workers));
        let mut tasks = JoinSet::new();

        for (batch_idx, batch) in batches.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("worker semaphore closed")?;
            let loader = self.loader.clone();
            let policy = self.policy.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let results: Vec<ImageResult> = batch
                    .iter()
                    .map(|path| {
                        let image = loader.load(path)?;
                        policy.route(&image)
                    })
                    .collect();
                (batch_idx, results)
            });
        }

        let mut by_batch: Vec<Option<Vec<ImageResult>>> = (0..num_batches).map(|_| None).collect();
        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            let (batch_idx, results) = joined.context("batch worker panicked")?;
            done += 1;
            debug!("Batch {}/{} done ({} images)", done, num_batches, results.len());
            by_batch[batch_idx] = Some(results);
        }

        let results: Vec<ImageResult> = by_batch.into_iter().flatten().flatten().collect();
        anyhow::ensure!(
            results.len() == total,
            "expected {} results, got {}",
            total,
            results.len()
        );

        // Only image-level errors may be reported per row; anything else ends the run
        let fatal = results.iter().enumerate().find_map(|(idx, r)| match r {
            Err(e) if !e.is_per_image() => Some((idx, e)),
            _ => None,
        });
        if let Some((idx, e)) = fatal {
            anyhow::bail!("inference aborted at image {}: {}", idx, error_chain(e));
        }

        Ok(results)
    }

    /// Predict every image listed in `table` and store labels in `label_column`
    pub async fn run_table(
        &self,
        table: &mut InfoTable,
        image_root: &Path,
        label_column: &str,
    ) -> Result<InferenceSummary> {
        let start = Instant::now();
        let ids: Vec<String> = table.image_ids().map(String::from).collect();
        let paths: Vec<PathBuf> = ids.iter().map(|id| image_root.join(id)).collect();

        info!(
            "Calculating inference results for {} images (batch size {}, {} workers)",
            paths.len(),
            self.batch_size,
            self.num_workers
        );

        let results = self.predict(paths).await?;

        for (id, result) in ids.iter().zip(&results) {
            if let Err(e) = result {
                warn!("Inference failed for {}: {}", id, error_chain(e));
            }
        }

        let labels: Vec<Option<CompositeLabel>> =
            results.iter().map(|r| r.as_ref().ok().copied()).collect();
        table.set_labels(label_column, &labels)?;

        let summary = InferenceSummary::from_results(&results, start.elapsed());
        info!(
            "Inference done: {}/{} succeeded, {} failed in {}ms",
            summary.succeeded, summary.total, summary.failed, summary.elapsed_ms
        );
        Ok(summary)
    }
}

/// Render an error with its source chain
fn error_chain(e: &CascadeError) -> String {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}

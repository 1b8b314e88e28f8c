use std::sync::mpsc;

use crate::data::batch::RemainderPolicy;
use crate::train::epoch_stats::EpochStats;

/// Loop hyperparameters for `Estimator::fit`.
///
/// - `epochs`: full passes over the training data (default 10)
/// - `batch_size`: samples per mini-batch (default 32)
/// - `remainder`: what to do with the short tail batch (default `Keep`)
/// - `seed`: fixes shuffling and dropout masks; `None` draws a fresh seed
/// - `progress_tx`: receives one `EpochStats` per epoch. A dropped receiver
///   is ignored and training carries on.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub remainder: RemainderPolicy,
    pub seed: Option<u64>,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            epochs: 10,
            batch_size: 32,
            remainder: RemainderPolicy::Keep,
            seed: None,
            progress_tx: None,
        }
    }
}

impl FitConfig {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        FitConfig { epochs, batch_size, ..FitConfig::default() }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_remainder(mut self, remainder: RemainderPolicy) -> Self {
        self.remainder = remainder;
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }
}

use serde::{Serialize, Deserialize};

/// Per-epoch training statistics returned by `Estimator::fit`.
///
/// When a `progress_tx` channel is configured in `FitConfig`, the same value
/// is also sent at the end of every completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub total_epochs: usize,
    /// Mean training loss over all samples in this epoch.
    pub train_loss: f64,
    /// Training accuracy as a fraction in [0, 1].
    pub train_accuracy: f64,
    /// Mean validation loss, if a validation set was provided.
    pub val_loss: Option<f64>,
    /// Validation ROC-AUC, if a validation set was provided.
    pub val_auc: Option<f64>,
    /// Wall-clock duration of this epoch in milliseconds, validation included.
    pub elapsed_ms: u64,
}

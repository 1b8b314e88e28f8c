pub mod epoch_stats;
pub mod estimator;
pub mod loop_fn;
pub mod train_config;

pub use epoch_stats::EpochStats;
pub use estimator::Estimator;
pub use loop_fn::{evaluate_scores, run_one_epoch, EpochSummary};
pub use train_config::FitConfig;

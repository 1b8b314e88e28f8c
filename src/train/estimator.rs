use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::dataset::{check_pairs, DataLoader};
use crate::device::Device;
use crate::error::{NnError, Result};
use crate::loss::{Loss, LossType};
use crate::math::tensor::Tensor;
use crate::metrics;
use crate::network::model::Model;
use crate::network::params::ParamStore;
use crate::optim::{Optimizer, OptimizerSpec};
use crate::train::epoch_stats::EpochStats;
use crate::train::loop_fn::{evaluate_scores, run_one_epoch};
use crate::train::train_config::FitConfig;

enum State {
    Uninitialized,
    Compiled {
        optimizer: Box<dyn Optimizer>,
        loss: Box<dyn Loss>,
    },
}

/// Training and evaluation harness around one classifier.
///
/// Lifecycle: `new` → `compile` → `fit` (any number of times) →
/// `evaluate` / `predict`. The estimator owns the model; use `model`,
/// `model_mut` or `into_model` to get it back.
pub struct Estimator<M: Model> {
    model: M,
    device: Device,
    state: State,
}

impl<M: Model> Estimator<M> {
    /// Wraps `model`, which must already live on `device`.
    pub fn new(model: M, device: Device) -> Result<Estimator<M>> {
        if model.device() != device {
            return Err(NnError::DeviceMismatch {
                estimator: device.to_string(),
                model: model.device().to_string(),
            });
        }
        Ok(Estimator { model, device, state: State::Uninitialized })
    }

    /// Binds the optimizer and loss used by `fit` and `evaluate`.
    /// Calling it again replaces both (and resets optimizer state).
    pub fn compile(&mut self, optimizer: Box<dyn Optimizer>, loss: Box<dyn Loss>) {
        tracing::debug!(
            model = self.model.name(),
            device = %self.device,
            optimizer = optimizer.name(),
            lr = optimizer.learning_rate(),
            loss = loss.name(),
            "compiled"
        );
        self.state = State::Compiled { optimizer, loss };
    }

    /// `compile` from serializable choices.
    pub fn compile_with(&mut self, optimizer: &OptimizerSpec, loss: LossType) {
        self.compile(optimizer.build(), loss.build());
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self.state, State::Compiled { .. })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Trains for `config.epochs` epochs, reshuffling every epoch.
    ///
    /// With `validation`, each epoch also reports validation loss and AUC
    /// (see `evaluate`). Returns one `EpochStats` per epoch.
    pub fn fit(
        &mut self,
        x: &Tensor,
        y: &[usize],
        config: &FitConfig,
        validation: Option<(&Tensor, &[usize])>,
    ) -> Result<Vec<EpochStats>> {
        if !self.is_compiled() {
            return Err(NnError::NotCompiled);
        }
        if let Some((vx, vy)) = validation {
            check_pairs(vx, vy)?;
        }
        let loader = DataLoader::new(x, y, config.batch_size, config.remainder)?;
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);

        tracing::info!(
            model = self.model.name(),
            samples = y.len(),
            epochs = config.epochs,
            batch_size = config.batch_size,
            seed,
            "starting fit"
        );

        let mut history = Vec::with_capacity(config.epochs);
        for epoch in 1..=config.epochs {
            let t_start = Instant::now();

            let summary = match &mut self.state {
                State::Compiled { optimizer, loss } => {
                    run_one_epoch(&mut self.model, optimizer.as_mut(), loss.as_ref(), &loader, &mut rng)?
                }
                State::Uninitialized => return Err(NnError::NotCompiled),
            };

            let (val_loss, val_auc) = match validation {
                Some((vx, vy)) => {
                    let (l, auc) = self.evaluate(vx, vy, config.batch_size)?;
                    (Some(l), Some(auc))
                }
                None => (None, None),
            };

            let stats = EpochStats {
                epoch,
                total_epochs: config.epochs,
                train_loss: summary.loss,
                train_accuracy: summary.accuracy,
                val_loss,
                val_auc,
                elapsed_ms: t_start.elapsed().as_millis() as u64,
            };
            tracing::info!(
                epoch,
                total = config.epochs,
                loss = stats.train_loss,
                acc = stats.train_accuracy,
                val_loss = ?stats.val_loss,
                val_auc = ?stats.val_auc,
                elapsed_ms = stats.elapsed_ms,
                "epoch finished"
            );

            if let Some(tx) = &config.progress_tx {
                // Nobody listening is fine.
                let _ = tx.send(stats.clone());
            }
            history.push(stats);
        }
        Ok(history)
    }

    /// Eval-mode pass over `(x, y)` in chunks of `batch_size`.
    ///
    /// Returns `(mean loss, ROC-AUC)`, the AUC computed on the softmax
    /// probability of class 1. Models with other than two score columns are
    /// rejected.
    pub fn evaluate(&mut self, x: &Tensor, y: &[usize], batch_size: usize) -> Result<(f64, f64)> {
        let loss_fn = match &self.state {
            State::Compiled { loss, .. } => loss,
            State::Uninitialized => return Err(NnError::NotCompiled),
        };
        check_pairs(x, y)?;
        let (loss, scores) = evaluate_scores(&mut self.model, loss_fn.as_ref(), x, y, batch_size)?;
        let (_, cols) = scores.dims2("Estimator::evaluate")?;
        if cols != 2 {
            return Err(NnError::InvalidArgument(format!(
                "ROC-AUC needs exactly 2 score columns, model produced {cols}"
            )));
        }
        let positive: Vec<f64> = scores.softmax_rows()?.data.chunks(2).map(|p| p[1]).collect();
        let auc = metrics::roc_auc(y, &positive)?;
        Ok((loss, auc))
    }

    /// Raw scores `[N, num_classes]` from an eval-mode forward pass.
    pub fn predict(&mut self, x: &Tensor) -> Result<Tensor> {
        self.model.predict_scores(x)
    }

    /// Row-wise softmax of `predict`, flattened row-major.
    pub fn predict_proba(&mut self, x: &Tensor) -> Result<Vec<f64>> {
        self.model.predict_proba(x)
    }

    /// Predicted class per sample (argmax of the scores).
    pub fn predict_classes(&mut self, x: &Tensor) -> Result<Vec<usize>> {
        metrics::argmax_rows(&self.predict(x)?)
    }

    /// Fraction of positions where `predicted` matches `truth`.
    pub fn accuracy(&self, predicted: &[usize], truth: &[usize]) -> Result<f64> {
        metrics::accuracy(predicted, truth)
    }

    /// Writes the model's parameters (buffers included) as JSON.
    pub fn save_weights(&self, path: &str) -> Result<()> {
        self.model.params().save_json(path)?;
        tracing::info!(path, params = self.model.params().len(), "saved weights");
        Ok(())
    }

    /// Loads parameters saved by `save_weights`; names and shapes must match.
    pub fn load_weights(&mut self, path: &str) -> Result<()> {
        let loaded = ParamStore::load_json(path)?;
        self.model.params_mut().load_from(&loaded)?;
        tracing::info!(path, "loaded weights");
        Ok(())
    }
}

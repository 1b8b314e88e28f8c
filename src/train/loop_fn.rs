use rand::rngs::StdRng;
use rand::Rng;

use crate::autograd::Graph;
use crate::data::batch::{batch_ranges, RemainderPolicy};
use crate::data::dataset::DataLoader;
use crate::error::{NnError, Result};
use crate::loss::Loss;
use crate::math::tensor::Tensor;
use crate::metrics::{accuracy, argmax_rows};
use crate::network::model::Model;
use crate::optim::Optimizer;

/// Mean over batches of the per-batch loss and accuracy of one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub loss: f64,
    pub accuracy: f64,
}

/// One full pass of mini-batch training over `loader`.
///
/// Per batch: zero gradients, forward in training mode, loss, backward,
/// optimizer step. `rng` drives both the shuffle and the dropout masks.
/// Every batch weighs the same in the epoch means, so a short tail batch
/// under `Keep` counts as much as a full one.
pub fn run_one_epoch<M: Model + ?Sized>(
    model: &mut M,
    optimizer: &mut dyn Optimizer,
    loss_fn: &dyn Loss,
    loader: &DataLoader<'_>,
    rng: &mut StdRng,
) -> Result<EpochSummary> {
    let mut losses = Vec::new();
    let mut accuracies = Vec::new();

    for (i, batch) in loader.epoch(rng)?.into_iter().enumerate() {
        model.params_mut().zero_grad();

        let mut graph = Graph::train(rng.gen());
        let x = graph.input(batch.features);
        let scores = model.forward(&mut graph, x)?;
        let loss = loss_fn.forward(&mut graph, scores, &batch.labels)?;
        graph.backward(loss, model.params_mut())?;
        optimizer.step(model.params_mut())?;

        let batch_loss = graph.value(loss).data[0];
        if !batch_loss.is_finite() {
            return Err(NnError::InvalidArgument(format!("loss diverged to {batch_loss} at batch {i}")));
        }
        let batch_acc = accuracy(&argmax_rows(graph.value(scores))?, &batch.labels)?;
        tracing::debug!(batch = i, size = batch.labels.len(), loss = batch_loss, acc = batch_acc, "batch done");

        losses.push(batch_loss);
        accuracies.push(batch_acc);
    }

    if losses.is_empty() {
        return Err(NnError::EmptyInput("run_one_epoch"));
    }
    let batches = losses.len() as f64;
    Ok(EpochSummary {
        loss: losses.iter().sum::<f64>() / batches,
        accuracy: accuracies.iter().sum::<f64>() / batches,
    })
}

/// Eval-mode forward over `x` in chunks of `batch_size`.
///
/// Returns the sample-weighted mean loss and the stacked score tensor.
pub fn evaluate_scores<M: Model + ?Sized>(
    model: &mut M,
    loss_fn: &dyn Loss,
    x: &Tensor,
    y: &[usize],
    batch_size: usize,
) -> Result<(f64, Tensor)> {
    let mut total_loss = 0.0;
    let mut chunks = Vec::new();
    for range in batch_ranges(y.len(), batch_size, RemainderPolicy::Keep)? {
        let n = range.len();
        let mut graph = Graph::eval();
        let input = graph.input(x.slice_rows(range.start, range.end)?);
        let scores = model.forward(&mut graph, input)?;
        let loss = loss_fn.forward(&mut graph, scores, &y[range])?;
        total_loss += graph.value(loss).data[0] * n as f64;
        chunks.push(graph.value(scores).clone());
    }
    let scores = Tensor::concat_rows(&chunks)?;
    Ok((total_loss / y.len() as f64, scores))
}

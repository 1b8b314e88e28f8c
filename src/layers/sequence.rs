use crate::autograd::{Graph, Var};
use crate::error::{NnError, Result};
use crate::math::tensor::Tensor;

/// Splits a batch-first `[N, T, F]` sequence into `T` step tensors `[N, F]`.
pub fn split_steps(g: &mut Graph, x: Var) -> Result<Vec<Var>> {
    let steps = match g.shape(x) {
        [_, t, _] => *t,
        other => return Err(NnError::shape("split_steps", "rank 3 [N, T, F]", other)),
    };
    if steps == 0 {
        return Err(NnError::EmptyInput("split_steps: zero-length sequence"));
    }
    (0..steps).map(|t| g.select_step(x, t)).collect()
}

/// Zero initial state `[batch, hidden]`.
pub fn zero_state(g: &mut Graph, batch: usize, hidden: usize) -> Var {
    g.input(Tensor::zeros(&[batch, hidden]))
}

/// Applies dropout to every step output (between stacked recurrent layers).
pub fn dropout_steps(g: &mut Graph, steps: Vec<Var>, p: f64) -> Result<Vec<Var>> {
    steps.into_iter().map(|s| g.dropout(s, p)).collect()
}

use crate::autograd::{Graph, Var};
use crate::device::Device;
use crate::error::Result;
use crate::math::tensor::Tensor;
use crate::network::params::ParamStore;

/// Capability every architecture exposes to the `Estimator`.
///
/// Implementors own their `ParamStore`; the estimator only reaches it through
/// `params_mut` to zero gradients and hand it to the optimizer.
pub trait Model {
    /// Short architecture name used in logs.
    fn name(&self) -> &'static str;

    fn device(&self) -> Device;

    fn num_classes(&self) -> usize;

    fn params(&self) -> &ParamStore;

    fn params_mut(&mut self) -> &mut ParamStore;

    /// Records the forward pass on `graph` and returns raw class scores
    /// `[batch, num_classes]`.
    ///
    /// Takes `&mut self` because batch-norm layers update their running
    /// statistics in training mode.
    fn forward(&mut self, graph: &mut Graph, input: Var) -> Result<Var>;

    /// Eval-mode forward pass returning the raw score tensor.
    fn predict_scores(&mut self, input: &Tensor) -> Result<Tensor> {
        let mut graph = Graph::eval();
        let x = graph.input(input.clone());
        let out = self.forward(&mut graph, x)?;
        Ok(graph.value(out).clone())
    }

    /// Row-wise softmax of the scores, flattened row-major
    /// (`[p(0|x0), p(1|x0), p(0|x1), ...]`).
    fn predict_proba(&mut self, input: &Tensor) -> Result<Vec<f64>> {
        Ok(self.predict_scores(input)?.softmax_rows()?.data)
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn device(&self) -> Device {
        (**self).device()
    }

    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn params(&self) -> &ParamStore {
        (**self).params()
    }

    fn params_mut(&mut self) -> &mut ParamStore {
        (**self).params_mut()
    }

    fn forward(&mut self, graph: &mut Graph, input: Var) -> Result<Var> {
        (**self).forward(graph, input)
    }

    fn predict_scores(&mut self, input: &Tensor) -> Result<Tensor> {
        (**self).predict_scores(input)
    }

    fn predict_proba(&mut self, input: &Tensor) -> Result<Vec<f64>> {
        (**self).predict_proba(input)
    }
}

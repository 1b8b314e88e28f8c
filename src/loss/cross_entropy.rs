use crate::autograd::{Graph, Var};
use crate::error::Result;
use crate::loss::Loss;

/// Softmax cross-entropy over raw scores, averaged over the batch.
///
///   L = -mean_i log(softmax(scores_i)[y_i] + eps)
///
/// The gradient w.r.t. the scores is `(softmax - one_hot) / batch`, so the
/// model's last layer should emit raw logits rather than probabilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss;

impl Loss for CrossEntropyLoss {
    fn forward(&self, graph: &mut Graph, scores: Var, targets: &[usize]) -> Result<Var> {
        graph.cross_entropy(scores, targets)
    }

    fn name(&self) -> &'static str {
        "cross_entropy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tensor::Tensor;

    #[test]
    fn uniform_scores_give_log_num_classes() {
        let mut g = Graph::eval();
        let scores = g.input(Tensor::zeros(&[4, 2]));
        let loss = CrossEntropyLoss.forward(&mut g, scores, &[0, 1, 1, 0]).unwrap();
        assert!((g.value(loss).data[0] - 2f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range_labels() {
        let mut g = Graph::eval();
        let scores = g.input(Tensor::zeros(&[1, 2]));
        assert!(CrossEntropyLoss.forward(&mut g, scores, &[2]).is_err());
    }
}

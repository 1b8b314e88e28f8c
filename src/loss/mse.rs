use crate::autograd::{Graph, Var};
use crate::error::{NnError, Result};
use crate::loss::Loss;
use crate::math::tensor::Tensor;

/// Mean squared error between the scores and one-hot encoded labels:
/// `mean((scores - one_hot)²)` over every element.
///
/// Pairs with models whose scores are already squashed (e.g. `Mlp`).
#[derive(Debug, Clone, Copy, Default)]
pub struct MseLoss;

impl MseLoss {
    /// One-hot encodes `targets` into `[n, num_classes]`.
    pub fn one_hot(targets: &[usize], num_classes: usize) -> Result<Tensor> {
        let mut t = Tensor::zeros(&[targets.len(), num_classes]);
        for (i, &y) in targets.iter().enumerate() {
            if y >= num_classes {
                return Err(NnError::InvalidLabels(format!("label {y} out of range for {num_classes} classes")));
            }
            t.data[i * num_classes + y] = 1.0;
        }
        Ok(t)
    }
}

impl Loss for MseLoss {
    fn forward(&self, graph: &mut Graph, scores: Var, targets: &[usize]) -> Result<Var> {
        let (_, c) = graph.value(scores).dims2("MseLoss")?;
        let target = MseLoss::one_hot(targets, c)?;
        graph.mse(scores, target)
    }

    fn name(&self) -> &'static str {
        "mse"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_scores_have_zero_loss() {
        let mut g = Graph::eval();
        let scores = g.input(Tensor::from_vec(&[2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap());
        let loss = MseLoss.forward(&mut g, scores, &[0, 1]).unwrap();
        assert_eq!(g.value(loss).data[0], 0.0);
    }

    #[test]
    fn averages_over_every_element() {
        let mut g = Graph::eval();
        let scores = g.input(Tensor::zeros(&[1, 2]));
        let loss = MseLoss.forward(&mut g, scores, &[1]).unwrap();
        assert!((g.value(loss).data[0] - 0.5).abs() < 1e-12);
    }
}

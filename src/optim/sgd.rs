use crate::error::{NnError, Result};
use crate::math::tensor::Tensor;
use crate::network::params::ParamStore;
use crate::optim::Optimizer;

/// Stochastic gradient descent with optional momentum and L2 weight decay.
///
/// ```text
/// g  = grad + weight_decay * w
/// v  = momentum * v + g          (skipped when momentum == 0)
/// w -= learning_rate * v
/// ```
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    velocity: Vec<Option<Tensor>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, momentum: 0.0, weight_decay: 0.0, velocity: Vec::new() }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Sgd {
        self.momentum = momentum;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Sgd {
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut ParamStore) -> Result<()> {
        if !(self.learning_rate > 0.0) {
            return Err(NnError::InvalidArgument(format!("learning rate must be positive, got {}", self.learning_rate)));
        }
        if self.velocity.len() != params.len() {
            self.velocity = vec![None; params.len()];
        }
        for (slot, p) in self.velocity.iter_mut().zip(params.iter_mut()) {
            if !p.trainable {
                continue;
            }
            let mut g = p.grad.clone();
            if g.shape != p.value.shape {
                return Err(NnError::shape("Sgd::step", &p.value.shape, &g.shape));
            }
            if self.weight_decay != 0.0 {
                for (gi, wi) in g.data.iter_mut().zip(&p.value.data) {
                    *gi += self.weight_decay * wi;
                }
            }
            if self.momentum != 0.0 {
                let v = slot.get_or_insert_with(|| Tensor::zeros(&p.value.shape));
                for (vi, gi) in v.data.iter_mut().zip(&g.data) {
                    *vi = self.momentum * *vi + gi;
                }
                g = v.clone();
            }
            for (wi, gi) in p.value.data.iter_mut().zip(&g.data) {
                *wi -= self.learning_rate * gi;
            }
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn name(&self) -> &'static str {
        "sgd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_step_moves_against_gradient() {
        let mut store = ParamStore::new();
        let id = store.register("w", Tensor::from_vec(&[2], vec![1.0, -1.0]).unwrap());
        store.accumulate_grad(id, &Tensor::from_vec(&[2], vec![0.5, -0.5]).unwrap()).unwrap();
        Sgd::new(0.1).step(&mut store).unwrap();
        let w = &store.value(id).data;
        assert!((w[0] - 0.95).abs() < 1e-12);
        assert!((w[1] + 0.95).abs() < 1e-12);
    }

    #[test]
    fn buffers_are_left_alone() {
        let mut store = ParamStore::new();
        let id = store.register_buffer("running_mean", Tensor::ones(&[1]));
        store.accumulate_grad(id, &Tensor::ones(&[1])).unwrap();
        Sgd::new(1.0).step(&mut store).unwrap();
        assert_eq!(store.value(id).data, vec![1.0]);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut store = ParamStore::new();
        let id = store.register("w", Tensor::zeros(&[1]));
        let mut opt = Sgd::new(1.0).with_momentum(0.5);
        for _ in 0..2 {
            store.zero_grad();
            store.accumulate_grad(id, &Tensor::ones(&[1])).unwrap();
            opt.step(&mut store).unwrap();
        }
        // v1 = 1, v2 = 1.5 → w = -(1 + 1.5)
        assert!((store.value(id).data[0] + 2.5).abs() < 1e-12);
    }
}

use crate::error::{NnError, Result};
use crate::math::tensor::Tensor;
use crate::network::params::ParamStore;
use crate::optim::Optimizer;

/// Adam with bias-corrected first and second moment estimates
/// (Kingma & Ba, 2015) and optional L2 weight decay folded into the gradient.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub weight_decay: f64,
    step_count: u64,
    moments: Vec<Option<(Tensor, Tensor)>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
            step_count: 0,
            moments: Vec::new(),
        }
    }

    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Adam {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Adam {
        self.weight_decay = weight_decay;
        self
    }

    /// Number of `step` calls so far.
    pub fn steps(&self) -> u64 {
        self.step_count
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut ParamStore) -> Result<()> {
        if !(self.learning_rate > 0.0) {
            return Err(NnError::InvalidArgument(format!("learning rate must be positive, got {}", self.learning_rate)));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(NnError::InvalidArgument(format!("betas must be in [0, 1), got ({}, {})", self.beta1, self.beta2)));
        }
        if self.moments.len() != params.len() {
            self.moments = vec![None; params.len()];
        }
        self.step_count += 1;
        let t = self.step_count as i32;
        let bias1 = 1.0 - self.beta1.powi(t);
        let bias2 = 1.0 - self.beta2.powi(t);

        for (slot, p) in self.moments.iter_mut().zip(params.iter_mut()) {
            if !p.trainable {
                continue;
            }
            if p.grad.shape != p.value.shape {
                return Err(NnError::shape("Adam::step", &p.value.shape, &p.grad.shape));
            }
            let (m, v) = slot.get_or_insert_with(|| (Tensor::zeros(&p.value.shape), Tensor::zeros(&p.value.shape)));
            for k in 0..p.value.data.len() {
                let g = p.grad.data[k] + self.weight_decay * p.value.data[k];
                m.data[k] = self.beta1 * m.data[k] + (1.0 - self.beta1) * g;
                v.data[k] = self.beta2 * v.data[k] + (1.0 - self.beta2) * g * g;
                let m_hat = m.data[k] / bias1;
                let v_hat = v.data[k] / bias2;
                p.value.data[k] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        // With bias correction the first update is lr * g / |g| = lr * sign(g).
        let mut store = ParamStore::new();
        let id = store.register("w", Tensor::from_vec(&[2], vec![0.0, 0.0]).unwrap());
        store.accumulate_grad(id, &Tensor::from_vec(&[2], vec![3.0, -0.2]).unwrap()).unwrap();
        let mut adam = Adam::new(0.01);
        adam.step(&mut store).unwrap();
        let w = &store.value(id).data;
        assert!((w[0] + 0.01).abs() < 1e-6);
        assert!((w[1] - 0.01).abs() < 1e-6);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn minimises_a_quadratic() {
        let mut store = ParamStore::new();
        let id = store.register("w", Tensor::from_vec(&[1], vec![5.0]).unwrap());
        let mut adam = Adam::new(0.1);
        for _ in 0..500 {
            store.zero_grad();
            let w = store.value(id).data[0];
            store.accumulate_grad(id, &Tensor::from_vec(&[1], vec![2.0 * (w - 1.0)]).unwrap()).unwrap();
            adam.step(&mut store).unwrap();
        }
        assert!((store.value(id).data[0] - 1.0).abs() < 5e-2);
    }
}

use crate::autograd::{Graph, Var};
use crate::error::Result;
use crate::math::tensor::Tensor;
use crate::network::params::{ParamId, ParamStore};

/// Per-channel batch normalisation for `[N, C, H, W]` activations.
///
/// `gamma`/`beta` are trainable; the running statistics are buffers updated
/// during training forward passes and used in eval mode.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    pub channels: usize,
    pub momentum: f64,
    pub eps: f64,
    gamma: ParamId,
    beta: ParamId,
    running_mean: ParamId,
    running_var: ParamId,
}

impl BatchNorm2d {
    pub fn new(store: &mut ParamStore, name: &str, channels: usize) -> BatchNorm2d {
        BatchNorm2d {
            channels,
            momentum: 0.1,
            eps: 1e-5,
            gamma: store.register(format!("{name}.weight"), Tensor::ones(&[channels])),
            beta: store.register(format!("{name}.bias"), Tensor::zeros(&[channels])),
            running_mean: store.register_buffer(format!("{name}.running_mean"), Tensor::zeros(&[channels])),
            running_var: store.register_buffer(format!("{name}.running_var"), Tensor::ones(&[channels])),
        }
    }

    pub fn forward(&self, g: &mut Graph, store: &mut ParamStore, x: Var) -> Result<Var> {
        let gamma = g.param(store, self.gamma);
        let beta = g.param(store, self.beta);
        let mut mean = store.value(self.running_mean).clone();
        let mut var = store.value(self.running_var).clone();
        let y = g.batch_norm2d(x, gamma, beta, &mut mean, &mut var, self.momentum, self.eps)?;
        if g.is_training() {
            *store.value_mut(self.running_mean) = mean;
            *store.value_mut(self.running_var) = var;
        }
        Ok(y)
    }
}

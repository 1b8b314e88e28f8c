use rand::rngs::StdRng;

use crate::activation::activation::ActivationFunction;
use crate::autograd::{Graph, Var};
use crate::error::Result;
use crate::math::tensor::Tensor;
use crate::network::params::{ParamId, ParamStore};

/// Fully connected layer: `activator(x · W + b)` with `W: [in, out]`.
#[derive(Debug, Clone)]
pub struct Linear {
    pub in_features: usize,
    pub out_features: usize,
    weights: ParamId,
    biases: ParamId,
    pub activator: ActivationFunction,
}

impl Linear {
    /// Uniform init in `±1/sqrt(in_features)`, identity activation.
    pub fn new(store: &mut ParamStore, name: &str, in_features: usize, out_features: usize, rng: &mut StdRng) -> Linear {
        let bound = 1.0 / (in_features.max(1) as f64).sqrt();
        Linear::with_bound(store, name, in_features, out_features, bound, rng)
    }

    /// Uniform init in `±bound`; recurrent cells use `1/sqrt(hidden)`.
    pub fn with_bound(
        store: &mut ParamStore,
        name: &str,
        in_features: usize,
        out_features: usize,
        bound: f64,
        rng: &mut StdRng,
    ) -> Linear {
        let weights = store.register(format!("{name}.weight"), Tensor::uniform(&[in_features, out_features], bound, rng));
        let biases = store.register(format!("{name}.bias"), Tensor::uniform(&[out_features], bound, rng));
        Linear {
            in_features,
            out_features,
            weights,
            biases,
            activator: ActivationFunction::Identity,
        }
    }

    pub fn with_activation(mut self, activation: ActivationFunction) -> Linear {
        self.activator = activation;
        self
    }

    pub fn feed_from(&self, g: &mut Graph, store: &ParamStore, input: Var) -> Result<Var> {
        let w = g.param(store, self.weights);
        let b = g.param(store, self.biases);
        let z = g.matmul(input, w)?;
        let z = g.add_bias(z, b)?;
        Ok(match self.activator {
            ActivationFunction::Identity => z,
            act => g.activate(z, act),
        })
    }
}

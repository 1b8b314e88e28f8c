use rand::rngs::StdRng;

use crate::activation::activation::ActivationFunction;
use crate::autograd::{Graph, Var};
use crate::device::Device;
use crate::error::{NnError, Result};
use crate::layers::{Dropout, Linear};
use crate::network::model::Model;
use crate::network::params::ParamStore;

/// One-hidden-layer perceptron:
/// `Linear → ReLU → Dropout → Linear → Sigmoid`.
///
/// The scores are sigmoid outputs, not logits; cross-entropy still works on
/// them but saturates sooner than with `LogisticRegression`.
#[derive(Debug, Clone)]
pub struct Mlp {
    device: Device,
    num_classes: usize,
    store: ParamStore,
    fc1: Linear,
    drop: Dropout,
    fc2: Linear,
}

impl Mlp {
    pub fn new(
        input_dim: usize,
        hidden_size: usize,
        num_classes: usize,
        dropout: f64,
        device: Device,
        rng: &mut StdRng,
    ) -> Result<Mlp> {
        if input_dim == 0 || hidden_size == 0 || num_classes < 2 {
            return Err(NnError::InvalidArgument(format!(
                "mlp needs positive sizes and at least 2 classes, got {input_dim}/{hidden_size}/{num_classes}"
            )));
        }
        let mut store = ParamStore::new();
        let fc1 = Linear::new(&mut store, "fc1", input_dim, hidden_size, rng)
            .with_activation(ActivationFunction::ReLU);
        let fc2 = Linear::new(&mut store, "fc2", hidden_size, num_classes, rng)
            .with_activation(ActivationFunction::Sigmoid);
        Ok(Mlp { device, num_classes, store, fc1, drop: Dropout::new(dropout)?, fc2 })
    }
}

impl Model for Mlp {
    fn name(&self) -> &'static str {
        "mlp"
    }

    fn device(&self) -> Device {
        self.device
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn params(&self) -> &ParamStore {
        &self.store
    }

    fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.store
    }

    fn forward(&mut self, graph: &mut Graph, input: Var) -> Result<Var> {
        let h = self.fc1.feed_from(graph, &self.store, input)?;
        let h = self.drop.forward(graph, h)?;
        self.fc2.feed_from(graph, &self.store, h)
    }
}

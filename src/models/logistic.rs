use rand::rngs::StdRng;

use crate::autograd::{Graph, Var};
use crate::device::Device;
use crate::error::{NnError, Result};
use crate::layers::linear::Linear;
use crate::network::model::Model;
use crate::network::params::ParamStore;

/// Multinomial logistic regression: a single linear layer over `[N, F]`.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    device: Device,
    num_classes: usize,
    store: ParamStore,
    linear: Linear,
}

impl LogisticRegression {
    pub fn new(input_size: usize, num_classes: usize, device: Device, rng: &mut StdRng) -> Result<LogisticRegression> {
        if input_size == 0 || num_classes < 2 {
            return Err(NnError::InvalidArgument(format!(
                "logistic regression needs input_size > 0 and at least 2 classes, got {input_size}/{num_classes}"
            )));
        }
        let mut store = ParamStore::new();
        let linear = Linear::new(&mut store, "linear", input_size, num_classes, rng);
        Ok(LogisticRegression { device, num_classes, store, linear })
    }
}

impl Model for LogisticRegression {
    fn name(&self) -> &'static str {
        "logistic_regression"
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
        self.linear.feed_from(graph, &self.store, input)
    }
}

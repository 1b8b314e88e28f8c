pub mod sgd;
pub mod adam;

pub use sgd::Sgd;
pub use adam::Adam;

use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::network::params::ParamStore;

/// Applies one parameter update from the gradients accumulated in the store.
pub trait Optimizer {
    fn step(&mut self, params: &mut ParamStore) -> Result<()>;

    fn learning_rate(&self) -> f64;

    fn name(&self) -> &'static str;
}

/// Serializable optimizer choice for run configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerSpec {
    Sgd {
        learning_rate: f64,
        #[serde(default)]
        momentum: f64,
        #[serde(default)]
        weight_decay: f64,
    },
    Adam {
        learning_rate: f64,
        #[serde(default)]
        weight_decay: f64,
    },
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        OptimizerSpec::Adam { learning_rate: 1e-4, weight_decay: 0.0 }
    }
}

impl OptimizerSpec {
    pub fn learning_rate(&self) -> f64 {
        match *self {
            OptimizerSpec::Sgd { learning_rate, .. } | OptimizerSpec::Adam { learning_rate, .. } => learning_rate,
        }
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        match self {
            OptimizerSpec::Sgd { learning_rate, .. } | OptimizerSpec::Adam { learning_rate, .. } => *learning_rate = lr,
        }
    }

    pub fn build(&self) -> Box<dyn Optimizer> {
        match *self {
            OptimizerSpec::Sgd { learning_rate, momentum, weight_decay } => Box::new(
                Sgd::new(learning_rate).with_momentum(momentum).with_weight_decay(weight_decay),
            ),
            OptimizerSpec::Adam { learning_rate, weight_decay } => {
                Box::new(Adam::new(learning_rate).with_weight_decay(weight_decay))
            }
        }
    }
}

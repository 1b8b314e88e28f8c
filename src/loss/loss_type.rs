use serde::{Serialize, Deserialize};

use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::mse::MseLoss;
use crate::loss::Loss;

/// Selects which loss function the estimator is compiled with.
///
/// - `CrossEntropy`: softmax cross-entropy on raw scores; the default.
/// - `Mse`: squared error against one-hot labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    #[default]
    CrossEntropy,
    Mse,
}

impl LossType {
    pub fn build(self) -> Box<dyn Loss> {
        match self {
            LossType::CrossEntropy => Box::new(CrossEntropyLoss),
            LossType::Mse => Box::new(MseLoss),
        }
    }
}

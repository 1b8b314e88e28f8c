pub mod error;
pub mod device;
pub mod math;
pub mod activation;
pub mod autograd;
pub mod network;
pub mod layers;
pub mod models;
pub mod loss;
pub mod optim;
pub mod data;
pub mod metrics;
pub mod train;

// Convenience re-exports
pub use error::{NnError, Result};
pub use device::Device;
pub use math::tensor::Tensor;
pub use activation::activation::ActivationFunction;
pub use autograd::{Graph, Var};
pub use network::{Model, ModelKind, ModelSpec, ParamStore, RunSpec};
pub use loss::{CrossEntropyLoss, Loss, LossType, MseLoss};
pub use optim::{Adam, Optimizer, OptimizerSpec, Sgd};
pub use data::{batch, Dataset, RemainderPolicy};
pub use train::{EpochStats, Estimator, FitConfig};

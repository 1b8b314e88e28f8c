pub mod mse;
pub mod cross_entropy;
pub mod loss_type;

pub use mse::MseLoss;
pub use cross_entropy::CrossEntropyLoss;
pub use loss_type::LossType;

use crate::autograd::{Graph, Var};
use crate::error::Result;

/// Scalar training objective recorded on the graph so it can be
/// differentiated.
pub trait Loss {
    /// `scores: [n, num_classes]`, `targets`: class index per row.
    fn forward(&self, graph: &mut Graph, scores: Var, targets: &[usize]) -> Result<Var>;

    fn name(&self) -> &'static str;
}

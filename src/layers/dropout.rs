use crate::autograd::{Graph, Var};
use crate::error::{NnError, Result};

/// Inverted dropout; a no-op when the graph is in eval mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    pub p: f64,
}

impl Dropout {
    pub fn new(p: f64) -> Result<Dropout> {
        if !(0.0..1.0).contains(&p) {
            return Err(NnError::InvalidArgument(format!(
                "dropout probability must be in [0, 1), got {p}"
            )));
        }
        Ok(Dropout { p })
    }

    pub fn forward(&self, g: &mut Graph, x: Var) -> Result<Var> {
        g.dropout(x, self.p)
    }
}

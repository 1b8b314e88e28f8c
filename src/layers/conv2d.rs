use rand::rngs::StdRng;

use crate::autograd::{Graph, Var};
use crate::error::{NnError, Result};
use crate::math::conv::{self, Conv2dGeometry};
use crate::math::tensor::Tensor;
use crate::network::params::{ParamId, ParamStore};

/// 2-D convolution over `[N, C, H, W]` with symmetric zero padding.
#[derive(Debug, Clone)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: (usize, usize),
    pub geo: Conv2dGeometry,
    weight: ParamId,
    bias: ParamId,
}

impl Conv2d {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: &mut ParamStore,
        name: &str,
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        stride: (usize, usize),
        padding: usize,
        rng: &mut StdRng,
    ) -> Result<Conv2d> {
        if in_channels == 0 || out_channels == 0 || kernel.0 == 0 || kernel.1 == 0 {
            return Err(NnError::InvalidArgument(format!(
                "{name}: channels and kernel must be positive"
            )));
        }
        if stride.0 == 0 || stride.1 == 0 {
            return Err(NnError::InvalidArgument(format!("{name}: stride must be positive")));
        }
        let fan_in = in_channels * kernel.0 * kernel.1;
        let bound = 1.0 / (fan_in as f64).sqrt();
        let weight = store.register(
            format!("{name}.weight"),
            Tensor::uniform(&[out_channels, in_channels, kernel.0, kernel.1], bound, rng),
        );
        let bias = store.register(format!("{name}.bias"), Tensor::uniform(&[out_channels], bound, rng));
        Ok(Conv2d {
            in_channels,
            out_channels,
            kernel,
            geo: Conv2dGeometry { stride, padding: (padding, padding) },
            weight,
            bias,
        })
    }

    /// Output `(height, width)` for a given input size.
    pub fn out_dims(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        Ok((
            conv::out_size(h, self.kernel.0, self.geo.stride.0, self.geo.padding.0)?,
            conv::out_size(w, self.kernel.1, self.geo.stride.1, self.geo.padding.1)?,
        ))
    }

    pub fn forward(&self, g: &mut Graph, store: &ParamStore, x: Var) -> Result<Var> {
        let w = g.param(store, self.weight);
        let b = g.param(store, self.bias);
        g.conv2d(x, w, b, self.geo)
    }
}

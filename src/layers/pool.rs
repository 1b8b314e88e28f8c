use crate::autograd::{Graph, Var};
use crate::error::Result;
use crate::math::conv;

/// Max pooling without padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPool2d {
    pub kernel: (usize, usize),
    pub stride: (usize, usize),
}

impl MaxPool2d {
    /// Stride defaults to the kernel size.
    pub fn new(kernel: (usize, usize)) -> MaxPool2d {
        MaxPool2d { kernel, stride: kernel }
    }

    pub fn with_stride(kernel: (usize, usize), stride: (usize, usize)) -> MaxPool2d {
        MaxPool2d { kernel, stride }
    }

    pub fn out_dims(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        Ok((
            conv::out_size(h, self.kernel.0, self.stride.0, 0)?,
            conv::out_size(w, self.kernel.1, self.stride.1, 0)?,
        ))
    }

    pub fn forward(&self, g: &mut Graph, x: Var) -> Result<Var> {
        g.max_pool2d(x, self.kernel, self.stride)
    }
}

//! Direct (loop-based) 2-D convolution and max-pooling kernels on
//! `[N, C, H, W]` tensors, forward and backward.

use crate::error::{NnError, Result};
use crate::math::tensor::Tensor;

/// Spatial output length: `(input + 2*padding - kernel) / stride + 1`.
pub fn out_size(input: usize, kernel: usize, stride: usize, padding: usize) -> Result<usize> {
    if stride == 0 || kernel == 0 {
        return Err(NnError::InvalidArgument("kernel and stride must be positive".into()));
    }
    let padded = input + 2 * padding;
    if padded < kernel {
        return Err(NnError::InvalidArgument(format!(
            "kernel {kernel} larger than padded input {padded}"
        )));
    }
    Ok((padded - kernel) / stride + 1)
}

fn dims4(t: &Tensor, op: &'static str) -> Result<(usize, usize, usize, usize)> {
    match t.shape.as_slice() {
        [n, c, h, w] => Ok((*n, *c, *h, *w)),
        other => Err(NnError::shape(op, "rank 4 [N, C, H, W]", other)),
    }
}

/// Geometry shared by the convolution forward and backward passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dGeometry {
    pub stride: (usize, usize),
    pub padding: (usize, usize),
}

/// `x: [N, C, H, W]`, `weight: [O, C, KH, KW]`, `bias: [O]` → `[N, O, OH, OW]`.
pub fn conv2d_forward(x: &Tensor, weight: &Tensor, bias: &Tensor, geo: Conv2dGeometry) -> Result<Tensor> {
    let (n, c, h, w) = dims4(x, "conv2d")?;
    let (o, wc, kh, kw) = dims4(weight, "conv2d weight")?;
    if wc != c {
        return Err(NnError::shape("conv2d", [o, c, kh, kw], &weight.shape));
    }
    if bias.shape != [o] {
        return Err(NnError::shape("conv2d bias", [o], &bias.shape));
    }
    let (sh, sw) = geo.stride;
    let (ph, pw) = geo.padding;
    let oh = out_size(h, kh, sh, ph)?;
    let ow = out_size(w, kw, sw, pw)?;

    let mut out = Tensor::zeros(&[n, o, oh, ow]);
    for b in 0..n {
        for oc in 0..o {
            for y in 0..oh {
                for xo in 0..ow {
                    let mut acc = bias.data[oc];
                    for ic in 0..c {
                        for ky in 0..kh {
                            let iy = (y * sh + ky) as isize - ph as isize;
                            if iy < 0 || iy >= h as isize {
                                continue;
                            }
                            for kx in 0..kw {
                                let ix = (xo * sw + kx) as isize - pw as isize;
                                if ix < 0 || ix >= w as isize {
                                    continue;
                                }
                                let xv = x.data[((b * c + ic) * h + iy as usize) * w + ix as usize];
                                let wv = weight.data[((oc * c + ic) * kh + ky) * kw + kx];
                                acc += xv * wv;
                            }
                        }
                    }
                    out.data[((b * o + oc) * oh + y) * ow + xo] = acc;
                }
            }
        }
    }
    Ok(out)
}

/// Gradients of `conv2d_forward` w.r.t. input, weight and bias.
pub fn conv2d_backward(
    x: &Tensor,
    weight: &Tensor,
    grad_out: &Tensor,
    geo: Conv2dGeometry,
) -> Result<(Tensor, Tensor, Tensor)> {
    let (n, c, h, w) = dims4(x, "conv2d backward")?;
    let (o, _, kh, kw) = dims4(weight, "conv2d backward weight")?;
    let (gn, go, oh, ow) = dims4(grad_out, "conv2d backward grad")?;
    if gn != n || go != o {
        return Err(NnError::shape("conv2d backward", [n, o], [gn, go]));
    }
    let (sh, sw) = geo.stride;
    let (ph, pw) = geo.padding;

    let mut dx = Tensor::zeros(&x.shape);
    let mut dw = Tensor::zeros(&weight.shape);
    let mut db = Tensor::zeros(&[o]);
    for b in 0..n {
        for oc in 0..o {
            for y in 0..oh {
                for xo in 0..ow {
                    let g = grad_out.data[((b * o + oc) * oh + y) * ow + xo];
                    if g == 0.0 {
                        continue;
                    }
                    db.data[oc] += g;
                    for ic in 0..c {
                        for ky in 0..kh {
                            let iy = (y * sh + ky) as isize - ph as isize;
                            if iy < 0 || iy >= h as isize {
                                continue;
                            }
                            for kx in 0..kw {
                                let ix = (xo * sw + kx) as isize - pw as isize;
                                if ix < 0 || ix >= w as isize {
                                    continue;
                                }
                                let xi = ((b * c + ic) * h + iy as usize) * w + ix as usize;
                                let wi = ((oc * c + ic) * kh + ky) * kw + kx;
                                dx.data[xi] += g * weight.data[wi];
                                dw.data[wi] += g * x.data[xi];
                            }
                        }
                    }
                }
            }
        }
    }
    Ok((dx, dw, db))
}

/// Max pooling over `[N, C, H, W]` without padding.
///
/// Returns the pooled tensor and, for every output element, the flat index
/// of the input element that won (first maximum on ties).
pub fn max_pool2d_forward(
    x: &Tensor,
    kernel: (usize, usize),
    stride: (usize, usize),
) -> Result<(Tensor, Vec<usize>)> {
    let (n, c, h, w) = dims4(x, "max_pool2d")?;
    let oh = out_size(h, kernel.0, stride.0, 0)?;
    let ow = out_size(w, kernel.1, stride.1, 0)?;

    let mut out = Tensor::zeros(&[n, c, oh, ow]);
    let mut winners = vec![0usize; out.numel()];
    for plane in 0..n * c {
        let base = plane * h * w;
        for y in 0..oh {
            for xo in 0..ow {
                let mut best_idx = base + (y * stride.0) * w + xo * stride.1;
                let mut best = x.data[best_idx];
                for ky in 0..kernel.0 {
                    for kx in 0..kernel.1 {
                        let idx = base + (y * stride.0 + ky) * w + xo * stride.1 + kx;
                        if x.data[idx] > best {
                            best = x.data[idx];
                            best_idx = idx;
                        }
                    }
                }
                let o = (plane * oh + y) * ow + xo;
                out.data[o] = best;
                winners[o] = best_idx;
            }
        }
    }
    Ok((out, winners))
}

/// Routes each output gradient back to the input element that won the pool.
pub fn max_pool2d_backward(input_shape: &[usize], winners: &[usize], grad_out: &Tensor) -> Tensor {
    let mut dx = Tensor::zeros(input_shape);
    for (g, &idx) in grad_out.data.iter().zip(winners) {
        dx.data[idx] += g;
    }
    dx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_size_follows_floor_formula() {
        assert_eq!(out_size(12, 5, 1, 0).unwrap(), 8);
        assert_eq!(out_size(12, 3, 3, 0).unwrap(), 4);
        assert_eq!(out_size(13, 3, 3, 0).unwrap(), 4);
        assert_eq!(out_size(5, 2, 2, 0).unwrap(), 2);
        assert!(out_size(3, 5, 1, 0).is_err());
    }

    #[test]
    fn conv2d_identity_kernel_copies_input() {
        let x = Tensor::from_vec(&[1, 1, 2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let w = Tensor::from_vec(&[1, 1, 1, 1], vec![1.0]).unwrap();
        let b = Tensor::zeros(&[1]);
        let geo = Conv2dGeometry { stride: (1, 1), padding: (0, 0) };
        let y = conv2d_forward(&x, &w, &b, geo).unwrap();
        assert_eq!(y.data, x.data);
    }

    #[test]
    fn conv2d_horizontal_kernel_sums_window() {
        let x = Tensor::from_vec(&[1, 1, 1, 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let w = Tensor::from_vec(&[1, 1, 1, 2], vec![1.0, 1.0]).unwrap();
        let b = Tensor::from_vec(&[1], vec![0.5]).unwrap();
        let geo = Conv2dGeometry { stride: (1, 1), padding: (0, 0) };
        let y = conv2d_forward(&x, &w, &b, geo).unwrap();
        assert_eq!(y.shape, vec![1, 1, 1, 3]);
        assert_eq!(y.data, vec![3.5, 5.5, 7.5]);
    }

    #[test]
    fn max_pool_picks_window_maximum_and_routes_gradient() {
        let x = Tensor::from_vec(&[1, 1, 1, 6], vec![1.0, 5.0, 2.0, 0.0, 7.0, 3.0]).unwrap();
        let (y, winners) = max_pool2d_forward(&x, (1, 3), (1, 3)).unwrap();
        assert_eq!(y.data, vec![5.0, 7.0]);
        let g = Tensor::from_vec(&[1, 1, 1, 2], vec![1.0, 2.0]).unwrap();
        let dx = max_pool2d_backward(&x.shape, &winners, &g);
        assert_eq!(dx.data, vec![0.0, 1.0, 0.0, 0.0, 2.0, 0.0]);
    }
}

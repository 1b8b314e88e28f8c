use crate::autograd::graph::{Graph, Op, Var};
use crate::error::{NnError, Result};
use crate::math::conv;
use crate::math::tensor::Tensor;
use crate::network::params::ParamStore;

impl Graph {
    /// Reverse-mode pass from the scalar `loss`.
    ///
    /// Walks the tape backwards, routing each node's gradient to its inputs,
    /// and adds the gradients of `Param` leaves into `store`.  Gradients are
    /// accumulated, so call `ParamStore::zero_grad` between steps.
    pub fn backward(&self, loss: Var, store: &mut ParamStore) -> Result<()> {
        let root = &self.nodes[loss.0].value;
        if root.numel() != 1 {
            return Err(NnError::shape("Graph::backward", "scalar loss", &root.shape));
        }

        let mut grads: Vec<Option<Tensor>> = vec![None; loss.0 + 1];
        grads[loss.0] = Some(Tensor::ones(&root.shape));

        for i in (0..=loss.0).rev() {
            let Some(g) = grads[i].take() else { continue };
            let node = &self.nodes[i];
            match &node.op {
                Op::Input => {}
                Op::Param(id) => store.accumulate_grad(*id, &g)?,
                Op::MatMul(a, b) => {
                    let ga = g.matmul(&self.value(*b).transpose()?)?;
                    let gb = self.value(*a).transpose()?.matmul(&g)?;
                    accumulate(&mut grads, *a, ga)?;
                    accumulate(&mut grads, *b, gb)?;
                }
                Op::Add(a, b) => {
                    accumulate(&mut grads, *a, g.clone())?;
                    accumulate(&mut grads, *b, g)?;
                }
                Op::AddBias(x, bias) => {
                    let (n, m) = g.dims2("backward add_bias")?;
                    let mut gb = Tensor::zeros(&[m]);
                    for r in 0..n {
                        for c in 0..m {
                            gb.data[c] += g.data[r * m + c];
                        }
                    }
                    accumulate(&mut grads, *bias, gb)?;
                    accumulate(&mut grads, *x, g)?;
                }
                Op::Mul(a, b) => {
                    let ga = g.zip_map(self.value(*b), "backward mul", |go, bv| go * bv)?;
                    let gb = g.zip_map(self.value(*a), "backward mul", |go, av| go * av)?;
                    accumulate(&mut grads, *a, ga)?;
                    accumulate(&mut grads, *b, gb)?;
                }
                Op::OneMinus(x) => accumulate(&mut grads, *x, g.map(|v| -v))?,
                Op::Activate(x, act) => {
                    let gx = g.zip_map(self.value(*x), "backward activate", |go, pre| go * act.derivative(pre))?;
                    accumulate(&mut grads, *x, gx)?;
                }
                Op::Dropout(x, mask) => {
                    let mut gx = g;
                    for (v, m) in gx.data.iter_mut().zip(mask) {
                        *v *= m;
                    }
                    accumulate(&mut grads, *x, gx)?;
                }
                Op::Conv2d { input, weight, bias, geo } => {
                    let (dx, dw, db) = conv::conv2d_backward(self.value(*input), self.value(*weight), &g, *geo)?;
                    accumulate(&mut grads, *input, dx)?;
                    accumulate(&mut grads, *weight, dw)?;
                    accumulate(&mut grads, *bias, db)?;
                }
                Op::MaxPool2d { input, winners } => {
                    let dx = conv::max_pool2d_backward(self.shape(*input), winners, &g);
                    accumulate(&mut grads, *input, dx)?;
                }
                Op::BatchNorm2d { input, gamma, beta, xhat, inv_std, batch_stats } => {
                    let (dx, dgamma, dbeta) =
                        batch_norm_backward(&g, xhat, inv_std, self.value(*gamma), *batch_stats)?;
                    accumulate(&mut grads, *input, dx)?;
                    accumulate(&mut grads, *gamma, dgamma)?;
                    accumulate(&mut grads, *beta, dbeta)?;
                }
                Op::Reshape(x) => {
                    let gx = g.reshape(self.shape(*x))?;
                    accumulate(&mut grads, *x, gx)?;
                }
                Op::ConcatCols(parts) => {
                    let (n, total) = g.dims2("backward concat_cols")?;
                    let mut offset = 0;
                    for &p in parts {
                        let wd = self.value(p).row_len();
                        let mut gp = Tensor::zeros(&[n, wd]);
                        for r in 0..n {
                            let src = &g.data[r * total + offset..r * total + offset + wd];
                            gp.data[r * wd..(r + 1) * wd].copy_from_slice(src);
                        }
                        offset += wd;
                        accumulate(&mut grads, p, gp)?;
                    }
                }
                Op::SelectStep { input, step } => {
                    let shape = self.shape(*input);
                    let (t, f) = (shape[1], shape[2]);
                    let mut gx = Tensor::zeros(shape);
                    for b in 0..shape[0] {
                        let dst = (b * t + step) * f;
                        gx.data[dst..dst + f].copy_from_slice(&g.data[b * f..(b + 1) * f]);
                    }
                    accumulate(&mut grads, *input, gx)?;
                }
                Op::CrossEntropy { logits, probs, targets } => {
                    let (n, c) = probs.dims2("backward cross_entropy")?;
                    let scale = g.data[0] / n as f64;
                    let mut gx = probs.map(|p| p * scale);
                    for (r, &t) in targets.iter().enumerate() {
                        gx.data[r * c + t] -= scale;
                    }
                    accumulate(&mut grads, *logits, gx)?;
                }
                Op::Mse { input, target } => {
                    let scale = 2.0 * g.data[0] / target.numel() as f64;
                    let gx = self.value(*input).zip_map(target, "backward mse", |x, y| scale * (x - y))?;
                    accumulate(&mut grads, *input, gx)?;
                }
            }
        }
        Ok(())
    }
}

fn accumulate(grads: &mut [Option<Tensor>], v: Var, g: Tensor) -> Result<()> {
    if let Some(existing) = grads[v.0].as_mut() {
        existing.add_assign(&g)?;
    } else {
        grads[v.0] = Some(g);
    }
    Ok(())
}

/// Gradients of per-channel batch norm w.r.t. input, gamma and beta.
fn batch_norm_backward(
    g: &Tensor,
    xhat: &Tensor,
    inv_std: &[f64],
    gamma: &Tensor,
    batch_stats: bool,
) -> Result<(Tensor, Tensor, Tensor)> {
    let (n, c, h, w) = match g.shape.as_slice() {
        [n, c, h, w] => (*n, *c, *h, *w),
        other => return Err(NnError::shape("backward batch_norm2d", "rank 4", other)),
    };
    let plane = h * w;
    let m = (n * plane) as f64;
    let mut dx = Tensor::zeros(&g.shape);
    let mut dgamma = Tensor::zeros(&[c]);
    let mut dbeta = Tensor::zeros(&[c]);

    for ch in 0..c {
        let mut sum_g = 0.0;
        let mut sum_g_xhat = 0.0;
        for b in 0..n {
            let base = (b * c + ch) * plane;
            for k in base..base + plane {
                sum_g += g.data[k];
                sum_g_xhat += g.data[k] * xhat.data[k];
            }
        }
        dgamma.data[ch] = sum_g_xhat;
        dbeta.data[ch] = sum_g;

        let scale = gamma.data[ch] * inv_std[ch];
        for b in 0..n {
            let base = (b * c + ch) * plane;
            for k in base..base + plane {
                dx.data[k] = if batch_stats {
                    scale * (g.data[k] - sum_g / m - xhat.data[k] * sum_g_xhat / m)
                } else {
                    scale * g.data[k]
                };
            }
        }
    }
    Ok((dx, dgamma, dbeta))
}

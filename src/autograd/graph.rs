use rand::prelude::*;
use rand::rngs::StdRng;

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::math::conv::{self, Conv2dGeometry};
use crate::math::tensor::Tensor;
use crate::network::params::{ParamId, ParamStore};

/// Handle to a node recorded on a `Graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(pub(crate) usize);

/// How a node was produced; everything `backward` needs to route gradients.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    Input,
    Param(ParamId),
    MatMul(Var, Var),
    Add(Var, Var),
    AddBias(Var, Var),
    Mul(Var, Var),
    OneMinus(Var),
    Activate(Var, ActivationFunction),
    Dropout(Var, Vec<f64>),
    Conv2d { input: Var, weight: Var, bias: Var, geo: Conv2dGeometry },
    MaxPool2d { input: Var, winners: Vec<usize> },
    BatchNorm2d { input: Var, gamma: Var, beta: Var, xhat: Tensor, inv_std: Vec<f64>, batch_stats: bool },
    Reshape(Var),
    ConcatCols(Vec<Var>),
    SelectStep { input: Var, step: usize },
    CrossEntropy { logits: Var, probs: Tensor, targets: Vec<usize> },
    Mse { input: Var, target: Tensor },
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) value: Tensor,
    pub(crate) op: Op,
}

/// Tape of operations recorded during one forward pass.
///
/// A graph is built per batch and thrown away after `backward`.  In eval
/// mode (`training == false`) dropout is the identity and batch norm uses
/// its running statistics.
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    training: bool,
    rng: StdRng,
}

impl Graph {
    /// Training-mode graph; `seed` drives dropout masks.
    pub fn train(seed: u64) -> Graph {
        Graph { nodes: Vec::new(), training: true, rng: StdRng::seed_from_u64(seed) }
    }

    /// Inference graph.
    pub fn eval() -> Graph {
        Graph { nodes: Vec::new(), training: false, rng: StdRng::seed_from_u64(0) }
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn value(&self, v: Var) -> &Tensor {
        &self.nodes[v.0].value
    }

    pub fn shape(&self, v: Var) -> &[usize] {
        &self.nodes[v.0].value.shape
    }

    fn push(&mut self, value: Tensor, op: Op) -> Var {
        self.nodes.push(Node { value, op });
        Var(self.nodes.len() - 1)
    }

    /// Records a constant input.
    pub fn input(&mut self, value: Tensor) -> Var {
        self.push(value, Op::Input)
    }

    /// Records a parameter leaf; its gradient lands in `store` on `backward`.
    pub fn param(&mut self, store: &ParamStore, id: ParamId) -> Var {
        self.push(store.value(id).clone(), Op::Param(id))
    }

    pub fn matmul(&mut self, a: Var, b: Var) -> Result<Var> {
        let value = self.value(a).matmul(self.value(b))?;
        Ok(self.push(value, Op::MatMul(a, b)))
    }

    pub fn add(&mut self, a: Var, b: Var) -> Result<Var> {
        let value = self.value(a).zip_map(self.value(b), "Graph::add", |x, y| x + y)?;
        Ok(self.push(value, Op::Add(a, b)))
    }

    pub fn mul(&mut self, a: Var, b: Var) -> Result<Var> {
        let value = self.value(a).zip_map(self.value(b), "Graph::mul", |x, y| x * y)?;
        Ok(self.push(value, Op::Mul(a, b)))
    }

    /// `[n, m] + [m]`, broadcasting the bias over rows.
    pub fn add_bias(&mut self, x: Var, bias: Var) -> Result<Var> {
        let (n, m) = self.value(x).dims2("Graph::add_bias")?;
        if self.shape(bias) != [m] {
            return Err(NnError::shape("Graph::add_bias", [m], self.shape(bias)));
        }
        let mut value = self.value(x).clone();
        let b = &self.nodes[bias.0].value.data;
        for i in 0..n {
            for j in 0..m {
                value.data[i * m + j] += b[j];
            }
        }
        Ok(self.push(value, Op::AddBias(x, bias)))
    }

    /// `1 - x`, element-wise.
    pub fn one_minus(&mut self, x: Var) -> Var {
        let value = self.value(x).map(|v| 1.0 - v);
        self.push(value, Op::OneMinus(x))
    }

    pub fn activate(&mut self, x: Var, act: ActivationFunction) -> Var {
        let value = self.value(x).map(|v| act.function(v));
        self.push(value, Op::Activate(x, act))
    }

    /// Inverted dropout: zeroes each element with probability `p` and scales
    /// survivors by `1 / (1 - p)`.  Identity outside training.
    pub fn dropout(&mut self, x: Var, p: f64) -> Result<Var> {
        if !(0.0..1.0).contains(&p) {
            return Err(NnError::InvalidArgument(format!("dropout probability must be in [0, 1), got {p}")));
        }
        if !self.training || p == 0.0 {
            return Ok(x);
        }
        let scale = 1.0 / (1.0 - p);
        let n = self.value(x).numel();
        let mask: Vec<f64> = (0..n)
            .map(|_| if self.rng.gen::<f64>() < p { 0.0 } else { scale })
            .collect();
        let mut value = self.value(x).clone();
        for (v, m) in value.data.iter_mut().zip(&mask) {
            *v *= m;
        }
        Ok(self.push(value, Op::Dropout(x, mask)))
    }

    pub fn conv2d(&mut self, input: Var, weight: Var, bias: Var, geo: Conv2dGeometry) -> Result<Var> {
        let value = conv::conv2d_forward(self.value(input), self.value(weight), self.value(bias), geo)?;
        Ok(self.push(value, Op::Conv2d { input, weight, bias, geo }))
    }

    pub fn max_pool2d(&mut self, input: Var, kernel: (usize, usize), stride: (usize, usize)) -> Result<Var> {
        let (value, winners) = conv::max_pool2d_forward(self.value(input), kernel, stride)?;
        Ok(self.push(value, Op::MaxPool2d { input, winners }))
    }

    /// Per-channel batch normalisation over `[N, C, H, W]`.
    ///
    /// Training mode normalises with the batch statistics and folds them into
    /// `running_mean` / `running_var` (unbiased variance) with `momentum`;
    /// eval mode normalises with the running statistics.
    #[allow(clippy::too_many_arguments)]
    pub fn batch_norm2d(
        &mut self,
        input: Var,
        gamma: Var,
        beta: Var,
        running_mean: &mut Tensor,
        running_var: &mut Tensor,
        momentum: f64,
        eps: f64,
    ) -> Result<Var> {
        let x = self.value(input);
        let (n, c, h, w) = match x.shape.as_slice() {
            [n, c, h, w] => (*n, *c, *h, *w),
            other => return Err(NnError::shape("Graph::batch_norm2d", "rank 4 [N, C, H, W]", other)),
        };
        for (name, t) in [("gamma", self.value(gamma)), ("beta", self.value(beta))] {
            if t.shape != [c] {
                return Err(NnError::ShapeMismatch {
                    op: "Graph::batch_norm2d",
                    expected: format!("{name} [{c}]"),
                    actual: format!("{:?}", t.shape),
                });
            }
        }
        let plane = h * w;
        let count = n * plane;
        let batch_stats = self.training;
        if batch_stats && count < 2 {
            return Err(NnError::InvalidArgument(
                "batch norm needs more than one value per channel in training".into(),
            ));
        }

        let mut means = vec![0.0; c];
        let mut vars = vec![0.0; c];
        if batch_stats {
            for ch in 0..c {
                let mut sum = 0.0;
                for b in 0..n {
                    let base = (b * c + ch) * plane;
                    sum += x.data[base..base + plane].iter().sum::<f64>();
                }
                let mean = sum / count as f64;
                let mut sq = 0.0;
                for b in 0..n {
                    let base = (b * c + ch) * plane;
                    sq += x.data[base..base + plane].iter().map(|v| (v - mean).powi(2)).sum::<f64>();
                }
                means[ch] = mean;
                vars[ch] = sq / count as f64;
                let unbiased = sq / (count - 1) as f64;
                running_mean.data[ch] = (1.0 - momentum) * running_mean.data[ch] + momentum * mean;
                running_var.data[ch] = (1.0 - momentum) * running_var.data[ch] + momentum * unbiased;
            }
        } else {
            means.copy_from_slice(&running_mean.data);
            vars.copy_from_slice(&running_var.data);
        }

        let inv_std: Vec<f64> = vars.iter().map(|v| 1.0 / (v + eps).sqrt()).collect();
        let g = &self.nodes[gamma.0].value.data;
        let bt = &self.nodes[beta.0].value.data;
        let mut xhat = Tensor::zeros(&x.shape);
        let mut out = Tensor::zeros(&x.shape);
        for b in 0..n {
            for ch in 0..c {
                let base = (b * c + ch) * plane;
                for k in base..base + plane {
                    let xh = (x.data[k] - means[ch]) * inv_std[ch];
                    xhat.data[k] = xh;
                    out.data[k] = g[ch] * xh + bt[ch];
                }
            }
        }
        Ok(self.push(out, Op::BatchNorm2d { input, gamma, beta, xhat, inv_std, batch_stats }))
    }

    pub fn reshape(&mut self, x: Var, shape: &[usize]) -> Result<Var> {
        let value = self.value(x).reshape(shape)?;
        Ok(self.push(value, Op::Reshape(x)))
    }

    /// Flattens everything after the leading dimension: `[N, ...] -> [N, rest]`.
    pub fn flatten(&mut self, x: Var) -> Result<Var> {
        let t = self.value(x);
        let shape = [t.dim0(), t.row_len()];
        self.reshape(x, &shape)
    }

    /// Concatenates `[n, m_i]` tensors along columns.
    pub fn concat_cols(&mut self, parts: &[Var]) -> Result<Var> {
        let first = parts.first().ok_or(NnError::EmptyInput("Graph::concat_cols"))?;
        let (n, _) = self.value(*first).dims2("Graph::concat_cols")?;
        let mut widths = Vec::with_capacity(parts.len());
        for &p in parts {
            let (rows, cols) = self.value(p).dims2("Graph::concat_cols")?;
            if rows != n {
                return Err(NnError::shape("Graph::concat_cols", n, rows));
            }
            widths.push(cols);
        }
        let total: usize = widths.iter().sum();
        let mut value = Tensor::zeros(&[n, total]);
        for i in 0..n {
            let mut offset = 0;
            for (&p, &wd) in parts.iter().zip(&widths) {
                let src = &self.nodes[p.0].value.data[i * wd..(i + 1) * wd];
                value.data[i * total + offset..i * total + offset + wd].copy_from_slice(src);
                offset += wd;
            }
        }
        Ok(self.push(value, Op::ConcatCols(parts.to_vec())))
    }

    /// `x[:, step, :]` of a `[N, T, F]` sequence.
    pub fn select_step(&mut self, input: Var, step: usize) -> Result<Var> {
        let x = self.value(input);
        let (n, t, f) = match x.shape.as_slice() {
            [n, t, f] => (*n, *t, *f),
            other => return Err(NnError::shape("Graph::select_step", "rank 3 [N, T, F]", other)),
        };
        if step >= t {
            return Err(NnError::InvalidArgument(format!("time step {step} out of range for length {t}")));
        }
        let mut value = Tensor::zeros(&[n, f]);
        for b in 0..n {
            let src = &x.data[(b * t + step) * f..(b * t + step + 1) * f];
            value.data[b * f..(b + 1) * f].copy_from_slice(src);
        }
        Ok(self.push(value, Op::SelectStep { input, step }))
    }

    /// Mean softmax cross-entropy of `[n, c]` logits against class indices.
    pub fn cross_entropy(&mut self, logits: Var, targets: &[usize]) -> Result<Var> {
        let scores = self.value(logits);
        let (n, c) = scores.dims2("Graph::cross_entropy")?;
        if targets.len() != n {
            return Err(NnError::shape("Graph::cross_entropy targets", n, targets.len()));
        }
        if n == 0 {
            return Err(NnError::EmptyInput("Graph::cross_entropy"));
        }
        if let Some(bad) = targets.iter().find(|&&t| t >= c) {
            return Err(NnError::InvalidLabels(format!("label {bad} out of range for {c} classes")));
        }
        let probs = scores.softmax_rows()?;
        const EPS: f64 = 1e-12;
        let loss = targets.iter().enumerate()
            .map(|(i, &t)| -(probs.data[i * c + t] + EPS).ln())
            .sum::<f64>() / n as f64;
        Ok(self.push(Tensor::scalar(loss), Op::CrossEntropy { logits, probs, targets: targets.to_vec() }))
    }

    /// Mean squared error against a same-shape target.
    pub fn mse(&mut self, input: Var, target: Tensor) -> Result<Var> {
        let x = self.value(input);
        if !x.same_shape(&target) {
            return Err(NnError::shape("Graph::mse", &target.shape, &x.shape));
        }
        if x.numel() == 0 {
            return Err(NnError::EmptyInput("Graph::mse"));
        }
        let loss = x.data.iter().zip(&target.data).map(|(a, b)| (a - b).powi(2)).sum::<f64>()
            / x.numel() as f64;
        Ok(self.push(Tensor::scalar(loss), Op::Mse { input, target }))
    }
}

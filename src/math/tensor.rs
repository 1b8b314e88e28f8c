use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::{Add, Sub};

use crate::error::{NnError, Result};

/// Dense, row-major n-dimensional array of `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor::full(shape, 0.0)
    }

    pub fn ones(shape: &[usize]) -> Tensor {
        Tensor::full(shape, 1.0)
    }

    pub fn full(shape: &[usize], value: f64) -> Tensor {
        Tensor {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    pub fn scalar(value: f64) -> Tensor {
        Tensor { shape: vec![1], data: vec![value] }
    }

    /// Wraps `data` as a tensor of `shape`, checking the element count.
    pub fn from_vec(shape: &[usize], data: Vec<f64>) -> Result<Tensor> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(NnError::shape("Tensor::from_vec", expected, data.len()));
        }
        Ok(Tensor { shape: shape.to_vec(), data })
    }

    /// Builds a `[rows.len(), cols]` tensor from equal-length rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Tensor> {
        let cols = rows.first().map(|r| r.len()).ok_or(NnError::EmptyInput("Tensor::from_rows"))?;
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(NnError::shape("Tensor::from_rows", cols, row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(Tensor { shape: vec![rows.len(), cols], data })
    }

    /// Uniform samples in `[-bound, bound)`.
    pub fn uniform(shape: &[usize], bound: f64, rng: &mut StdRng) -> Tensor {
        let n = shape.iter().product();
        let data = (0..n).map(|_| (rng.gen::<f64>() * 2.0 - 1.0) * bound).collect();
        Tensor { shape: shape.to_vec(), data }
    }

    /// Samples from N(0, 1).
    pub fn randn(shape: &[usize], rng: &mut StdRng) -> Tensor {
        let n = shape.iter().product();
        let data = (0..n).map(|_| Tensor::sample_standard_normal(rng)).collect();
        Tensor { shape: shape.to_vec(), data }
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    /// Both u1 and u2 must be uniform on (0, 1].
    pub fn sample_standard_normal(rng: &mut StdRng) -> f64 {
        // Draw two independent uniform samples in (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// He initialization: samples from N(0, sqrt(2 / fan_in)).
    ///
    /// Recommended before ReLU layers. The variance 2/fan_in accounts for
    /// the fact that ReLU zeroes half of its inputs on average.
    pub fn he(shape: &[usize], fan_in: usize, rng: &mut StdRng) -> Tensor {
        let std_dev = (2.0 / fan_in.max(1) as f64).sqrt();
        Tensor::randn(shape, rng).map(|x| x * std_dev)
    }

    /// Xavier (Glorot) initialization: samples from N(0, sqrt(1 / fan_in)).
    ///
    /// Recommended before Sigmoid/Tanh/Identity layers.
    pub fn xavier(shape: &[usize], fan_in: usize, rng: &mut StdRng) -> Tensor {
        let std_dev = (1.0 / fan_in.max(1) as f64).sqrt();
        Tensor::randn(shape, rng).map(|x| x * std_dev)
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Leading dimension (batch size for batched tensors).
    pub fn dim0(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Number of elements per leading-dimension entry.
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    pub fn same_shape(&self, other: &Tensor) -> bool {
        self.shape == other.shape
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor> {
        let n: usize = shape.iter().product();
        if n != self.numel() {
            return Err(NnError::shape("Tensor::reshape", shape, &self.shape));
        }
        Ok(Tensor { shape: shape.to_vec(), data: self.data.clone() })
    }

    /// Row `i` of a tensor viewed as `[dim0, row_len]`.
    pub fn row(&self, i: usize) -> &[f64] {
        let w = self.row_len();
        &self.data[i * w..(i + 1) * w]
    }

    /// Gathers leading-dimension entries in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Tensor> {
        let n = self.dim0();
        let w = self.row_len();
        let mut data = Vec::with_capacity(indices.len() * w);
        for &i in indices {
            if i >= n {
                return Err(NnError::InvalidArgument(format!("row index {i} out of bounds for {n} rows")));
            }
            data.extend_from_slice(self.row(i));
        }
        let mut shape = self.shape.clone();
        if let Some(first) = shape.first_mut() {
            *first = indices.len();
        }
        Ok(Tensor { shape, data })
    }

    /// Contiguous leading-dimension slice `[start, end)`.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Tensor> {
        if start > end || end > self.dim0() {
            return Err(NnError::InvalidArgument(format!(
                "row slice {start}..{end} out of bounds for {} rows", self.dim0()
            )));
        }
        let w = self.row_len();
        let mut shape = self.shape.clone();
        shape[0] = end - start;
        Ok(Tensor { shape, data: self.data[start * w..end * w].to_vec() })
    }

    /// Concatenates tensors along the leading dimension.
    pub fn concat_rows(parts: &[Tensor]) -> Result<Tensor> {
        let first = parts.first().ok_or(NnError::EmptyInput("Tensor::concat_rows"))?;
        let tail = &first.shape[1..];
        let mut rows = 0;
        let mut data = Vec::new();
        for part in parts {
            if &part.shape[1..] != tail {
                return Err(NnError::shape("Tensor::concat_rows", tail, &part.shape[1..]));
            }
            rows += part.dim0();
            data.extend_from_slice(&part.data);
        }
        let mut shape = first.shape.clone();
        shape[0] = rows;
        Ok(Tensor { shape, data })
    }

    /// 2-D transpose.
    pub fn transpose(&self) -> Result<Tensor> {
        let (rows, cols) = self.dims2("Tensor::transpose")?;
        let mut res = Tensor::zeros(&[cols, rows]);
        for i in 0..rows {
            for j in 0..cols {
                res.data[j * rows + i] = self.data[i * cols + j];
            }
        }
        Ok(res)
    }

    /// 2-D matrix product `[n, k] x [k, m] -> [n, m]`.
    pub fn matmul(&self, rhs: &Tensor) -> Result<Tensor> {
        let (n, k) = self.dims2("Tensor::matmul")?;
        let (k2, m) = rhs.dims2("Tensor::matmul")?;
        if k != k2 {
            return Err(NnError::shape("Tensor::matmul", [n, k], &rhs.shape));
        }
        let mut res = Tensor::zeros(&[n, m]);
        for i in 0..n {
            let out = &mut res.data[i * m..(i + 1) * m];
            for p in 0..k {
                let a = self.data[i * k + p];
                if a == 0.0 {
                    continue;
                }
                let rhs_row = &rhs.data[p * m..(p + 1) * m];
                for (o, b) in out.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
        }
        Ok(res)
    }

    /// Returns `(rows, cols)` for a rank-2 tensor.
    pub fn dims2(&self, op: &'static str) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            [r, c] => Ok((*r, *c)),
            other => Err(NnError::shape(op, "rank 2", other)),
        }
    }

    pub fn map<F>(&self, functor: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Element-wise combination of two same-shape tensors.
    pub fn zip_map<F>(&self, other: &Tensor, op: &'static str, functor: F) -> Result<Tensor>
    where
        F: Fn(f64, f64) -> f64,
    {
        if !self.same_shape(other) {
            return Err(NnError::shape(op, &self.shape, &other.shape));
        }
        Ok(Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| functor(a, b)).collect(),
        })
    }

    /// `self += other`, shapes must match.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<()> {
        if !self.same_shape(other) {
            return Err(NnError::shape("Tensor::add_assign", &self.shape, &other.shape));
        }
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        Ok(())
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f64
        }
    }

    /// Row-wise softmax of a `[n, c]` tensor, numerically stabilised.
    pub fn softmax_rows(&self) -> Result<Tensor> {
        let (n, c) = self.dims2("Tensor::softmax_rows")?;
        let mut out = Tensor::zeros(&[n, c]);
        for i in 0..n {
            let row = &self.data[i * c..(i + 1) * c];
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let exps: Vec<f64> = row.iter().map(|x| (x - max).exp()).collect();
            let total: f64 = exps.iter().sum();
            for (j, e) in exps.into_iter().enumerate() {
                out.data[i * c + j] = e / total;
            }
        }
        Ok(out)
    }
}

impl Default for Tensor {
    fn default() -> Self {
        Tensor { shape: vec![0], data: vec![] }
    }
}

impl Add for &Tensor {
    type Output = Tensor;

    fn add(self, rhs: Self) -> Self::Output {
        if self.shape != rhs.shape {
            panic!("Tensors are of incorrect sizes")
        }
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a + b).collect(),
        }
    }
}

impl Sub for &Tensor {
    type Output = Tensor;

    fn sub(self, rhs: Self) -> Self::Output {
        if self.shape != rhs.shape {
            panic!("Tensors are of incorrect sizes")
        }
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a - b).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matmul_matches_hand_computation() {
        let a = Tensor::from_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Tensor::from_vec(&[3, 2], vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.shape, vec![2, 2]);
        assert_eq!(c.data, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn matmul_rejects_inner_dim_mismatch() {
        let a = Tensor::zeros(&[2, 3]);
        let b = Tensor::zeros(&[2, 2]);
        assert!(matches!(a.matmul(&b), Err(NnError::ShapeMismatch { .. })));
    }

    #[test]
    fn from_vec_checks_element_count() {
        assert!(Tensor::from_vec(&[2, 2], vec![1.0; 3]).is_err());
    }

    #[test]
    fn select_rows_keeps_trailing_shape() {
        let t = Tensor::from_vec(&[3, 2, 1], (0..6).map(|x| x as f64).collect()).unwrap();
        let s = t.select_rows(&[2, 0]).unwrap();
        assert_eq!(s.shape, vec![2, 2, 1]);
        assert_eq!(s.data, vec![4.0, 5.0, 0.0, 1.0]);
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let t = Tensor::from_vec(&[2, 3], vec![1.0, 2.0, 3.0, -1.0, 0.0, 1000.0]).unwrap();
        let s = t.softmax_rows().unwrap();
        for i in 0..2 {
            let total: f64 = s.row(i).iter().sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
        assert!((s.data[5] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn transpose_swaps_axes() {
        let t = Tensor::from_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let tt = t.transpose().unwrap();
        assert_eq!(tt.shape, vec![3, 2]);
        assert_eq!(tt.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}

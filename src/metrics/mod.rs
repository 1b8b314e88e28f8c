//! Classification metrics over predicted labels and scores.

use std::cmp::Ordering;

use crate::error::{NnError, Result};
use crate::math::tensor::Tensor;

/// Fraction of positions where `predicted` equals `truth`.
pub fn accuracy(predicted: &[usize], truth: &[usize]) -> Result<f64> {
    if truth.is_empty() {
        return Err(NnError::EmptyInput("accuracy"));
    }
    if predicted.len() != truth.len() {
        return Err(NnError::shape("accuracy", truth.len(), predicted.len()));
    }
    let correct = predicted.iter().zip(truth).filter(|(p, t)| p == t).count();
    Ok(correct as f64 / truth.len() as f64)
}

/// Column index of the largest score in each row of a `[n, c]` tensor.
/// Ties go to the first index.
pub fn argmax_rows(scores: &Tensor) -> Result<Vec<usize>> {
    let (rows, cols) = scores.dims2("argmax_rows")?;
    if cols == 0 {
        return Err(NnError::EmptyInput("argmax_rows"));
    }
    Ok((0..rows)
        .map(|r| {
            let row = scores.row(r);
            let mut best = 0;
            for (c, &v) in row.iter().enumerate().skip(1) {
                if v > row[best] {
                    best = c;
                }
            }
            best
        })
        .collect())
}

/// Area under the ROC curve for binary `labels` (0/1) and positive-class
/// `scores`, via the Mann-Whitney U statistic. Tied scores share their mean
/// rank, so a constant scorer lands on exactly 0.5.
pub fn roc_auc(labels: &[usize], scores: &[f64]) -> Result<f64> {
    if labels.is_empty() {
        return Err(NnError::EmptyInput("roc_auc"));
    }
    if labels.len() != scores.len() {
        return Err(NnError::shape("roc_auc", labels.len(), scores.len()));
    }
    if let Some(&bad) = labels.iter().find(|&&l| l > 1) {
        return Err(NnError::InvalidLabels(format!("roc_auc needs 0/1 labels, found {bad}")));
    }
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(NnError::InvalidLabels("roc_auc needs both classes present".into()));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(NnError::InvalidArgument("roc_auc scores contain NaN".into()));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    // 1-based mid-ranks over runs of equal scores.
    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let mid = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = mid;
        }
        start = end;
    }

    let pos_rank_sum: f64 = labels.iter().zip(&ranks).filter(|(&l, _)| l == 1).map(|(_, &r)| r).sum();
    let n_pos = n_pos as f64;
    let u = pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg as f64))
}

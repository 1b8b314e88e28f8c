//! Synthetic datasets for the demo binary and the test-suite.

use rand::rngs::StdRng;

use crate::data::dataset::Dataset;
use crate::error::{NnError, Result};
use crate::math::tensor::Tensor;

fn block_labels(per_class: usize, num_classes: usize) -> Vec<usize> {
    (0..num_classes).flat_map(|c| std::iter::repeat(c).take(per_class)).collect()
}

/// Standard-normal features of `sample_shape` with labels laid out in
/// contiguous class blocks (`per_class` zeros, then ones, ...). The labels
/// carry no signal; useful for smoke-testing the pipeline end to end.
pub fn random_normal(
    per_class: usize,
    sample_shape: &[usize],
    num_classes: usize,
    rng: &mut StdRng,
) -> Result<Dataset> {
    if per_class == 0 || num_classes == 0 {
        return Err(NnError::InvalidArgument("per_class and num_classes must be at least 1".into()));
    }
    let mut shape = vec![per_class * num_classes];
    shape.extend_from_slice(sample_shape);
    Dataset::new(Tensor::randn(&shape, rng), block_labels(per_class, num_classes))
}

/// Two Gaussian blobs centred at `-separation` and `+separation` on every
/// axis, unit variance. Linearly separable with high probability once
/// `separation` is around 2 or more.
pub fn separable_blobs(per_class: usize, dims: usize, separation: f64, rng: &mut StdRng) -> Result<Dataset> {
    if per_class == 0 || dims == 0 {
        return Err(NnError::InvalidArgument("per_class and dims must be at least 1".into()));
    }
    let labels = block_labels(per_class, 2);
    let mut data = Vec::with_capacity(labels.len() * dims);
    for &label in &labels {
        let centre = if label == 0 { -separation } else { separation };
        for _ in 0..dims {
            data.push(centre + Tensor::sample_standard_normal(rng));
        }
    }
    Dataset::new(Tensor::from_vec(&[labels.len(), dims], data)?, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn random_normal_lays_out_class_blocks() {
        let mut rng = StdRng::seed_from_u64(1);
        let data = random_normal(3, &[4, 5], 2, &mut rng).unwrap();
        assert_eq!(data.features.shape, vec![6, 4, 5]);
        assert_eq!(data.labels, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn blobs_sit_on_opposite_sides() {
        let mut rng = StdRng::seed_from_u64(2);
        let data = separable_blobs(200, 2, 3.0, &mut rng).unwrap();
        let mean_of = |class: usize| {
            let rows: Vec<&[f64]> = (0..data.len()).filter(|&i| data.labels[i] == class).map(|i| data.features.row(i)).collect();
            rows.iter().map(|r| r[0]).sum::<f64>() / rows.len() as f64
        };
        assert!(mean_of(0) < -2.0);
        assert!(mean_of(1) > 2.0);
    }
}

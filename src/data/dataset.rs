use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::data::batch::{batch_ranges, RemainderPolicy};
use crate::error::{NnError, Result};
use crate::math::tensor::Tensor;

/// Checks that `features` has one leading entry per label and is non-empty.
pub fn check_pairs(features: &Tensor, labels: &[usize]) -> Result<()> {
    if labels.is_empty() || features.numel() == 0 {
        return Err(NnError::EmptyInput("dataset"));
    }
    if features.dim0() != labels.len() {
        return Err(NnError::shape("dataset", features.dim0(), labels.len()));
    }
    Ok(())
}

/// Fixed collection of samples: features `[N, ...]` and one class label per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: Tensor,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn new(features: Tensor, labels: Vec<usize>) -> Result<Dataset> {
        check_pairs(&features, &labels)?;
        Ok(Dataset { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Shape of a single sample (everything after the leading dimension).
    pub fn sample_shape(&self) -> &[usize] {
        &self.features.shape[1..]
    }

    /// Largest label plus one.
    pub fn num_classes(&self) -> usize {
        self.labels.iter().max().map_or(0, |&m| m + 1)
    }

    /// New dataset holding the samples at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Result<Dataset> {
        let features = self.features.select_rows(indices)?;
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        Dataset::new(features, labels)
    }

    pub fn loader(&self, batch_size: usize, remainder: RemainderPolicy) -> Result<DataLoader<'_>> {
        DataLoader::new(&self.features, &self.labels, batch_size, remainder)
    }
}

/// Randomly splits `dataset` into `(train, test)`, with `test_size` the
/// fraction of samples held out. Both halves must end up non-empty.
pub fn train_test_split(dataset: &Dataset, test_size: f64, rng: &mut StdRng) -> Result<(Dataset, Dataset)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(NnError::InvalidArgument(format!("test_size must be in (0, 1), got {test_size}")));
    }
    let total = dataset.len();
    let n_test = ((total as f64) * test_size).ceil() as usize;
    if n_test == 0 || n_test >= total {
        return Err(NnError::InvalidArgument(format!(
            "cannot split {total} samples with test_size {test_size}"
        )));
    }

    let mut indices: Vec<usize> = (0..total).collect();
    indices.shuffle(rng);
    let (test_idx, train_idx) = indices.split_at(n_test);

    tracing::debug!(train = train_idx.len(), test = test_idx.len(), "dataset split");
    Ok((dataset.subset(train_idx)?, dataset.subset(test_idx)?))
}

/// One mini-batch copied out of the source tensors.
#[derive(Debug, Clone)]
pub struct Batch {
    pub features: Tensor,
    pub labels: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Yields mini-batches over borrowed features and labels, reshuffling the
/// sample order on every `epoch` call when shuffling is on.
#[derive(Debug, Clone)]
pub struct DataLoader<'a> {
    features: &'a Tensor,
    labels: &'a [usize],
    batch_size: usize,
    remainder: RemainderPolicy,
    shuffle: bool,
}

impl<'a> DataLoader<'a> {
    pub fn new(
        features: &'a Tensor,
        labels: &'a [usize],
        batch_size: usize,
        remainder: RemainderPolicy,
    ) -> Result<DataLoader<'a>> {
        check_pairs(features, labels)?;
        if batch_size == 0 {
            return Err(NnError::InvalidArgument("batch_size must be at least 1".into()));
        }
        Ok(DataLoader { features, labels, batch_size, remainder, shuffle: true })
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> DataLoader<'a> {
        self.shuffle = shuffle;
        self
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Batches for one pass over the data.
    pub fn epoch(&self, rng: &mut StdRng) -> Result<Vec<Batch>> {
        let mut order: Vec<usize> = (0..self.labels.len()).collect();
        if self.shuffle {
            order.shuffle(rng);
        }
        batch_ranges(order.len(), self.batch_size, self.remainder)?
            .into_iter()
            .map(|range| {
                let idx = &order[range];
                Ok(Batch {
                    features: self.features.select_rows(idx)?,
                    labels: idx.iter().map(|&i| self.labels[i]).collect(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn toy(n: usize) -> Dataset {
        let features = Tensor::from_vec(&[n, 2], (0..n * 2).map(|v| v as f64).collect()).unwrap();
        Dataset::new(features, (0..n).map(|i| i % 2).collect()).unwrap()
    }

    #[test]
    fn rejects_label_count_mismatch() {
        let err = Dataset::new(Tensor::zeros(&[3, 2]), vec![0, 1]).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch { .. }));
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(Dataset::new(Tensor::zeros(&[0, 2]), vec![]), Err(NnError::EmptyInput(_))));
    }

    #[test]
    fn split_partitions_every_sample_once() {
        let data = toy(10);
        let mut rng = StdRng::seed_from_u64(7);
        let (train, test) = train_test_split(&data, 0.2, &mut rng).unwrap();
        assert_eq!((train.len(), test.len()), (8, 2));

        // Feature column 0 holds 2 * original index, so it identifies the sample.
        let mut seen: Vec<usize> = train.features.data.chunks(2)
            .chain(test.features.data.chunks(2))
            .map(|row| row[0] as usize / 2)
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn split_keeps_labels_aligned() {
        let data = toy(20);
        let mut rng = StdRng::seed_from_u64(3);
        let (train, _) = train_test_split(&data, 0.25, &mut rng).unwrap();
        for (row, &label) in train.features.data.chunks(2).zip(&train.labels) {
            assert_eq!((row[0] as usize / 2) % 2, label);
        }
    }

    #[test]
    fn loader_covers_all_samples_each_epoch() {
        let data = toy(7);
        let loader = data.loader(3, RemainderPolicy::Keep).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let batches = loader.epoch(&mut rng).unwrap();
        assert_eq!(batches.iter().map(Batch::len).collect::<Vec<_>>(), vec![3, 3, 1]);
        let total: usize = batches.iter().map(|b| b.features.dim0()).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn unshuffled_loader_preserves_order() {
        let data = toy(4);
        let loader = data.loader(2, RemainderPolicy::Keep).unwrap().with_shuffle(false);
        let batches = loader.epoch(&mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(batches[0].labels, vec![0, 1]);
        assert_eq!(batches[1].features.data, vec![4.0, 5.0, 6.0, 7.0]);
    }
}

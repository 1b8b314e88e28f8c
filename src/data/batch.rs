use std::ops::Range;

use serde::{Serialize, Deserialize};

use crate::error::{NnError, Result};

/// What happens to the `len % batch_size` elements left after the full
/// batches.
///
/// - `Keep`: emitted as one final short batch (`ceil(len / batch_size)`
///   batches in total).
/// - `Fold`: appended to the last full batch, so every batch has at least
///   `batch_size` elements (`floor(len / batch_size)` batches).
///
/// Either way, `batch_size >= len` yields a single batch with everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    #[default]
    Keep,
    Fold,
}

/// Contiguous index ranges covering `0..len` exactly once, in order.
pub fn batch_ranges(len: usize, batch_size: usize, policy: RemainderPolicy) -> Result<Vec<Range<usize>>> {
    if batch_size == 0 {
        return Err(NnError::InvalidArgument("batch_size must be at least 1".into()));
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    if batch_size >= len {
        return Ok(vec![0..len]);
    }

    let full = len / batch_size;
    let remainder = len % batch_size;
    let mut ranges: Vec<Range<usize>> = (0..full)
        .map(|i| i * batch_size..(i + 1) * batch_size)
        .collect();
    if remainder > 0 {
        match policy {
            RemainderPolicy::Keep => ranges.push(full * batch_size..len),
            RemainderPolicy::Fold => {
                if let Some(last) = ranges.last_mut() {
                    last.end = len;
                }
            }
        }
    }
    Ok(ranges)
}

/// Splits `items` into batches according to `batch_ranges`.
pub fn batch<T>(items: &[T], batch_size: usize, policy: RemainderPolicy) -> Result<Vec<&[T]>> {
    Ok(batch_ranges(items.len(), batch_size, policy)?
        .into_iter()
        .map(|r| &items[r])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(len: usize, b: usize, policy: RemainderPolicy) -> Vec<usize> {
        batch_ranges(len, b, policy).unwrap().iter().map(|r| r.len()).collect()
    }

    #[test]
    fn fold_absorbs_remainder_into_last_batch() {
        assert_eq!(sizes(10, 3, RemainderPolicy::Fold), vec![3, 3, 4]);
    }

    #[test]
    fn keep_emits_short_final_batch() {
        assert_eq!(sizes(10, 3, RemainderPolicy::Keep), vec![3, 3, 3, 1]);
    }

    #[test]
    fn exact_multiple_is_identical_under_both_policies() {
        assert_eq!(sizes(9, 3, RemainderPolicy::Keep), vec![3, 3, 3]);
        assert_eq!(sizes(9, 3, RemainderPolicy::Fold), vec![3, 3, 3]);
    }

    #[test]
    fn oversized_batch_returns_whole_input() {
        assert_eq!(sizes(5, 5, RemainderPolicy::Keep), vec![5]);
        assert_eq!(sizes(5, 64, RemainderPolicy::Fold), vec![5]);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(batch(&[1, 2, 3], 0, RemainderPolicy::Keep), Err(NnError::InvalidArgument(_))));
    }

    #[test]
    fn empty_input_has_no_batches() {
        let empty: [u8; 0] = [];
        assert!(batch(&empty, 4, RemainderPolicy::Keep).unwrap().is_empty());
    }

    #[test]
    fn slices_preserve_order() {
        let items: Vec<u32> = (0..7).collect();
        let batches = batch(&items, 2, RemainderPolicy::Keep).unwrap();
        assert_eq!(batches, vec![&[0, 1][..], &[2, 3][..], &[4, 5][..], &[6][..]]);
    }
}

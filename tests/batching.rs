use proptest::prelude::*;

use ferrite_deep::data::{batch, batch_ranges, RemainderPolicy};

fn policy() -> impl Strategy<Value = RemainderPolicy> {
    prop_oneof![Just(RemainderPolicy::Keep), Just(RemainderPolicy::Fold)]
}

proptest! {
    #[test]
    fn concatenation_reproduces_input(items in prop::collection::vec(any::<i32>(), 0..200), b in 1usize..50, p in policy()) {
        let batches = batch(&items, b, p).unwrap();
        let joined: Vec<i32> = batches.concat();
        prop_assert_eq!(joined, items);
    }

    #[test]
    fn keep_lengths_are_full_or_remainder(len in 1usize..500, b in 1usize..64) {
        let ranges = batch_ranges(len, b, RemainderPolicy::Keep).unwrap();
        if b >= len {
            prop_assert_eq!(ranges.len(), 1);
        } else {
            prop_assert_eq!(ranges.len(), len.div_ceil(b));
            let (last, full) = ranges.split_last().unwrap();
            prop_assert!(full.iter().all(|r| r.len() == b));
            let rem = len % b;
            prop_assert_eq!(last.len(), if rem == 0 { b } else { rem });
        }
    }

    #[test]
    fn fold_lengths_are_full_or_full_plus_remainder(len in 1usize..500, b in 1usize..64) {
        let ranges = batch_ranges(len, b, RemainderPolicy::Fold).unwrap();
        if b >= len {
            prop_assert_eq!(ranges.len(), 1);
        } else {
            prop_assert_eq!(ranges.len(), len / b);
            let (last, full) = ranges.split_last().unwrap();
            prop_assert!(full.iter().all(|r| r.len() == b));
            prop_assert_eq!(last.len(), b + len % b);
        }
    }

    #[test]
    fn ranges_are_contiguous(len in 0usize..300, b in 1usize..40, p in policy()) {
        let ranges = batch_ranges(len, b, p).unwrap();
        let mut next = 0;
        for r in &ranges {
            prop_assert_eq!(r.start, next);
            prop_assert!(r.end > r.start);
            next = r.end;
        }
        prop_assert_eq!(next, len);
    }
}

#[test]
fn ten_by_three_folds_to_three_three_four() {
    let items: Vec<usize> = (0..10).collect();
    let sizes: Vec<usize> = batch(&items, 3, RemainderPolicy::Fold).unwrap().iter().map(|s| s.len()).collect();
    assert_eq!(sizes, vec![3, 3, 4]);
}

#[test]
fn zero_batch_size_is_rejected_for_any_policy() {
    for p in [RemainderPolicy::Keep, RemainderPolicy::Fold] {
        assert!(batch_ranges(10, 0, p).is_err());
    }
}

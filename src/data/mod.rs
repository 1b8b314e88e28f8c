pub mod batch;
pub mod dataset;
pub mod synthetic;

pub use batch::{batch, batch_ranges, RemainderPolicy};
pub use dataset::{train_test_split, Batch, DataLoader, Dataset};

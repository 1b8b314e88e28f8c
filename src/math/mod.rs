pub mod tensor;
pub mod conv;

pub use tensor::Tensor;

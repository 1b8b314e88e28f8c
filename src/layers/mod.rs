pub mod linear;
pub mod conv2d;
pub mod batch_norm;
pub mod pool;
pub mod dropout;
pub mod sequence;
pub mod gru;
pub mod lstm;

pub use linear::Linear;
pub use conv2d::Conv2d;
pub use batch_norm::BatchNorm2d;
pub use pool::MaxPool2d;
pub use dropout::Dropout;
pub use gru::{GruCell, GruStack};
pub use lstm::{LstmCell, LstmStack};

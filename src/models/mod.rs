pub mod logistic;
pub mod mlp;
pub mod cnn;
pub mod cnn_mix;
pub mod cnn_multi;
pub mod recurrent;

pub use logistic::LogisticRegression;
pub use mlp::Mlp;
pub use cnn::{Cnn, CnnConfig};
pub use cnn_mix::CnnMix;
pub use cnn_multi::CnnMulti;
pub use recurrent::{BiRnn, Gru, RecurrentConfig, Rnn};

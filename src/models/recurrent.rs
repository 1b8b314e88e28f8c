use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};

use crate::autograd::{Graph, Var};
use crate::device::Device;
use crate::error::{NnError, Result};
use crate::layers::sequence::split_steps;
use crate::layers::{GruStack, Linear, LstmStack};
use crate::network::model::Model;
use crate::network::params::ParamStore;

/// Hyperparameters for the sequence classifiers. Inputs are batch-first
/// `[N, T, input_size]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub num_classes: usize,
    pub dropout: f64,
}

impl RecurrentConfig {
    pub fn new(input_size: usize, hidden_size: usize, num_layers: usize) -> RecurrentConfig {
        RecurrentConfig { input_size, hidden_size, num_layers, num_classes: 2, dropout: 0.5 }
    }

    fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.hidden_size == 0 || self.num_layers == 0 {
            return Err(NnError::InvalidArgument(
                "input_size, hidden_size and num_layers must be positive".into(),
            ));
        }
        if self.num_classes < 2 {
            return Err(NnError::InvalidArgument(format!("need at least 2 classes, got {}", self.num_classes)));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(NnError::InvalidArgument(format!("dropout must be in [0, 1), got {}", self.dropout)));
        }
        Ok(())
    }
}

fn check_features(g: &Graph, x: Var, input_size: usize) -> Result<()> {
    match g.shape(x) {
        [_, _, f] if *f == input_size => Ok(()),
        other => Err(NnError::ShapeMismatch {
            op: "sequence input",
            expected: format!("[N, T, {input_size}]"),
            actual: format!("{other:?}"),
        }),
    }
}

/// Stacked GRU; the top layer's last hidden state feeds a linear classifier.
#[derive(Debug, Clone)]
pub struct Gru {
    device: Device,
    config: RecurrentConfig,
    store: ParamStore,
    gru: GruStack,
    linear: Linear,
}

impl Gru {
    pub fn new(config: RecurrentConfig, device: Device, rng: &mut StdRng) -> Result<Gru> {
        config.validate()?;
        let mut store = ParamStore::new();
        let gru = GruStack::new(&mut store, "gru", config.input_size, config.hidden_size, config.num_layers, config.dropout, rng)?;
        let linear = Linear::new(&mut store, "linear", config.hidden_size, config.num_classes, rng);
        Ok(Gru { device, config, store, gru, linear })
    }
}

/// Stacked LSTM classifier.
#[derive(Debug, Clone)]
pub struct Rnn {
    device: Device,
    config: RecurrentConfig,
    store: ParamStore,
    lstm: LstmStack,
    fc: Linear,
}

impl Rnn {
    pub fn new(config: RecurrentConfig, device: Device, rng: &mut StdRng) -> Result<Rnn> {
        config.validate()?;
        let mut store = ParamStore::new();
        let lstm = LstmStack::new(
            &mut store, "lstm", config.input_size, config.hidden_size, config.num_layers, config.dropout, false, rng,
        )?;
        let fc = Linear::new(&mut store, "fc", lstm.output_size(), config.num_classes, rng);
        Ok(Rnn { device, config, store, lstm, fc })
    }
}

/// Stacked bidirectional LSTM classifier; the head sees
/// `[h_fwd(T-1) ‖ h_bwd(T-1)]`.
#[derive(Debug, Clone)]
pub struct BiRnn {
    device: Device,
    config: RecurrentConfig,
    store: ParamStore,
    lstm: LstmStack,
    fc: Linear,
}

impl BiRnn {
    pub fn new(config: RecurrentConfig, device: Device, rng: &mut StdRng) -> Result<BiRnn> {
        config.validate()?;
        let mut store = ParamStore::new();
        let lstm = LstmStack::new(
            &mut store, "lstm", config.input_size, config.hidden_size, config.num_layers, config.dropout, true, rng,
        )?;
        let fc = Linear::new(&mut store, "fc", lstm.output_size(), config.num_classes, rng);
        Ok(BiRnn { device, config, store, lstm, fc })
    }
}

fn last(outputs: Vec<Var>) -> Result<Var> {
    outputs.last().copied().ok_or(NnError::EmptyInput("recurrent output"))
}

macro_rules! recurrent_model {
    ($ty:ident, $name:literal, $stack:ident, $head:ident) => {
        impl Model for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn device(&self) -> Device {
                self.device
            }

            fn num_classes(&self) -> usize {
                self.config.num_classes
            }

            fn params(&self) -> &ParamStore {
                &self.store
            }

            fn params_mut(&mut self) -> &mut ParamStore {
                &mut self.store
            }

            fn forward(&mut self, graph: &mut Graph, input: Var) -> Result<Var> {
                check_features(graph, input, self.config.input_size)?;
                let steps = split_steps(graph, input)?;
                let outputs = self.$stack.forward_steps(graph, &self.store, steps)?;
                let h = last(outputs)?;
                self.$head.feed_from(graph, &self.store, h)
            }
        }
    };
}

recurrent_model!(Gru, "gru", gru, linear);
recurrent_model!(Rnn, "rnn", lstm, fc);
recurrent_model!(BiRnn, "birnn", lstm, fc);

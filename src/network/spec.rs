use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};

use crate::device::Device;
use crate::error::{NnError, Result};
use crate::loss::loss_type::LossType;
use crate::models::{BiRnn, Cnn, CnnConfig, CnnMix, CnnMulti, Gru, LogisticRegression, Mlp, RecurrentConfig, Rnn};
use crate::network::metadata::ModelMetadata;
use crate::network::model::Model;
use crate::optim::OptimizerSpec;

fn two_classes() -> usize {
    2
}

fn half() -> f64 {
    0.5
}

/// Serializable description of one model architecture and its
/// hyperparameters. `build` turns it into a freshly initialised model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression {
        input_size: usize,
        #[serde(default = "two_classes")]
        num_classes: usize,
    },
    Mlp {
        input_dim: usize,
        hidden_size: usize,
        #[serde(default = "two_classes")]
        num_classes: usize,
        #[serde(default = "half")]
        dropout: f64,
    },
    Cnn(CnnConfig),
    CnnMix(CnnConfig),
    CnnMulti(CnnConfig),
    Gru(RecurrentConfig),
    Rnn(RecurrentConfig),
    BiRnn(RecurrentConfig),
}

impl ModelSpec {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::LogisticRegression { .. } => ModelKind::LogisticRegression,
            ModelSpec::Mlp { .. } => ModelKind::Mlp,
            ModelSpec::Cnn(_) => ModelKind::Cnn,
            ModelSpec::CnnMix(_) => ModelKind::CnnMix,
            ModelSpec::CnnMulti(_) => ModelKind::CnnMulti,
            ModelSpec::Gru(_) => ModelKind::Gru,
            ModelSpec::Rnn(_) => ModelKind::Rnn,
            ModelSpec::BiRnn(_) => ModelKind::BiRnn,
        }
    }

    /// Shape of one input sample. Recurrent models take their sequence
    /// length from `seq_len`; it is not part of their configuration.
    pub fn sample_shape(&self, seq_len: usize) -> Vec<usize> {
        match self {
            ModelSpec::LogisticRegression { input_size, .. } => vec![*input_size],
            ModelSpec::Mlp { input_dim, .. } => vec![*input_dim],
            ModelSpec::Cnn(c) | ModelSpec::CnnMix(c) | ModelSpec::CnnMulti(c) => vec![c.labcounts, c.window_size],
            ModelSpec::Gru(c) | ModelSpec::Rnn(c) | ModelSpec::BiRnn(c) => vec![seq_len, c.input_size],
        }
    }

    pub fn build(&self, device: Device, rng: &mut StdRng) -> Result<Box<dyn Model>> {
        let model: Box<dyn Model> = match self {
            ModelSpec::LogisticRegression { input_size, num_classes } => {
                Box::new(LogisticRegression::new(*input_size, *num_classes, device, rng)?)
            }
            ModelSpec::Mlp { input_dim, hidden_size, num_classes, dropout } => {
                Box::new(Mlp::new(*input_dim, *hidden_size, *num_classes, *dropout, device, rng)?)
            }
            ModelSpec::Cnn(c) => Box::new(Cnn::new(c.clone(), device, rng)?),
            ModelSpec::CnnMix(c) => Box::new(CnnMix::new(c.clone(), device, rng)?),
            ModelSpec::CnnMulti(c) => Box::new(CnnMulti::new(c.clone(), device, rng)?),
            ModelSpec::Gru(c) => Box::new(Gru::new(c.clone(), device, rng)?),
            ModelSpec::Rnn(c) => Box::new(Rnn::new(c.clone(), device, rng)?),
            ModelSpec::BiRnn(c) => Box::new(BiRnn::new(c.clone(), device, rng)?),
        };
        tracing::debug!(
            model = model.name(),
            params = model.params().num_trainable(),
            "built model"
        );
        Ok(model)
    }
}

/// Architecture family, without hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression,
    Mlp,
    Cnn,
    CnnMix,
    CnnMulti,
    Gru,
    Rnn,
    BiRnn,
}

impl ModelKind {
    pub const ALL: [ModelKind; 8] = [
        ModelKind::LogisticRegression,
        ModelKind::Mlp,
        ModelKind::Cnn,
        ModelKind::CnnMix,
        ModelKind::CnnMulti,
        ModelKind::Gru,
        ModelKind::Rnn,
        ModelKind::BiRnn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::Mlp => "mlp",
            ModelKind::Cnn => "cnn",
            ModelKind::CnnMix => "cnn_mix",
            ModelKind::CnnMulti => "cnn_multi",
            ModelKind::Gru => "gru",
            ModelKind::Rnn => "rnn",
            ModelKind::BiRnn => "birnn",
        }
    }

    /// Default hyperparameters for inputs of `labcounts` rows by `window`
    /// columns. Tabular models see one row of `window` features; recurrent
    /// models see `window` features per time step.
    pub fn default_spec(&self, labcounts: usize, window: usize) -> ModelSpec {
        let recurrent = RecurrentConfig::new(window, 100, 2);
        match self {
            ModelKind::LogisticRegression => ModelSpec::LogisticRegression { input_size: window, num_classes: 2 },
            ModelKind::Mlp => ModelSpec::Mlp { input_dim: window, hidden_size: 100, num_classes: 2, dropout: 0.5 },
            ModelKind::Cnn => ModelSpec::Cnn(CnnConfig::new(16, labcounts, window)),
            ModelKind::CnnMix => ModelSpec::CnnMix(CnnConfig::new(16, labcounts, window)),
            ModelKind::CnnMulti => ModelSpec::CnnMulti(CnnConfig::multi(16, labcounts, window)),
            ModelKind::Gru => ModelSpec::Gru(recurrent),
            ModelKind::Rnn => ModelSpec::Rnn(recurrent),
            ModelKind::BiRnn => ModelSpec::BiRnn(recurrent),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = NnError;

    fn from_str(s: &str) -> Result<ModelKind> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ModelKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = ModelKind::ALL.iter().map(ModelKind::as_str).collect();
                NnError::InvalidArgument(format!("unknown model kind '{s}', expected one of {}", known.join(", ")))
            })
    }
}

/// Everything needed to reproduce a training run: architecture, optimizer,
/// loss and loop hyperparameters.
///
/// Saved and loaded as JSON independently of trained weights, so a run can
/// be configured before it starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Human-readable run name, also used as the default weights file stem.
    pub name: String,
    pub model: ModelSpec,
    #[serde(default)]
    pub optimizer: OptimizerSpec,
    #[serde(default)]
    pub loss: LossType,
    #[serde(default = "RunSpec::default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "RunSpec::default_epochs")]
    pub epochs: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl RunSpec {
    fn default_batch_size() -> usize {
        32
    }

    fn default_epochs() -> usize {
        10
    }

    /// A run of `model` with Adam (lr 1e-4), cross-entropy and the default
    /// loop settings.
    pub fn new(name: impl Into<String>, model: ModelSpec) -> RunSpec {
        RunSpec {
            name: name.into(),
            model,
            optimizer: OptimizerSpec::default(),
            loss: LossType::default(),
            batch_size: RunSpec::default_batch_size(),
            epochs: RunSpec::default_epochs(),
            seed: None,
            metadata: None,
        }
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `RunSpec` from a JSON file.
    pub fn load_json(path: &str) -> Result<RunSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn kinds_parse_from_their_names() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.as_str().parse::<ModelKind>().unwrap(), kind);
        }
        assert_eq!("cnn-multi".parse::<ModelKind>().unwrap(), ModelKind::CnnMulti);
        assert!("transformer".parse::<ModelKind>().is_err());
    }

    #[test]
    fn built_model_reports_matching_name() {
        let mut rng = StdRng::seed_from_u64(0);
        for kind in ModelKind::ALL {
            let model = kind.default_spec(18, 36).build(Device::Cpu, &mut rng).unwrap();
            assert_eq!(model.name(), kind.as_str());
        }
    }

    #[test]
    fn spec_json_is_tagged_by_kind() {
        let spec = ModelSpec::LogisticRegression { input_size: 4, num_classes: 2 };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "logistic_regression");
        let back: ModelSpec = serde_json::from_str(r#"{"kind":"logistic_regression","input_size":4}"#).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn run_spec_fills_defaults() {
        let json = r#"{"name":"demo","model":{"kind":"mlp","input_dim":3,"hidden_size":5}}"#;
        let run: RunSpec = serde_json::from_str(json).unwrap();
        assert_eq!(run.batch_size, 32);
        assert_eq!(run.epochs, 10);
        assert_eq!(run.loss, LossType::CrossEntropy);
        assert_eq!(run.optimizer, OptimizerSpec::default());
    }
}

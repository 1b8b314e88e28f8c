use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::autograd::{Graph, Var};
use crate::device::Device;
use crate::error::{NnError, Result};
use crate::layers::{BatchNorm2d, Conv2d, Dropout, Linear, MaxPool2d};
use crate::network::model::Model;
use crate::network::params::ParamStore;

/// Hyperparameters shared by the convolutional variants.
///
/// Inputs are `[N, labcounts, window_size]` matrices (one row per label /
/// channel of the original signal, one column per time step); the models add
/// the singleton channel axis themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnnConfig {
    pub nb_filter: usize,
    pub num_classes: usize,
    pub kernel_size: (usize, usize),
    pub pool_size: (usize, usize),
    pub labcounts: usize,
    pub window_size: usize,
    pub hidden_size: usize,
    pub stride: (usize, usize),
    pub padding: usize,
    pub dropout: f64,
}

impl Default for CnnConfig {
    fn default() -> Self {
        CnnConfig {
            nb_filter: 16,
            num_classes: 2,
            kernel_size: (1, 5),
            pool_size: (1, 3),
            labcounts: 32,
            window_size: 12,
            hidden_size: 100,
            stride: (1, 1),
            padding: 0,
            dropout: 0.5,
        }
    }
}

impl CnnConfig {
    pub fn new(nb_filter: usize, labcounts: usize, window_size: usize) -> CnnConfig {
        CnnConfig { nb_filter, labcounts, window_size, ..CnnConfig::default() }
    }

    /// Defaults for `CnnMulti`, which halves the resolution with 1×2 pools.
    pub fn multi(nb_filter: usize, labcounts: usize, window_size: usize) -> CnnConfig {
        CnnConfig { pool_size: (1, 2), ..CnnConfig::new(nb_filter, labcounts, window_size) }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.nb_filter == 0 || self.labcounts == 0 || self.window_size == 0 || self.hidden_size == 0 {
            return Err(NnError::InvalidArgument(
                "nb_filter, labcounts, window_size and hidden_size must be positive".into(),
            ));
        }
        if self.num_classes < 2 {
            return Err(NnError::InvalidArgument(format!("need at least 2 classes, got {}", self.num_classes)));
        }
        Ok(())
    }
}

/// Accepts `[N, H, W]` (adds a channel axis) or `[N, 1, H, W]` and checks
/// the spatial size against the configuration.
pub(crate) fn image_input(g: &mut Graph, x: Var, cfg: &CnnConfig) -> Result<Var> {
    let (n, h, w) = match g.shape(x) {
        [n, h, w] => (*n, *h, *w),
        [n, 1, h, w] => (*n, *h, *w),
        other => return Err(NnError::shape("cnn input", "[N, H, W] or [N, 1, H, W]", other)),
    };
    if h != cfg.labcounts || w != cfg.window_size {
        return Err(NnError::shape("cnn input", [cfg.labcounts, cfg.window_size], [h, w]));
    }
    g.reshape(x, &[n, 1, h, w])
}

/// `Conv2d → BatchNorm2d → ReLU`, optionally followed by max pooling.
#[derive(Debug, Clone)]
pub(crate) struct ConvBlock {
    conv: Conv2d,
    bn: BatchNorm2d,
    pool: Option<MaxPool2d>,
}

impl ConvBlock {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: &mut ParamStore,
        name: &str,
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        cfg: &CnnConfig,
        pool: Option<MaxPool2d>,
        rng: &mut StdRng,
    ) -> Result<ConvBlock> {
        let conv = Conv2d::new(store, &format!("{name}.conv"), in_channels, out_channels, kernel, cfg.stride, cfg.padding, rng)?;
        let bn = BatchNorm2d::new(store, &format!("{name}.bn"), out_channels);
        Ok(ConvBlock { conv, bn, pool })
    }

    /// Output `(channels, height, width)` for an input of `(h, w)`.
    pub(crate) fn out_dims(&self, h: usize, w: usize) -> Result<(usize, usize, usize)> {
        let (h, w) = self.conv.out_dims(h, w)?;
        let (h, w) = match &self.pool {
            Some(pool) => pool.out_dims(h, w)?,
            None => (h, w),
        };
        if h == 0 || w == 0 {
            return Err(NnError::InvalidArgument("convolution stack collapses the input to zero size".into()));
        }
        Ok((self.conv.out_channels, h, w))
    }

    pub(crate) fn forward(&self, g: &mut Graph, store: &mut ParamStore, x: Var) -> Result<Var> {
        let y = self.conv.forward(g, store, x)?;
        let y = self.bn.forward(g, store, y)?;
        let y = g.activate(y, ActivationFunction::ReLU);
        match &self.pool {
            Some(pool) => pool.forward(g, y),
            None => Ok(y),
        }
    }
}

/// `Dropout → Linear → Dropout → ReLU → Linear` on flattened features.
#[derive(Debug, Clone)]
pub(crate) struct ClassifierHead {
    drop1: Dropout,
    fc1: Linear,
    drop2: Dropout,
    fc2: Linear,
}

impl ClassifierHead {
    pub(crate) fn new(store: &mut ParamStore, in_features: usize, cfg: &CnnConfig, rng: &mut StdRng) -> Result<ClassifierHead> {
        Ok(ClassifierHead {
            drop1: Dropout::new(cfg.dropout)?,
            fc1: Linear::new(store, "fc1", in_features, cfg.hidden_size, rng),
            drop2: Dropout::new(cfg.dropout)?,
            fc2: Linear::new(store, "fc2", cfg.hidden_size, cfg.num_classes, rng),
        })
    }

    pub(crate) fn forward(&self, g: &mut Graph, store: &ParamStore, features: Var) -> Result<Var> {
        let x = self.drop1.forward(g, features)?;
        let x = self.fc1.feed_from(g, store, x)?;
        let x = self.drop2.forward(g, x)?;
        let x = g.activate(x, ActivationFunction::ReLU);
        self.fc2.feed_from(g, store, x)
    }
}

/// Two stacked conv blocks (`nb_filter`, then `2 * nb_filter` channels),
/// each pooled with the configured stride, followed by the classifier head.
#[derive(Debug, Clone)]
pub struct Cnn {
    device: Device,
    config: CnnConfig,
    store: ParamStore,
    layer1: ConvBlock,
    layer2: ConvBlock,
    head: ClassifierHead,
}

impl Cnn {
    pub fn new(config: CnnConfig, device: Device, rng: &mut StdRng) -> Result<Cnn> {
        config.validate()?;
        let mut store = ParamStore::new();
        let pool = MaxPool2d::with_stride(config.pool_size, config.stride);
        let nb = config.nb_filter;
        let layer1 = ConvBlock::new(&mut store, "layer1", 1, nb, config.kernel_size, &config, Some(pool), rng)?;
        let layer2 = ConvBlock::new(&mut store, "layer2", nb, 2 * nb, config.kernel_size, &config, Some(pool), rng)?;

        let (_, h1, w1) = layer1.out_dims(config.labcounts, config.window_size)?;
        let (c2, h2, w2) = layer2.out_dims(h1, w1)?;
        let head = ClassifierHead::new(&mut store, c2 * h2 * w2, &config, rng)?;
        Ok(Cnn { device, config, store, layer1, layer2, head })
    }

    pub fn config(&self) -> &CnnConfig {
        &self.config
    }
}

impl Model for Cnn {
    fn name(&self) -> &'static str {
        "cnn"
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
        let x = image_input(graph, input, &self.config)?;
        let x = self.layer1.forward(graph, &mut self.store, x)?;
        let x = self.layer2.forward(graph, &mut self.store, x)?;
        let x = graph.flatten(x)?;
        self.head.forward(graph, &self.store, x)
    }
}

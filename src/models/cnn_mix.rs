use rand::rngs::StdRng;

use crate::autograd::{Graph, Var};
use crate::device::Device;
use crate::error::Result;
use crate::layers::MaxPool2d;
use crate::models::cnn::{image_input, ClassifierHead, CnnConfig, ConvBlock};
use crate::network::model::Model;
use crate::network::params::ParamStore;

/// Mixes across label rows before convolving over time.
///
/// 1. a `labcounts × 1` convolution collapses the label axis into
///    `nb_filter` feature maps;
/// 2. the maps are re-read as rows and mixed by an `nb_filter × 1`
///    convolution, then pooled over time;
/// 3. a regular `kernel_size` convolution runs over the mixed rows.
#[derive(Debug, Clone)]
pub struct CnnMix {
    device: Device,
    config: CnnConfig,
    store: ParamStore,
    layer1: ConvBlock,
    layer2: ConvBlock,
    layer3: ConvBlock,
    head: ClassifierHead,
    /// `[C, H, W]` after layer1 and layer2, used for the row re-reads.
    shape1: (usize, usize, usize),
    shape2: (usize, usize, usize),
}

impl CnnMix {
    pub fn new(config: CnnConfig, device: Device, rng: &mut StdRng) -> Result<CnnMix> {
        config.validate()?;
        let mut store = ParamStore::new();
        let nb = config.nb_filter;

        let layer1 = ConvBlock::new(&mut store, "layer1", 1, nb, (config.labcounts, 1), &config, None, rng)?;
        let shape1 = layer1.out_dims(config.labcounts, config.window_size)?;
        // [N, nb, h1, w1] is re-read as [N, h1, nb, w1].
        let (c1, h1, w1) = shape1;

        let layer2 = ConvBlock::new(&mut store, "layer2", h1, nb, (nb, 1), &config, Some(MaxPool2d::new(config.pool_size)), rng)?;
        let shape2 = layer2.out_dims(c1, w1)?;
        let (c2, h2, w2) = shape2;

        let layer3 = ConvBlock::new(&mut store, "layer3", h2, nb, config.kernel_size, &config, None, rng)?;
        let (c3, h3, w3) = layer3.out_dims(c2, w2)?;

        let head = ClassifierHead::new(&mut store, c3 * h3 * w3, &config, rng)?;
        Ok(CnnMix { device, config, store, layer1, layer2, layer3, head, shape1, shape2 })
    }
}

impl Model for CnnMix {
    fn name(&self) -> &'static str {
        "cnn_mix"
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
        let n = graph.shape(x)[0];

        let x = self.layer1.forward(graph, &mut self.store, x)?;
        let (c1, h1, w1) = self.shape1;
        let x = graph.reshape(x, &[n, h1, c1, w1])?;

        let x = self.layer2.forward(graph, &mut self.store, x)?;
        let (c2, h2, w2) = self.shape2;
        let x = graph.reshape(x, &[n, h2, c2, w2])?;

        let x = self.layer3.forward(graph, &mut self.store, x)?;
        let x = graph.flatten(x)?;
        self.head.forward(graph, &self.store, x)
    }
}

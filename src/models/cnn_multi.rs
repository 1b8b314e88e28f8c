use rand::rngs::StdRng;

use crate::autograd::{Graph, Var};
use crate::device::Device;
use crate::error::Result;
use crate::layers::MaxPool2d;
use crate::models::cnn::{image_input, ClassifierHead, CnnConfig, ConvBlock};
use crate::network::model::Model;
use crate::network::params::ParamStore;

/// Multi-resolution CNN.
///
/// Three branches see the input at different time resolutions and their
/// flattened feature maps are concatenated before the classifier head:
/// - quarter resolution: `pool → pool → conv block`
/// - half resolution: `pool → conv block`
/// - full resolution: `conv block (pooled) → conv block`
#[derive(Debug, Clone)]
pub struct CnnMulti {
    device: Device,
    config: CnnConfig,
    store: ParamStore,
    pool: MaxPool2d,
    layer1: ConvBlock,
    layer2: ConvBlock,
    layer3: ConvBlock,
    layer4: ConvBlock,
    head: ClassifierHead,
}

impl CnnMulti {
    pub fn new(config: CnnConfig, device: Device, rng: &mut StdRng) -> Result<CnnMulti> {
        config.validate()?;
        let mut store = ParamStore::new();
        let nb = config.nb_filter;
        let k = config.kernel_size;
        let pool = MaxPool2d::new(config.pool_size);
        let (h, w) = (config.labcounts, config.window_size);

        // quarter resolution
        let (h_q, w_q) = pool.out_dims(h, w)?;
        let (h_q, w_q) = pool.out_dims(h_q, w_q)?;
        let layer1 = ConvBlock::new(&mut store, "layer1", 1, nb, k, &config, None, rng)?;
        let (c1, h1, w1) = layer1.out_dims(h_q, w_q)?;

        // half resolution
        let (h_h, w_h) = pool.out_dims(h, w)?;
        let layer2 = ConvBlock::new(&mut store, "layer2", 1, nb, k, &config, None, rng)?;
        let (c2, h2, w2) = layer2.out_dims(h_h, w_h)?;

        // full resolution
        let layer3 = ConvBlock::new(&mut store, "layer3", 1, nb, k, &config, Some(pool), rng)?;
        let (c3, h3, w3) = layer3.out_dims(h, w)?;
        let layer4 = ConvBlock::new(&mut store, "layer4", c3, nb, k, &config, None, rng)?;
        let (c4, h4, w4) = layer4.out_dims(h3, w3)?;

        let merged = c1 * h1 * w1 + c2 * h2 * w2 + c4 * h4 * w4;
        let head = ClassifierHead::new(&mut store, merged, &config, rng)?;
        Ok(CnnMulti { device, config, store, pool, layer1, layer2, layer3, layer4, head })
    }
}

impl Model for CnnMulti {
    fn name(&self) -> &'static str {
        "cnn_multi"
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

        let q = self.pool.forward(graph, x)?;
        let q = self.pool.forward(graph, q)?;
        let out1 = self.layer1.forward(graph, &mut self.store, q)?;
        let out1 = graph.flatten(out1)?;

        let half = self.pool.forward(graph, x)?;
        let out2 = self.layer2.forward(graph, &mut self.store, half)?;
        let out2 = graph.flatten(out2)?;

        let full = self.layer3.forward(graph, &mut self.store, x)?;
        let out3 = self.layer4.forward(graph, &mut self.store, full)?;
        let out3 = graph.flatten(out3)?;

        let merged = graph.concat_cols(&[out1, out2, out3])?;
        self.head.forward(graph, &self.store, merged)
    }
}

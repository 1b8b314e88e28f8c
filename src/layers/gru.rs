use rand::rngs::StdRng;

use crate::activation::activation::ActivationFunction;
use crate::autograd::{Graph, Var};
use crate::error::{NnError, Result};
use crate::layers::linear::Linear;
use crate::layers::sequence::{dropout_steps, zero_state};
use crate::network::params::ParamStore;

/// One GRU layer.
///
/// ```text
/// r = σ(W_ir x + b_ir + W_hr h + b_hr)
/// z = σ(W_iz x + b_iz + W_hz h + b_hz)
/// n = tanh(W_in x + b_in + r ⊙ (W_hn h + b_hn))
/// h' = (1 - z) ⊙ n + z ⊙ h
/// ```
#[derive(Debug, Clone)]
pub struct GruCell {
    pub hidden_size: usize,
    w_ir: Linear,
    w_hr: Linear,
    w_iz: Linear,
    w_hz: Linear,
    w_in: Linear,
    w_hn: Linear,
}

impl GruCell {
    pub fn new(store: &mut ParamStore, name: &str, input_size: usize, hidden_size: usize, rng: &mut StdRng) -> GruCell {
        let bound = 1.0 / (hidden_size.max(1) as f64).sqrt();
        let mut lin = |gate: &str, fan_in: usize| {
            Linear::with_bound(store, &format!("{name}.{gate}"), fan_in, hidden_size, bound, rng)
        };
        GruCell {
            hidden_size,
            w_ir: lin("w_ir", input_size),
            w_hr: lin("w_hr", hidden_size),
            w_iz: lin("w_iz", input_size),
            w_hz: lin("w_hz", hidden_size),
            w_in: lin("w_in", input_size),
            w_hn: lin("w_hn", hidden_size),
        }
    }

    pub fn step(&self, g: &mut Graph, store: &ParamStore, x: Var, h: Var) -> Result<Var> {
        let r_x = self.w_ir.feed_from(g, store, x)?;
        let r_h = self.w_hr.feed_from(g, store, h)?;
        let r = g.add(r_x, r_h)?;
        let r = g.activate(r, ActivationFunction::Sigmoid);

        let z_x = self.w_iz.feed_from(g, store, x)?;
        let z_h = self.w_hz.feed_from(g, store, h)?;
        let z = g.add(z_x, z_h)?;
        let z = g.activate(z, ActivationFunction::Sigmoid);

        let n_x = self.w_in.feed_from(g, store, x)?;
        let n_h = self.w_hn.feed_from(g, store, h)?;
        let n_h = g.mul(r, n_h)?;
        let n = g.add(n_x, n_h)?;
        let n = g.activate(n, ActivationFunction::Tanh);

        let keep_new = g.one_minus(z);
        let fresh = g.mul(keep_new, n)?;
        let carried = g.mul(z, h)?;
        g.add(fresh, carried)
    }
}

/// Stacked GRU over a list of `[N, F]` steps; zero initial state, dropout
/// between layers (training only).
#[derive(Debug, Clone)]
pub struct GruStack {
    pub hidden_size: usize,
    pub dropout: f64,
    layers: Vec<GruCell>,
}

impl GruStack {
    pub fn new(
        store: &mut ParamStore,
        name: &str,
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout: f64,
        rng: &mut StdRng,
    ) -> Result<GruStack> {
        if num_layers == 0 || hidden_size == 0 {
            return Err(NnError::InvalidArgument(format!("{name}: num_layers and hidden_size must be positive")));
        }
        let layers = (0..num_layers)
            .map(|l| {
                let fan_in = if l == 0 { input_size } else { hidden_size };
                GruCell::new(store, &format!("{name}.l{l}"), fan_in, hidden_size, rng)
            })
            .collect();
        Ok(GruStack { hidden_size, dropout, layers })
    }

    /// Returns the top layer's output at every step.
    pub fn forward_steps(&self, g: &mut Graph, store: &ParamStore, steps: Vec<Var>) -> Result<Vec<Var>> {
        let batch = steps.first().map(|&s| g.shape(s)[0]).ok_or(NnError::EmptyInput("GruStack::forward_steps"))?;
        let mut current = steps;
        for (l, cell) in self.layers.iter().enumerate() {
            if l > 0 {
                current = dropout_steps(g, current, self.dropout)?;
            }
            let mut h = zero_state(g, batch, self.hidden_size);
            let mut outputs = Vec::with_capacity(current.len());
            for &x in &current {
                h = cell.step(g, store, x, h)?;
                outputs.push(h);
            }
            current = outputs;
        }
        Ok(current)
    }
}

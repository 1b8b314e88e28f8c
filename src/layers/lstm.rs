use rand::rngs::StdRng;

use crate::activation::activation::ActivationFunction;
use crate::autograd::{Graph, Var};
use crate::error::{NnError, Result};
use crate::layers::linear::Linear;
use crate::layers::sequence::{dropout_steps, zero_state};
use crate::network::params::ParamStore;

/// One LSTM cell.
///
/// ```text
/// i = σ(W_ii x + W_hi h)    f = σ(W_if x + W_hf h)
/// g = tanh(W_ig x + W_hg h) o = σ(W_io x + W_ho h)
/// c' = f ⊙ c + i ⊙ g
/// h' = o ⊙ tanh(c')
/// ```
#[derive(Debug, Clone)]
pub struct LstmCell {
    pub hidden_size: usize,
    w_ii: Linear,
    w_hi: Linear,
    w_if: Linear,
    w_hf: Linear,
    w_ig: Linear,
    w_hg: Linear,
    w_io: Linear,
    w_ho: Linear,
}

impl LstmCell {
    pub fn new(store: &mut ParamStore, name: &str, input_size: usize, hidden_size: usize, rng: &mut StdRng) -> LstmCell {
        let bound = 1.0 / (hidden_size.max(1) as f64).sqrt();
        let mut lin = |gate: &str, fan_in: usize| {
            Linear::with_bound(store, &format!("{name}.{gate}"), fan_in, hidden_size, bound, rng)
        };
        LstmCell {
            hidden_size,
            w_ii: lin("w_ii", input_size),
            w_hi: lin("w_hi", hidden_size),
            w_if: lin("w_if", input_size),
            w_hf: lin("w_hf", hidden_size),
            w_ig: lin("w_ig", input_size),
            w_hg: lin("w_hg", hidden_size),
            w_io: lin("w_io", input_size),
            w_ho: lin("w_ho", hidden_size),
        }
    }

    fn gate(
        g: &mut Graph,
        store: &ParamStore,
        wx: &Linear,
        wh: &Linear,
        x: Var,
        h: Var,
        act: ActivationFunction,
    ) -> Result<Var> {
        let a = wx.feed_from(g, store, x)?;
        let b = wh.feed_from(g, store, h)?;
        let s = g.add(a, b)?;
        Ok(g.activate(s, act))
    }

    /// Returns the next `(h, c)`.
    pub fn step(&self, g: &mut Graph, store: &ParamStore, x: Var, h: Var, c: Var) -> Result<(Var, Var)> {
        use ActivationFunction::{Sigmoid, Tanh};
        let i = Self::gate(g, store, &self.w_ii, &self.w_hi, x, h, Sigmoid)?;
        let f = Self::gate(g, store, &self.w_if, &self.w_hf, x, h, Sigmoid)?;
        let cand = Self::gate(g, store, &self.w_ig, &self.w_hg, x, h, Tanh)?;
        let o = Self::gate(g, store, &self.w_io, &self.w_ho, x, h, Sigmoid)?;

        let kept = g.mul(f, c)?;
        let written = g.mul(i, cand)?;
        let c_next = g.add(kept, written)?;
        let c_act = g.activate(c_next, Tanh);
        let h_next = g.mul(o, c_act)?;
        Ok((h_next, c_next))
    }

    /// Runs the cell over `steps`, optionally right-to-left, and returns the
    /// hidden state for each position in original order.
    fn run(&self, g: &mut Graph, store: &ParamStore, steps: &[Var], reverse: bool) -> Result<Vec<Var>> {
        let batch = g.shape(steps[0])[0];
        let mut h = zero_state(g, batch, self.hidden_size);
        let mut c = zero_state(g, batch, self.hidden_size);
        let mut outputs = vec![h; steps.len()];
        let order: Vec<usize> = if reverse {
            (0..steps.len()).rev().collect()
        } else {
            (0..steps.len()).collect()
        };
        for t in order {
            let (h_next, c_next) = self.step(g, store, steps[t], h, c)?;
            h = h_next;
            c = c_next;
            outputs[t] = h;
        }
        Ok(outputs)
    }
}

#[derive(Debug, Clone)]
struct LstmLayer {
    forward: LstmCell,
    backward: Option<LstmCell>,
}

/// Stacked (optionally bidirectional) LSTM over `[N, F]` steps.
///
/// Bidirectional layers emit `[h_fwd ‖ h_bwd]` per step, so stacked layers
/// and the output have width `2 * hidden_size`.
#[derive(Debug, Clone)]
pub struct LstmStack {
    pub hidden_size: usize,
    pub dropout: f64,
    pub bidirectional: bool,
    layers: Vec<LstmLayer>,
}

impl LstmStack {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: &mut ParamStore,
        name: &str,
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout: f64,
        bidirectional: bool,
        rng: &mut StdRng,
    ) -> Result<LstmStack> {
        if num_layers == 0 || hidden_size == 0 {
            return Err(NnError::InvalidArgument(format!("{name}: num_layers and hidden_size must be positive")));
        }
        let directions = if bidirectional { 2 } else { 1 };
        let mut layers = Vec::with_capacity(num_layers);
        for l in 0..num_layers {
            let fan_in = if l == 0 { input_size } else { hidden_size * directions };
            let forward = LstmCell::new(store, &format!("{name}.l{l}"), fan_in, hidden_size, rng);
            let backward = if bidirectional {
                Some(LstmCell::new(store, &format!("{name}.l{l}_reverse"), fan_in, hidden_size, rng))
            } else {
                None
            };
            layers.push(LstmLayer { forward, backward });
        }
        Ok(LstmStack { hidden_size, dropout, bidirectional, layers })
    }

    /// Output width per step.
    pub fn output_size(&self) -> usize {
        if self.bidirectional { 2 * self.hidden_size } else { self.hidden_size }
    }

    /// Returns the top layer's output at every step.
    pub fn forward_steps(&self, g: &mut Graph, store: &ParamStore, steps: Vec<Var>) -> Result<Vec<Var>> {
        if steps.is_empty() {
            return Err(NnError::EmptyInput("LstmStack::forward_steps"));
        }
        let mut current = steps;
        for (l, layer) in self.layers.iter().enumerate() {
            if l > 0 {
                current = dropout_steps(g, current, self.dropout)?;
            }
            let fwd = layer.forward.run(g, store, &current, false)?;
            current = match &layer.backward {
                None => fwd,
                Some(cell) => {
                    let bwd = cell.run(g, store, &current, true)?;
                    fwd.into_iter()
                        .zip(bwd)
                        .map(|(a, b)| g.concat_cols(&[a, b]))
                        .collect::<Result<Vec<_>>>()?
                }
            };
        }
        Ok(current)
    }
}

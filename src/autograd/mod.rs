//! Minimal tape-based reverse-mode automatic differentiation.
//!
//! Each forward pass records its operations on a fresh `Graph`; calling
//! `Graph::backward` on the scalar loss pushes gradients into the model's
//! `ParamStore`.

pub mod graph;
mod backward;

pub use graph::{Graph, Var};

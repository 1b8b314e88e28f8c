pub mod metadata;
pub mod model;
pub mod params;
pub mod spec;

pub use metadata::ModelMetadata;
pub use model::Model;
pub use params::{ParamId, ParamStore, Parameter};
pub use spec::{ModelKind, ModelSpec, RunSpec};

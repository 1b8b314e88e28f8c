use serde::{Deserialize, Serialize};
use std::fmt;

/// Where tensors live and kernels run.
///
/// Chosen once by the caller and passed explicitly into every model and the
/// `Estimator`; nothing in the crate reads a process-wide flag.  Only the
/// CPU backend exists today, so `detect()` always settles on `Cpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Device {
    #[default]
    Cpu,
}

impl Device {
    /// Picks the best available device and logs the decision.
    pub fn detect() -> Device {
        let device = Device::Cpu;
        tracing::info!(device = %device, "using device");
        device
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

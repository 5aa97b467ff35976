use std::fmt;

use serde::Serialize;

/// Lifecycle of an [`crate::Accelerator`].
///
/// `Unavailable` is an expected outcome on hardware without a usable GPU and
/// lasts until the next `initialize`. `Disposed` also only leaves through
/// `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Unavailable,
    Disposed,
}

impl AcceleratorState {
    pub fn is_ready(self) -> bool {
        self == AcceleratorState::Ready
    }
}

impl fmt::Display for AcceleratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcceleratorState::Uninitialized => "uninitialized",
            AcceleratorState::Initializing => "initializing",
            AcceleratorState::Ready => "ready",
            AcceleratorState::Unavailable => "unavailable",
            AcceleratorState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

//! Orchestration layer of the gpufx engine.
//!
//! [`Accelerator`] is the long-lived handle consumers hold. It probes the
//! hardware once per `initialize`, owns exactly one
//! [`renderer::EffectRenderer`], measures frame throughput and recommends a
//! [`QualityTier`]. Runtime render failures never escape as errors: they are
//! logged and counted as dropped frames so a preview keeps running.
//!
//! The realtime preview loop pairs a [`VideoSource`] with a
//! [`scheduler::FrameScheduler`] and renders one frame per display refresh.

mod accelerator;
mod error;
mod metrics;
mod state;
mod tiers;
mod video;

pub use accelerator::{
    Accelerator, BackendFactory, RealtimeFrame, RealtimeReport, StopReason, DEFAULT_FRAME_BUDGET,
};
pub use error::AcceleratorError;
pub use metrics::PerformanceSample;
pub use state::AcceleratorState;
pub use tiers::{QualityTier, TierLevel, HIGH_TIER_TEXTURE_SIZE, MID_TIER_TEXTURE_SIZE};
pub use video::{ImageSequence, VideoSource};

//! Effect renderer for the gpufx compositing engine.
//!
//! The crate turns a frame plus an [`catalog::EffectChain`] into pixels on an
//! offscreen canvas. The flow for one frame is:
//!
//! ```text
//!   FrameSource ──▶ upload_frame ──▶ input texture ──┐
//!                                        ▲           ▼
//!                                        │      draw(effect n)
//!                                        │           │
//!                                        └── copy ◀── canvas ──▶ read_pixels / export
//! ```
//!
//! [`EffectRenderer`] owns the program cache and drives a [`GraphicsBackend`].
//! Two backends exist: [`WgpuBackend`], which compiles the catalog GLSL
//! through wgpu's naga frontend on a headless device, and [`SoftwareBackend`],
//! a rayon CPU rasterizer running the same programs as Rust kernels.
//! [`CapabilityProbe`] reports what the hardware can do without creating a
//! renderer.

mod backend;
mod compile;
mod effect_renderer;
mod error;
mod export;
mod gpu;
mod lut;
mod probe;
mod software;
mod types;
mod uniforms;

pub use backend::{GraphicsBackend, ProgramSource, ShaderDiagnostics};
pub use effect_renderer::{Canvas, EffectRenderer, RenderStats};
pub use error::RenderError;
pub use export::{encode, EncodedImage, PendingExport, DEFAULT_QUALITY};
pub use gpu::WgpuBackend;
pub use lut::{LutImage, DEFAULT_LUT_SIZE, MAX_LUT_SIZE, MIN_LUT_SIZE};
pub use probe::{probe, CapabilityProbe, FixedProbe, SoftwareProbe, WgpuProbe};
pub use software::SoftwareBackend;
pub use types::{
    FrameSource, GpuCapabilities, GpuPowerPreference, ImageFormat, ProgramId,
    SOFTWARE_MAX_TEXTURE_SIZE,
};
pub use uniforms::ResolvedUniforms;

//! Effect catalog for the gpufx compositing engine.
//!
//! The catalog is closed: [`EffectKind`] enumerates every effect the engine can
//! run, and each kind maps to exactly one GLSL fragment program plus a static
//! uniform contract. Effect chains parsed from JSON are resolved against this
//! enum up front, so a renderer never sees a kind it has no program for.

mod chain;
mod kind;
mod layout;
mod shaders;
mod uniform;

pub use chain::{ChainParseError, EffectChain, EffectSpec, TIME_UNIFORM};
pub use kind::{EffectKind, UnknownEffectKind};
pub use layout::{UniformLayout, UniformSlot, RESOLUTION_UNIFORM};
pub use shaders::{
    distortion_mode, fragment_source, uniform_contract, vertex_source, LUT_SIZE_UNIFORM,
};
pub use uniform::{UniformDecl, UniformType, UniformValue};

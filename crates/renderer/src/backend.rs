use std::fmt;

use anyhow::Result;
use catalog::EffectKind;

use crate::lut::LutImage;
use crate::types::{FrameSource, GpuCapabilities, ProgramId};
use crate::uniforms::ResolvedUniforms;

/// Compiler or linker output for a program that failed to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDiagnostics {
    pub stage: String,
    pub log: String,
}

impl ShaderDiagnostics {
    pub fn new(stage: impl Into<String>, log: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            log: log.into(),
        }
    }
}

impl fmt::Display for ShaderDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage: {}", self.stage, self.log.trim_end())
    }
}

/// Sources handed to [`GraphicsBackend::compile_program`].
#[derive(Debug, Clone)]
pub struct ProgramSource<'a> {
    pub kind: EffectKind,
    pub vertex: &'a str,
    pub fragment: &'a str,
}

/// One rendering context with a single output canvas.
///
/// The context owns two RGBA8 surfaces of the current frame size: the input
/// texture programs sample as `u_image`, and the canvas they draw into. Every
/// [`draw`](GraphicsBackend::draw) renders a fullscreen quad from the input
/// into the canvas and then copies the canvas back into the input, so the
/// next draw in a chain sees the previous draw's result.
pub trait GraphicsBackend: Send {
    /// Short label used in logs, e.g. `wgpu` or `software`.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> &GpuCapabilities;

    /// Current canvas size in pixels. `(0, 0)` before the first upload.
    fn canvas_size(&self) -> (u32, u32);

    /// Resizes both surfaces to the frame, uploads it as the input texture
    /// and copies it onto the canvas.
    fn upload_frame(&mut self, frame: &FrameSource<'_>) -> Result<()>;

    /// Binds `lut` for programs that sample a lookup table.
    fn upload_lut(&mut self, lut: &LutImage) -> Result<()>;

    fn compile_program(
        &mut self,
        source: &ProgramSource<'_>,
    ) -> std::result::Result<ProgramId, ShaderDiagnostics>;

    fn draw(&mut self, program: ProgramId, uniforms: &ResolvedUniforms) -> Result<()>;

    /// RGBA8 canvas contents, rows top to bottom.
    fn read_pixels(&self) -> Result<Vec<u8>>;

    fn delete_program(&mut self, program: ProgramId);

    /// Drops every GPU resource. Later calls other than `release` may fail.
    fn release(&mut self);

    fn is_lost(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_name_the_stage() {
        let diagnostics = ShaderDiagnostics::new("fragment", "0:3: unexpected token\n");
        assert_eq!(diagnostics.to_string(), "fragment stage: 0:3: unexpected token");
    }
}

//! CPU rasterizer implementing [`GraphicsBackend`].
//!
//! Used when no GPU adapter exists and by tests. Each draw shades every pixel
//! in parallel with rayon and stores the result as RGBA8, so a chain run here
//! goes through the same per-pass quantization as a GPU render target.

mod kernels;
mod sampler;

use std::collections::HashMap;

use anyhow::{bail, Result};
use catalog::EffectKind;
use rayon::prelude::*;
use tracing::trace;

use crate::backend::{GraphicsBackend, ProgramSource, ShaderDiagnostics};
use crate::lut::LutImage;
use crate::types::{FrameSource, GpuCapabilities, ProgramId};
use crate::uniforms::ResolvedUniforms;

use kernels::{shade, ShadeInputs};
use sampler::{quantize, Texture};

pub struct SoftwareBackend {
    capabilities: GpuCapabilities,
    width: u32,
    height: u32,
    input: Vec<u8>,
    canvas: Vec<u8>,
    lut: Option<LutImage>,
    programs: HashMap<ProgramId, EffectKind>,
    next_program: u64,
    released: bool,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::with_capabilities(GpuCapabilities::software_rasterizer())
    }

    /// A software backend that reports `capabilities` instead of its own.
    pub fn with_capabilities(capabilities: GpuCapabilities) -> Self {
        Self {
            capabilities,
            width: 0,
            height: 0,
            input: Vec::new(),
            canvas: Vec::new(),
            lut: None,
            programs: HashMap::new(),
            next_program: 1,
            released: false,
        }
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released {
            bail!("software backend has been released");
        }
        Ok(())
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn upload_frame(&mut self, frame: &FrameSource<'_>) -> Result<()> {
        self.ensure_live()?;
        if frame.size() != (self.width, self.height) {
            trace!(width = frame.width(), height = frame.height(), "resizing software canvas");
            self.width = frame.width();
            self.height = frame.height();
        }
        self.input.clear();
        self.input.extend_from_slice(frame.pixels());
        self.canvas.clone_from(&self.input);
        Ok(())
    }

    fn upload_lut(&mut self, lut: &LutImage) -> Result<()> {
        self.ensure_live()?;
        self.lut = Some(lut.clone());
        Ok(())
    }

    fn compile_program(
        &mut self,
        source: &ProgramSource<'_>,
    ) -> std::result::Result<ProgramId, ShaderDiagnostics> {
        if self.released {
            return Err(ShaderDiagnostics::new("link", "context has been released"));
        }
        if !source.fragment.contains("void main()") {
            return Err(ShaderDiagnostics::new(
                "fragment",
                "no entry point `main` in fragment source",
            ));
        }
        if !source.vertex.contains("void main()") {
            return Err(ShaderDiagnostics::new(
                "vertex",
                "no entry point `main` in vertex source",
            ));
        }
        let id = ProgramId(self.next_program);
        self.next_program += 1;
        self.programs.insert(id, source.kind);
        Ok(id)
    }

    fn draw(&mut self, program: ProgramId, uniforms: &ResolvedUniforms) -> Result<()> {
        self.ensure_live()?;
        let Some(&kind) = self.programs.get(&program) else {
            bail!("program {program:?} does not exist");
        };
        if self.width == 0 || self.height == 0 {
            bail!("no frame has been uploaded");
        }

        let (width, height) = (self.width, self.height);
        let inputs = ShadeInputs {
            image: Texture::new(width, height, &self.input),
            lut: self
                .lut
                .as_ref()
                .map(|lut| Texture::new(lut.width(), lut.height(), lut.pixels())),
            uniforms,
        };
        let row_bytes = width as usize * 4;
        self.canvas
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                let v = (y as f32 + 0.5) / height as f32;
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let u = (x as f32 + 0.5) / width as f32;
                    let color = shade(kind, &inputs, [u, v]);
                    for channel in 0..4 {
                        px[channel] = quantize(color[channel]);
                    }
                }
            });
        self.input.copy_from_slice(&self.canvas);
        Ok(())
    }

    fn read_pixels(&self) -> Result<Vec<u8>> {
        self.ensure_live()?;
        Ok(self.canvas.clone())
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
    }

    fn release(&mut self) {
        self.programs.clear();
        self.input = Vec::new();
        self.canvas = Vec::new();
        self.lut = None;
        self.released = true;
    }

    fn is_lost(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use catalog::{fragment_source, vertex_source, EffectSpec};

    use super::*;

    fn compile(backend: &mut SoftwareBackend, kind: EffectKind) -> ProgramId {
        let fragment = fragment_source(kind);
        backend
            .compile_program(&ProgramSource {
                kind,
                vertex: vertex_source(),
                fragment: &fragment,
            })
            .unwrap()
    }

    #[test]
    fn upload_shows_source_on_canvas() {
        let mut backend = SoftwareBackend::new();
        let frame = FrameSource::solid(3, 2, [9, 8, 7, 6]).unwrap();
        backend.upload_frame(&frame).unwrap();
        assert_eq!(backend.canvas_size(), (3, 2));
        assert_eq!(backend.read_pixels().unwrap(), frame.pixels());
    }

    #[test]
    fn zero_strength_blur_keeps_uniform_image() {
        let mut backend = SoftwareBackend::new();
        backend
            .upload_frame(&FrameSource::solid(4, 4, [40, 80, 120, 255]).unwrap())
            .unwrap();
        let program = compile(&mut backend, EffectKind::Blur);
        let uniforms = ResolvedUniforms::resolve(&EffectSpec::new(EffectKind::Blur), (4, 4), None);
        backend.draw(program, &uniforms).unwrap();
        let pixels = backend.read_pixels().unwrap();
        assert!(pixels.chunks(4).all(|px| px == [40, 80, 120, 255]));
    }

    #[test]
    fn missing_program_is_an_error() {
        let mut backend = SoftwareBackend::new();
        backend
            .upload_frame(&FrameSource::solid(1, 1, [0, 0, 0, 255]).unwrap())
            .unwrap();
        let uniforms = ResolvedUniforms::resolve(&EffectSpec::new(EffectKind::Blur), (1, 1), None);
        assert!(backend.draw(ProgramId(42), &uniforms).is_err());
    }

    #[test]
    fn released_backend_refuses_work() {
        let mut backend = SoftwareBackend::new();
        compile(&mut backend, EffectKind::Sharpen);
        backend.release();
        assert_eq!(backend.program_count(), 0);
        assert!(backend.read_pixels().is_err());
    }
}

use std::collections::HashMap;

use catalog::{fragment_source, vertex_source, EffectChain, EffectKind};
use image::RgbaImage;
use tracing::{debug, error, trace};

use crate::backend::{GraphicsBackend, ProgramSource};
use crate::error::RenderError;
use crate::export::{encode, EncodedImage, PendingExport};
use crate::lut::{LutImage, DEFAULT_LUT_SIZE};
use crate::types::{FrameSource, GpuCapabilities, ImageFormat, ProgramId};
use crate::uniforms::ResolvedUniforms;

/// Counters describing the renderer's work so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames: u64,
    pub draws: u64,
    pub programs_compiled: u64,
}

/// Applies effect chains to frames on one graphics backend.
///
/// Programs are compiled the first time a kind is drawn and reused for the
/// renderer's lifetime. Failed compilations are not cached, so the next
/// render retries them.
pub struct EffectRenderer {
    backend: Option<Box<dyn GraphicsBackend>>,
    programs: HashMap<EffectKind, ProgramId>,
    lut_size: Option<u32>,
    stats: RenderStats,
}

impl EffectRenderer {
    pub fn new(backend: Box<dyn GraphicsBackend>) -> Self {
        debug!(backend = backend.name(), "created effect renderer");
        Self {
            backend: Some(backend),
            programs: HashMap::new(),
            lut_size: None,
            stats: RenderStats::default(),
        }
    }

    fn backend(&self) -> Result<&dyn GraphicsBackend, RenderError> {
        self.backend.as_deref().ok_or(RenderError::Disposed)
    }

    fn backend_mut(&mut self) -> Result<&mut Box<dyn GraphicsBackend>, RenderError> {
        let backend = self.backend.as_mut().ok_or(RenderError::Disposed)?;
        if backend.is_lost() {
            return Err(RenderError::ContextLost);
        }
        Ok(backend)
    }

    pub fn capabilities(&self) -> Option<&GpuCapabilities> {
        self.backend.as_deref().map(|backend| backend.capabilities())
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_deref().map(|backend| backend.name())
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Program for `kind`, compiling it on first use.
    pub fn program(&mut self, kind: EffectKind) -> Result<ProgramId, RenderError> {
        if let Some(&program) = self.programs.get(&kind) {
            return Ok(program);
        }
        let fragment = fragment_source(kind);
        let backend = self.backend_mut()?;
        let program = backend
            .compile_program(&ProgramSource {
                kind,
                vertex: vertex_source(),
                fragment: &fragment,
            })
            .map_err(|diagnostics| {
                error!(%kind, %diagnostics, "effect program failed to compile");
                RenderError::ShaderCompilation { kind, diagnostics }
            })?;
        debug!(%kind, program = program.0, "compiled effect program");
        self.programs.insert(kind, program);
        self.stats.programs_compiled += 1;
        Ok(program)
    }

    /// Binds a lookup table for `lut` effects. Until one is loaded an
    /// identity table of [`DEFAULT_LUT_SIZE`] is used.
    pub fn load_lut(&mut self, lut: &LutImage) -> Result<(), RenderError> {
        self.backend_mut()?
            .upload_lut(lut)
            .map_err(RenderError::Backend)?;
        self.lut_size = Some(lut.size());
        debug!(size = lut.size(), "bound LUT");
        Ok(())
    }

    fn ensure_lut(&mut self) -> Result<u32, RenderError> {
        if let Some(size) = self.lut_size {
            return Ok(size);
        }
        self.load_lut(&LutImage::identity(DEFAULT_LUT_SIZE)?)?;
        Ok(DEFAULT_LUT_SIZE)
    }

    /// Uploads `frame` and applies every effect in order.
    ///
    /// An empty chain leaves the source frame on the canvas. A compilation
    /// failure aborts the chain at that effect.
    pub fn render(
        &mut self,
        frame: &FrameSource<'_>,
        chain: &EffectChain,
    ) -> Result<Canvas<'_>, RenderError> {
        let backend = self.backend_mut()?;
        let limit = backend.capabilities().max_texture_size;
        if limit > 0 && (frame.width() > limit || frame.height() > limit) {
            return Err(RenderError::InvalidFrame(format!(
                "{}x{} exceeds the maximum texture size of {limit}",
                frame.width(),
                frame.height()
            )));
        }
        backend.upload_frame(frame).map_err(RenderError::Backend)?;

        for spec in chain {
            let program = self.program(spec.kind)?;
            let lut_size = if spec.kind.samples_lut() {
                Some(self.ensure_lut()?)
            } else {
                None
            };
            let uniforms = ResolvedUniforms::resolve(spec, frame.size(), lut_size);
            self.backend_mut()?
                .draw(program, &uniforms)
                .map_err(RenderError::Backend)?;
            self.stats.draws += 1;
            trace!(kind = %spec.kind, "drew effect");
        }

        self.stats.frames += 1;
        self.canvas()
    }

    /// The canvas holding the last rendered frame.
    pub fn canvas(&self) -> Result<Canvas<'_>, RenderError> {
        let backend = self.backend()?;
        let (width, height) = backend.canvas_size();
        Ok(Canvas {
            backend,
            width,
            height,
        })
    }

    pub fn export(&self, format: ImageFormat, quality: f32) -> Result<EncodedImage, RenderError> {
        self.canvas()?.export(format, quality)
    }

    pub fn export_data_url(&self, format: ImageFormat, quality: f32) -> Result<String, RenderError> {
        Ok(self.export(format, quality)?.to_data_url())
    }

    /// Reads the canvas now and encodes it on a worker thread.
    pub fn export_async(&self, format: ImageFormat, quality: f32) -> PendingExport {
        let snapshot = self.canvas().and_then(|canvas| {
            let pixels = canvas.read_pixels()?;
            Ok((canvas.width, canvas.height, pixels))
        });
        match snapshot {
            Ok((width, height, pixels)) => {
                PendingExport::spawn(width, height, pixels, format, quality)
            }
            Err(err) => PendingExport::failed(err),
        }
    }

    /// Deletes every program and releases the backend. Safe to call twice.
    pub fn dispose(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            return;
        };
        for (_, program) in self.programs.drain() {
            backend.delete_program(program);
        }
        backend.release();
        self.lut_size = None;
        debug!(backend = backend.name(), "disposed effect renderer");
    }

    pub fn is_disposed(&self) -> bool {
        self.backend.is_none()
    }
}

impl Drop for EffectRenderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Read access to the renderer's output surface.
pub struct Canvas<'a> {
    backend: &'a dyn GraphicsBackend,
    width: u32,
    height: u32,
}

impl Canvas<'_> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA8 pixels, rows top to bottom.
    pub fn read_pixels(&self) -> Result<Vec<u8>, RenderError> {
        self.backend.read_pixels().map_err(RenderError::Backend)
    }

    pub fn to_image(&self) -> Result<RgbaImage, RenderError> {
        let pixels = self.read_pixels()?;
        RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| RenderError::Export("canvas size does not match its pixels".to_string()))
    }

    pub fn export(&self, format: ImageFormat, quality: f32) -> Result<EncodedImage, RenderError> {
        encode(self.width, self.height, &self.read_pixels()?, format, quality)
    }
}

impl std::fmt::Debug for Canvas<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("backend", &self.backend.name())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

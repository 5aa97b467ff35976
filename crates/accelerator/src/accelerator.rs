use std::borrow::Cow;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use catalog::EffectChain;
use renderer::{
    Canvas, CapabilityProbe, EffectRenderer, EncodedImage, FrameSource, GpuCapabilities,
    GpuPowerPreference, GraphicsBackend, ImageFormat, LutImage, PendingExport, RenderError,
    RenderStats, SoftwareBackend, SoftwareProbe, WgpuBackend, WgpuProbe,
};
use scheduler::{FrameScheduler, Tick};
use tracing::{debug, info, warn};

use crate::error::AcceleratorError;
use crate::metrics::{FrameMeter, PerformanceSample};
use crate::state::AcceleratorState;
use crate::tiers::QualityTier;
use crate::video::VideoSource;

/// Builds the graphics backend once the probe has reported usable hardware.
pub type BackendFactory =
    Box<dyn Fn(&GpuCapabilities) -> anyhow::Result<Box<dyn GraphicsBackend>>>;

pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(16);

/// One refresh of the realtime loop, handed to the caller's callback.
pub struct RealtimeFrame<'a> {
    pub tick: Tick,
    /// Video time the frame was rendered at, in seconds.
    pub time: f32,
    /// The rendered canvas, `None` when the frame was dropped.
    pub canvas: Option<Canvas<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Paused,
    Ended,
    /// The scheduler stopped handing out ticks.
    Shutdown,
    /// The callback asked to stop.
    Cancelled,
    /// The accelerator was not ready when the loop started.
    NotReady,
}

/// Summary of one realtime run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeReport {
    pub ticks: u64,
    pub frames_rendered: u64,
    pub frames_dropped: u64,
    pub stopped: StopReason,
}

/// Owns one effect renderer and the policy around it.
///
/// The accelerator probes the hardware, builds the renderer on a backend,
/// measures every frame and turns runtime render failures into dropped
/// frames. Consumers hold this and nothing else.
pub struct Accelerator {
    probe: Box<dyn CapabilityProbe>,
    factory: BackendFactory,
    state: AcceleratorState,
    renderer: Option<EffectRenderer>,
    capabilities: Option<GpuCapabilities>,
    meter: FrameMeter,
    frame_budget: Duration,
}

impl Accelerator {
    pub fn new(probe: Box<dyn CapabilityProbe>, factory: BackendFactory) -> Self {
        Self {
            probe,
            factory,
            state: AcceleratorState::Uninitialized,
            renderer: None,
            capabilities: None,
            meter: FrameMeter::default(),
            frame_budget: DEFAULT_FRAME_BUDGET,
        }
    }

    /// Hardware-accelerated configuration backed by wgpu.
    pub fn gpu(power: GpuPowerPreference) -> Self {
        Self::new(
            Box::new(WgpuProbe::new(power)),
            Box::new(move |_: &GpuCapabilities| {
                let backend = WgpuBackend::new(power)?;
                Ok(Box::new(backend) as Box<dyn GraphicsBackend>)
            }),
        )
    }

    /// CPU rasterizer configuration. Always initializes.
    pub fn software() -> Self {
        Self::new(
            Box::new(SoftwareProbe),
            Box::new(|capabilities: &GpuCapabilities| {
                let backend = SoftwareBackend::with_capabilities(capabilities.clone());
                Ok(Box::new(backend) as Box<dyn GraphicsBackend>)
            }),
        )
    }

    /// Frames slower than `budget` are logged.
    pub fn with_frame_budget(mut self, budget: Duration) -> Self {
        self.frame_budget = budget;
        self
    }

    pub fn state(&self) -> AcceleratorState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Probes the hardware and builds a renderer.
    ///
    /// Returns `false` and moves to [`AcceleratorState::Unavailable`] when the
    /// hardware is unsupported or the backend cannot be created. `backend`
    /// overrides the factory. A previous renderer is disposed first.
    pub fn initialize(&mut self, backend: Option<Box<dyn GraphicsBackend>>) -> bool {
        self.release_renderer();
        self.state = AcceleratorState::Initializing;

        let capabilities = self.probe.probe();
        if !capabilities.available {
            info!("graphics acceleration unavailable on this system");
            self.state = AcceleratorState::Unavailable;
            return false;
        }

        let backend = match backend {
            Some(backend) => backend,
            None => match (self.factory)(&capabilities) {
                Ok(backend) => backend,
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "failed to create graphics backend");
                    self.state = AcceleratorState::Unavailable;
                    return false;
                }
            },
        };

        let renderer = EffectRenderer::new(backend);
        info!(
            backend = renderer.backend_name().unwrap_or("none"),
            renderer = %capabilities.renderer,
            vendor = %capabilities.vendor,
            max_texture_size = capabilities.max_texture_size,
            tier = %QualityTier::for_max_texture_size(capabilities.max_texture_size).level,
            "accelerator ready"
        );
        self.renderer = Some(renderer);
        self.capabilities = Some(capabilities);
        self.meter = FrameMeter::default();
        self.state = AcceleratorState::Ready;
        true
    }

    /// Capabilities cached by the last successful `initialize`.
    pub fn capabilities(&self) -> Option<&GpuCapabilities> {
        self.capabilities.as_ref()
    }

    /// Quality settings for the cached capabilities. Without them the lowest
    /// tier is recommended.
    pub fn recommended_settings(&self) -> QualityTier {
        let max_texture_size = self
            .capabilities
            .as_ref()
            .map(|capabilities| capabilities.max_texture_size)
            .unwrap_or(0);
        QualityTier::for_max_texture_size(max_texture_size)
    }

    pub fn performance(&self) -> PerformanceSample {
        self.meter.sample()
    }

    pub fn render_stats(&self) -> Option<RenderStats> {
        self.renderer.as_ref().map(EffectRenderer::stats)
    }

    fn renderer(&self) -> Result<&EffectRenderer, AcceleratorError> {
        match self.state {
            AcceleratorState::Disposed => Err(AcceleratorError::Disposed),
            _ => self.renderer.as_ref().ok_or(AcceleratorError::NotReady),
        }
    }

    fn renderer_mut(&mut self) -> Result<&mut EffectRenderer, AcceleratorError> {
        match self.state {
            AcceleratorState::Disposed => Err(AcceleratorError::Disposed),
            _ => self.renderer.as_mut().ok_or(AcceleratorError::NotReady),
        }
    }

    /// Renders one frame through `chain`.
    ///
    /// `Ok(None)` means nothing was rendered: either the accelerator is not
    /// ready or the frame failed at runtime and was counted as dropped.
    /// Shader compilation failures are returned as errors.
    pub fn render_frame(
        &mut self,
        frame: &FrameSource<'_>,
        chain: &EffectChain,
    ) -> Result<Option<Canvas<'_>>, AcceleratorError> {
        if self.state == AcceleratorState::Disposed {
            return Err(AcceleratorError::Disposed);
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(None);
        };

        let started = Instant::now();
        let result = renderer.render(frame, chain);
        let frame_time = started.elapsed();

        match result {
            Ok(canvas) => {
                if let Some(fps) = self.meter.record_frame(frame_time, Instant::now()) {
                    debug!(
                        fps = fps.round(),
                        frame_count = self.meter.frame_count(),
                        dropped = self.meter.sample().dropped_frames,
                        "render stats"
                    );
                }
                if frame_time > self.frame_budget {
                    debug!(
                        frame_ms = frame_time.as_millis() as u64,
                        budget_ms = self.frame_budget.as_millis() as u64,
                        effects = chain.len(),
                        "frame over budget"
                    );
                }
                Ok(Some(canvas))
            }
            Err(err @ RenderError::ShaderCompilation { .. }) => Err(err.into()),
            Err(RenderError::Disposed) => Err(AcceleratorError::Disposed),
            Err(err) => {
                self.meter.record_dropped();
                warn!(
                    error = %err,
                    width = frame.width(),
                    height = frame.height(),
                    "dropped frame"
                );
                Ok(None)
            }
        }
    }

    /// Plays `video` through `chain`, rendering one frame per scheduler tick.
    ///
    /// Each tick first advances the video by the time since the previous
    /// tick, then stops if the video is paused or has ended. `time` uniforms
    /// the chain leaves unset follow the video clock. The loop also stops
    /// when the scheduler shuts down or `on_frame` breaks.
    pub fn render_video_realtime<V, S, F>(
        &mut self,
        video: &mut V,
        chain: &EffectChain,
        mut scheduler: S,
        mut on_frame: F,
    ) -> Result<RealtimeReport, AcceleratorError>
    where
        V: VideoSource + ?Sized,
        S: FrameScheduler,
        F: FnMut(RealtimeFrame<'_>) -> ControlFlow<()>,
    {
        let mut report = RealtimeReport {
            ticks: 0,
            frames_rendered: 0,
            frames_dropped: 0,
            stopped: StopReason::Shutdown,
        };
        if self.state == AcceleratorState::Disposed {
            return Err(AcceleratorError::Disposed);
        }
        if !self.is_ready() {
            report.stopped = StopReason::NotReady;
            return Ok(report);
        }

        let clocked = chain.needs_clock();
        let interval = scheduler.interval();
        info!(
            effects = chain.len(),
            interval_ms = interval.as_secs_f32() * 1000.0,
            "starting realtime preview"
        );

        while let Some(tick) = scheduler.next_tick() {
            report.ticks += 1;
            if tick.index > 0 {
                let steps = u32::try_from(tick.missed.saturating_add(1)).unwrap_or(u32::MAX);
                video.advance(interval.saturating_mul(steps));
            }
            if tick.missed > 0 {
                debug!(missed = tick.missed, "preview fell behind the display");
            }
            if video.is_paused() {
                report.stopped = StopReason::Paused;
                break;
            }
            if video.is_ended() {
                report.stopped = StopReason::Ended;
                break;
            }
            let Some(frame) = video.current_frame() else {
                report.stopped = StopReason::Ended;
                break;
            };

            let time = video.current_time();
            let chain: Cow<'_, EffectChain> = if clocked {
                Cow::Owned(chain.at_time(time))
            } else {
                Cow::Borrowed(chain)
            };
            let canvas = self.render_frame(&frame, &chain)?;
            if canvas.is_some() {
                report.frames_rendered += 1;
            } else {
                report.frames_dropped += 1;
            }
            if on_frame(RealtimeFrame { tick, time, canvas }).is_break() {
                report.stopped = StopReason::Cancelled;
                break;
            }
        }

        info!(
            ticks = report.ticks,
            rendered = report.frames_rendered,
            dropped = report.frames_dropped,
            stopped = ?report.stopped,
            "realtime preview finished"
        );
        Ok(report)
    }

    /// Binds a lookup table for `lut` effects.
    pub fn load_lut(&mut self, lut: &LutImage) -> Result<(), AcceleratorError> {
        Ok(self.renderer_mut()?.load_lut(lut)?)
    }

    /// Encodes the last rendered frame.
    pub fn export_frame(
        &self,
        format: ImageFormat,
        quality: f32,
    ) -> Result<EncodedImage, AcceleratorError> {
        Ok(self.renderer()?.export(format, quality)?)
    }

    pub fn export_frame_data_url(
        &self,
        format: ImageFormat,
        quality: f32,
    ) -> Result<String, AcceleratorError> {
        Ok(self.renderer()?.export_data_url(format, quality)?)
    }

    /// Reads the last frame back now and encodes it off-thread.
    pub fn export_frame_async(
        &self,
        format: ImageFormat,
        quality: f32,
    ) -> Result<PendingExport, AcceleratorError> {
        Ok(self.renderer()?.export_async(format, quality))
    }

    fn release_renderer(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
        }
        self.capabilities = None;
    }

    /// Releases the renderer and forgets the cached capabilities. Only
    /// `initialize` works afterwards. Safe to call twice.
    pub fn dispose(&mut self) {
        if self.state == AcceleratorState::Disposed {
            return;
        }
        self.release_renderer();
        self.state = AcceleratorState::Disposed;
        info!("accelerator disposed");
    }
}

impl Drop for Accelerator {
    fn drop(&mut self) {
        self.release_renderer();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use catalog::{EffectKind, EffectSpec};
    use image::RgbaImage;
    use renderer::FixedProbe;
    use scheduler::ManualScheduler;

    use super::*;
    use crate::video::ImageSequence;

    fn caps_with_texture_size(max_texture_size: u32) -> GpuCapabilities {
        GpuCapabilities {
            max_texture_size,
            max_renderbuffer_size: max_texture_size,
            ..GpuCapabilities::software_rasterizer()
        }
    }

    fn software_factory() -> BackendFactory {
        Box::new(|capabilities: &GpuCapabilities| {
            Ok(Box::new(SoftwareBackend::with_capabilities(capabilities.clone()))
                as Box<dyn GraphicsBackend>)
        })
    }

    fn accelerator_with(capabilities: GpuCapabilities) -> Accelerator {
        Accelerator::new(Box::new(FixedProbe(capabilities)), software_factory())
    }

    fn gray(size: u32) -> FrameSource<'static> {
        FrameSource::solid(size, size, [128, 128, 128, 255]).unwrap()
    }

    #[test]
    fn recommended_settings_follow_probe() {
        for (size, tier) in [
            (8192, QualityTier::HIGH),
            (4096, QualityTier::MID),
            (4095, QualityTier::LOW),
        ] {
            let mut accelerator = accelerator_with(caps_with_texture_size(size));
            assert!(accelerator.initialize(None));
            assert_eq!(accelerator.recommended_settings(), tier, "size {size}");
        }
    }

    #[test]
    fn unavailable_probe_leaves_accelerator_unavailable() {
        let factory_calls = Rc::new(Cell::new(0));
        let calls = Rc::clone(&factory_calls);
        let mut accelerator = Accelerator::new(
            Box::new(FixedProbe(GpuCapabilities::unavailable())),
            Box::new(move |capabilities: &GpuCapabilities| {
                calls.set(calls.get() + 1);
                Ok(Box::new(SoftwareBackend::with_capabilities(capabilities.clone()))
                    as Box<dyn GraphicsBackend>)
            }),
        );

        assert!(!accelerator.initialize(None));
        assert_eq!(accelerator.state(), AcceleratorState::Unavailable);
        assert_eq!(factory_calls.get(), 0);
        assert!(accelerator.capabilities().is_none());

        let rendered = accelerator
            .render_frame(&gray(4), &EffectChain::new())
            .unwrap();
        assert!(rendered.is_none());
        assert!(matches!(
            accelerator.export_frame(ImageFormat::Png, 1.0),
            Err(AcceleratorError::NotReady)
        ));
    }

    #[test]
    fn factory_failure_is_unavailable() {
        let mut accelerator = Accelerator::new(
            Box::new(SoftwareProbe),
            Box::new(|_: &GpuCapabilities| Err(anyhow::anyhow!("no device"))),
        );
        assert!(!accelerator.initialize(None));
        assert_eq!(accelerator.state(), AcceleratorState::Unavailable);
    }

    #[test]
    fn supplied_backend_overrides_factory() {
        let mut accelerator = Accelerator::new(
            Box::new(SoftwareProbe),
            Box::new(|_: &GpuCapabilities| Err(anyhow::anyhow!("factory not expected"))),
        );
        assert!(accelerator.initialize(Some(Box::new(SoftwareBackend::new()))));
        assert!(accelerator.is_ready());
    }

    #[test]
    fn renders_and_measures_frames() {
        let mut accelerator = Accelerator::software();
        assert!(accelerator.initialize(None));
        let chain = EffectChain::new().then(
            EffectSpec::new(EffectKind::Vignette)
                .with("amount", 1.0)
                .with("size", 0.5)
                .with("softness", 0.1),
        );

        let canvas = accelerator.render_frame(&gray(4), &chain).unwrap().unwrap();
        assert_eq!((canvas.width(), canvas.height()), (4, 4));
        assert_eq!(accelerator.render_stats().unwrap().frames, 1);
        assert_eq!(accelerator.performance().dropped_frames, 0);

        let png = accelerator.export_frame(ImageFormat::Png, 1.0).unwrap();
        assert_eq!(png.format, ImageFormat::Png);
        assert!(accelerator
            .export_frame_data_url(ImageFormat::Jpeg, 0.8)
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn runtime_failures_become_dropped_frames() {
        let mut accelerator = accelerator_with(caps_with_texture_size(8));
        assert!(accelerator.initialize(None));
        let oversized = FrameSource::solid(16, 16, [0, 0, 0, 255]).unwrap();

        let result = accelerator
            .render_frame(&oversized, &EffectChain::new())
            .unwrap();
        assert!(result.is_none());
        assert_eq!(accelerator.performance().dropped_frames, 1);
        assert!(accelerator.is_ready());
    }

    #[test]
    fn dispose_clears_capabilities_and_is_idempotent() {
        let mut accelerator = Accelerator::software();
        assert!(accelerator.initialize(None));
        assert!(accelerator.capabilities().is_some());

        accelerator.dispose();
        assert!(accelerator.capabilities().is_none());
        assert_eq!(accelerator.state(), AcceleratorState::Disposed);
        accelerator.dispose();

        assert!(matches!(
            accelerator.render_frame(&gray(2), &EffectChain::new()),
            Err(AcceleratorError::Disposed)
        ));
        assert!(matches!(
            accelerator.export_frame(ImageFormat::Png, 1.0),
            Err(AcceleratorError::Disposed)
        ));

        assert!(accelerator.initialize(None));
        assert!(accelerator.is_ready());
    }

    fn sequence(frames: usize, fps: f32) -> ImageSequence {
        let frames = (0..frames)
            .map(|_| RgbaImage::from_pixel(4, 4, image::Rgba([90, 120, 200, 255])))
            .collect();
        ImageSequence::new(frames, fps).unwrap()
    }

    #[test]
    fn realtime_loop_renders_one_frame_per_tick_until_ended() {
        let mut accelerator = Accelerator::software();
        assert!(accelerator.initialize(None));
        let mut video = sequence(3, 30.0);
        let scheduler = ManualScheduler::new(30.0).unwrap().with_limit(10);

        let mut seen = Vec::new();
        let report = accelerator
            .render_video_realtime(&mut video, &EffectChain::new(), scheduler, |frame| {
                assert!(frame.canvas.is_some());
                seen.push(frame.tick.index);
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(report.frames_rendered, 3);
        assert_eq!(report.ticks, 4);
        assert_eq!(report.stopped, StopReason::Ended);
    }

    #[test]
    fn realtime_loop_stops_when_paused_or_cancelled() {
        let mut accelerator = Accelerator::software();
        assert!(accelerator.initialize(None));

        let mut paused = sequence(3, 30.0);
        paused.set_paused(true);
        let report = accelerator
            .render_video_realtime(
                &mut paused,
                &EffectChain::new(),
                ManualScheduler::new(30.0).unwrap(),
                |_| ControlFlow::Continue(()),
            )
            .unwrap();
        assert_eq!(report.stopped, StopReason::Paused);
        assert_eq!(report.frames_rendered, 0);

        let mut video = sequence(30, 30.0);
        let report = accelerator
            .render_video_realtime(
                &mut video,
                &EffectChain::new(),
                ManualScheduler::new(30.0).unwrap(),
                |frame| {
                    if frame.tick.index == 1 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            )
            .unwrap();
        assert_eq!(report.stopped, StopReason::Cancelled);
        assert_eq!(report.frames_rendered, 2);
    }

    #[test]
    fn realtime_loop_feeds_video_time_to_clocked_effects() {
        let mut accelerator = Accelerator::software();
        assert!(accelerator.initialize(None));
        let mut video = sequence(4, 10.0);
        let chain = EffectChain::new().then(
            EffectSpec::new(EffectKind::Distortion)
                .with("mode", 2.0)
                .with("strength", 0.5),
        );
        assert!(chain.needs_clock());

        let mut times = Vec::new();
        accelerator
            .render_video_realtime(
                &mut video,
                &chain,
                ManualScheduler::new(10.0).unwrap(),
                |frame| {
                    times.push(frame.time);
                    ControlFlow::Continue(())
                },
            )
            .unwrap();
        assert_eq!(times.len(), 4);
        assert_eq!(times[0], 0.0);
        assert!((times[3] - 0.3).abs() < 1e-4, "times = {times:?}");
    }

    #[test]
    fn realtime_loop_requires_ready() {
        let mut accelerator = Accelerator::software();
        let mut video = sequence(2, 30.0);
        let report = accelerator
            .render_video_realtime(
                &mut video,
                &EffectChain::new(),
                ManualScheduler::new(30.0).unwrap(),
                |_| ControlFlow::Continue(()),
            )
            .unwrap();
        assert_eq!(report.stopped, StopReason::NotReady);
        assert_eq!(report.ticks, 0);
    }
}

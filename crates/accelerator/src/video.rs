use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image::RgbaImage;
use renderer::FrameSource;
use tracing::debug;

/// A playing video as seen by the realtime preview loop.
///
/// The loop reads the current frame and time at every refresh and advances
/// playback by the wall time that passed between refreshes.
pub trait VideoSource {
    /// Frame at the current playback position, `None` when nothing is decoded.
    fn current_frame(&self) -> Option<FrameSource<'_>>;

    /// Playback position in seconds.
    fn current_time(&self) -> f32;

    fn is_paused(&self) -> bool;

    fn is_ended(&self) -> bool;

    /// Moves playback forward. Paused sources ignore this.
    fn advance(&mut self, elapsed: Duration);
}

/// In-memory image sequence played back at a fixed frame rate.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    frames: Vec<RgbaImage>,
    fps: f32,
    position: Duration,
    paused: bool,
}

impl ImageSequence {
    pub fn new(frames: Vec<RgbaImage>, fps: f32) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            bail!("sequence frame rate must be positive, got {fps}");
        }
        Ok(Self {
            frames,
            fps,
            position: Duration::ZERO,
            paused: false,
        })
    }

    /// Loads every decodable image in `dir`, ordered by file name.
    pub fn from_dir(dir: &Path, fps: f32) -> Result<Self> {
        let mut paths = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read sequence directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect::<Vec<_>>();
        paths.sort();

        let frames = paths
            .iter()
            .map(|path| {
                image::open(path)
                    .with_context(|| format!("failed to decode frame {}", path.display()))
                    .map(|image| image.to_rgba8())
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(dir = %dir.display(), frames = frames.len(), "loaded image sequence");
        Self::new(frames, fps)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Moves the playhead. Negative and NaN positions clamp to the start,
    /// positions past `Duration::MAX` to the end.
    pub fn seek(&mut self, seconds: f32) {
        self.position = Duration::try_from_secs_f32(seconds.max(0.0)).unwrap_or(Duration::MAX);
    }

    /// Index of the frame under the playhead.
    pub fn frame_index(&self) -> usize {
        // Nudged so positions accumulated from rounded intervals land on the
        // frame they were aimed at.
        (self.position.as_secs_f64() * f64::from(self.fps) + 1e-6).floor() as usize
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "png" | "jpg" | "jpeg" | "webp"
            )
        })
        .unwrap_or(false)
}

impl VideoSource for ImageSequence {
    fn current_frame(&self) -> Option<FrameSource<'_>> {
        let image = self.frames.get(self.frame_index())?;
        FrameSource::from_image(image).ok()
    }

    fn current_time(&self) -> f32 {
        self.position.as_secs_f32()
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_ended(&self) -> bool {
        self.frame_index() >= self.frames.len()
    }

    fn advance(&mut self, elapsed: Duration) {
        if !self.paused {
            self.position = self.position.saturating_add(elapsed);
        }
    }
}

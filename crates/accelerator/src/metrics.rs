use std::time::{Duration, Instant};

use serde::Serialize;

/// Snapshot of render throughput.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PerformanceSample {
    /// Frames per second over the last completed one-second window.
    pub fps: f32,
    /// Wall-clock duration of the most recent successful frame.
    pub frame_time_ms: f32,
    pub dropped_frames: u64,
}

/// Counts frames in one-second windows.
#[derive(Debug, Clone)]
pub(crate) struct FrameMeter {
    last_fps_update: Instant,
    frames_since_last_update: u32,
    frames_per_second: f32,
    last_frame_time: Duration,
    frame_count: u64,
    dropped_frames: u64,
}

impl FrameMeter {
    pub(crate) fn starting_at(now: Instant) -> Self {
        Self {
            last_fps_update: now,
            frames_since_last_update: 0,
            frames_per_second: 0.0,
            last_frame_time: Duration::ZERO,
            frame_count: 0,
            dropped_frames: 0,
        }
    }

    /// Records one finished frame. Returns the new fps whenever a full second
    /// has elapsed since the last update.
    pub(crate) fn record_frame(&mut self, frame_time: Duration, now: Instant) -> Option<f32> {
        self.last_frame_time = frame_time;
        self.frame_count += 1;
        self.frames_since_last_update += 1;

        let elapsed_since_fps_update = now.saturating_duration_since(self.last_fps_update);
        if elapsed_since_fps_update < Duration::from_secs(1) {
            return None;
        }
        self.frames_per_second =
            self.frames_since_last_update as f32 / elapsed_since_fps_update.as_secs_f32();
        self.frames_since_last_update = 0;
        self.last_fps_update = now;
        Some(self.frames_per_second)
    }

    pub(crate) fn record_dropped(&mut self) {
        self.dropped_frames += 1;
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn sample(&self) -> PerformanceSample {
        PerformanceSample {
            fps: self.frames_per_second,
            frame_time_ms: self.last_frame_time.as_secs_f32() * 1000.0,
            dropped_frames: self.dropped_frames,
        }
    }
}

impl Default for FrameMeter {
    fn default() -> Self {
        Self::starting_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_updates_once_per_second() {
        let start = Instant::now();
        let mut meter = FrameMeter::starting_at(start);
        let frame = Duration::from_millis(2);

        for i in 1..30u64 {
            let now = start + Duration::from_millis(i * 33);
            assert_eq!(meter.record_frame(frame, now), None);
        }
        let fps = meter
            .record_frame(frame, start + Duration::from_secs(1))
            .expect("window closed");
        assert!((fps - 30.0).abs() < 1e-3, "fps = {fps}");

        let sample = meter.sample();
        assert_eq!(sample.fps, fps);
        assert!((sample.frame_time_ms - 2.0).abs() < 1e-3);
        assert_eq!(meter.frame_count(), 30);
    }

    #[test]
    fn counter_resets_each_window() {
        let start = Instant::now();
        let mut meter = FrameMeter::starting_at(start);
        meter.record_frame(Duration::ZERO, start + Duration::from_secs(1));
        assert_eq!(meter.sample().fps, 1.0);

        for i in 1..=10u64 {
            meter.record_frame(
                Duration::ZERO,
                start + Duration::from_secs(1) + Duration::from_millis(i * 200),
            );
        }
        // Five frames per later window.
        assert!((meter.sample().fps - 5.0).abs() < 1e-3);
    }

    #[test]
    fn dropped_frames_are_counted_separately() {
        let mut meter = FrameMeter::default();
        meter.record_dropped();
        meter.record_dropped();
        assert_eq!(meter.sample().dropped_frames, 2);
        assert_eq!(meter.frame_count(), 0);
    }
}

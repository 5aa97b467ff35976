//! Display-refresh scheduling for the realtime preview loop.
//!
//! A [`FrameScheduler`] hands out one tick per display refresh. The realtime
//! loop renders exactly one frame per tick, so the scheduler alone decides
//! pacing. [`IntervalScheduler`] sleeps on the wall clock;
//! [`ManualScheduler`] advances a virtual clock without sleeping and suits
//! tests and offline rendering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("refresh rate must be positive and finite, got {0}")]
    InvalidRate(f32),
    #[error("refresh interval must be non-zero")]
    ZeroInterval,
}

/// One scheduled refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Zero-based tick number.
    pub index: u64,
    /// When the refresh was due.
    pub at: Instant,
    /// Refreshes skipped because the caller fell behind.
    pub missed: u64,
}

pub trait FrameScheduler {
    /// Waits for the next refresh. `None` once the scheduler has shut down.
    fn next_tick(&mut self) -> Option<Tick>;

    /// Nominal spacing between ticks.
    fn interval(&self) -> Duration;
}

impl<S: FrameScheduler + ?Sized> FrameScheduler for &mut S {
    fn next_tick(&mut self) -> Option<Tick> {
        (**self).next_tick()
    }

    fn interval(&self) -> Duration {
        (**self).interval()
    }
}

/// Stops a scheduler from another thread. Takes effect at the next tick.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn interval_for_rate(refresh_rate: f32) -> Result<Duration, SchedulerError> {
    if !(refresh_rate.is_finite() && refresh_rate > 0.0) {
        return Err(SchedulerError::InvalidRate(refresh_rate));
    }
    Ok(Duration::from_secs_f64(1.0 / f64::from(refresh_rate)))
}

/// `interval * count` without truncating `count` or overflowing.
fn scaled_interval(interval: Duration, count: u64) -> Duration {
    let nanos = interval.as_nanos().saturating_mul(u128::from(count));
    let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % 1_000_000_000) as u32)
}

/// Wall-clock scheduler ticking at a fixed rate.
///
/// When a frame overruns, missed refreshes are skipped rather than replayed
/// in a burst, and the count is reported on the next [`Tick`].
#[derive(Debug)]
pub struct IntervalScheduler {
    interval: Duration,
    next_deadline: Option<Instant>,
    index: u64,
    limit: Option<u64>,
    shutdown: ShutdownHandle,
}

impl IntervalScheduler {
    pub fn new(refresh_rate: f32) -> Result<Self, SchedulerError> {
        Self::from_interval(interval_for_rate(refresh_rate)?)
    }

    pub fn from_interval(interval: Duration) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        Ok(Self {
            interval,
            next_deadline: None,
            index: 0,
            limit: None,
            shutdown: ShutdownHandle::default(),
        })
    }

    /// Shuts down after `ticks` refreshes.
    pub fn with_limit(mut self, ticks: u64) -> Self {
        self.limit = Some(ticks);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }
}

impl FrameScheduler for IntervalScheduler {
    fn next_tick(&mut self) -> Option<Tick> {
        if self.shutdown.is_shutdown() || self.limit.is_some_and(|limit| self.index >= limit) {
            return None;
        }

        let now = Instant::now();
        let (at, missed) = match self.next_deadline {
            None => (now, 0),
            Some(deadline) if deadline > now => {
                thread::sleep(deadline - now);
                (deadline, 0)
            }
            Some(deadline) => {
                let behind = now.duration_since(deadline);
                let missed = (behind.as_nanos() / self.interval.as_nanos()) as u64;
                (now, missed)
            }
        };

        if self.shutdown.is_shutdown() {
            return None;
        }

        self.next_deadline = Some(at + self.interval);
        let tick = Tick {
            index: self.index,
            at,
            missed,
        };
        self.index += 1;
        Some(tick)
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Virtual-clock scheduler that never sleeps.
#[derive(Debug)]
pub struct ManualScheduler {
    origin: Instant,
    interval: Duration,
    index: u64,
    limit: Option<u64>,
    shutdown: ShutdownHandle,
}

impl ManualScheduler {
    pub fn new(refresh_rate: f32) -> Result<Self, SchedulerError> {
        Self::from_interval(interval_for_rate(refresh_rate)?)
    }

    pub fn from_interval(interval: Duration) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        Ok(Self {
            origin: Instant::now(),
            interval,
            index: 0,
            limit: None,
            shutdown: ShutdownHandle::default(),
        })
    }

    pub fn with_limit(mut self, ticks: u64) -> Self {
        self.limit = Some(ticks);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Ticks handed out so far.
    pub fn ticks(&self) -> u64 {
        self.index
    }

    /// Virtual time elapsed at the most recent tick.
    pub fn elapsed(&self) -> Duration {
        scaled_interval(self.interval, self.index.saturating_sub(1))
    }
}

impl FrameScheduler for ManualScheduler {
    fn next_tick(&mut self) -> Option<Tick> {
        if self.shutdown.is_shutdown() || self.limit.is_some_and(|limit| self.index >= limit) {
            return None;
        }
        // The virtual clock stops once it runs past what `Instant` can hold.
        let at = self
            .origin
            .checked_add(scaled_interval(self.interval, self.index))?;
        let tick = Tick {
            index: self.index,
            at,
            missed: 0,
        };
        self.index += 1;
        Some(tick)
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

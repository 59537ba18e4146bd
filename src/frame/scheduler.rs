//! Vsync-driven frame throttling
//!
//! The display refresh callback fires at the panel rate. [`FrameScheduler`] turns
//! that cadence into at most `max_frames_per_second` ticks (optionally divided by
//! a [`FrameRate`] factor) and drops any callback that arrives while the previous
//! one is still running.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NO_TICK: u64 = u64::MAX;

/// Additional integer divisor on top of the max frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameRate {
    #[default]
    Full,
    Half,
    Third,
}

impl FrameRate {
    pub fn factor(&self) -> u64 {
        match self {
            FrameRate::Full => 1,
            FrameRate::Half => 2,
            FrameRate::Third => 3,
        }
    }
}

/// What happened to a vsync callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome<R> {
    /// Same time bucket as the last tick that ran
    Throttled,
    /// A previous tick is still executing
    Busy,
    /// The scheduler is paused
    Paused,
    Ran(R),
}

impl<R> TickOutcome<R> {
    pub fn ran(self) -> Option<R> {
        match self {
            TickOutcome::Ran(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ran(&self) -> bool {
        matches!(self, TickOutcome::Ran(_))
    }
}

/// Releases the in-flight flag when the tick ends, including by unwinding
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Cooperative frame loop gate
///
/// All state is atomic so a callback holding `&FrameScheduler` can be re-entered;
/// the nested call reports [`TickOutcome::Busy`].
#[derive(Debug)]
pub struct FrameScheduler {
    max_frames_per_second: AtomicU32,
    frame_rate: AtomicU64,
    last_bucket: AtomicU64,
    running: AtomicBool,
    in_flight: AtomicBool,
    start: Instant,
}

impl FrameScheduler {
    pub fn new(max_frames_per_second: u32, frame_rate: FrameRate) -> Self {
        Self {
            max_frames_per_second: AtomicU32::new(max_frames_per_second.max(1)),
            frame_rate: AtomicU64::new(frame_rate.factor()),
            last_bucket: AtomicU64::new(NO_TICK),
            running: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            start: Instant::now(),
        }
    }

    pub fn max_frames_per_second(&self) -> u32 {
        self.max_frames_per_second.load(Ordering::Relaxed)
    }

    /// Clamped to at least one frame per second
    pub fn set_max_frames_per_second(&self, max_frames_per_second: u32) {
        self.max_frames_per_second
            .store(max_frames_per_second.max(1), Ordering::Relaxed);
    }

    pub fn frame_rate(&self) -> FrameRate {
        match self.frame_rate.load(Ordering::Relaxed) {
            2 => FrameRate::Half,
            3 => FrameRate::Third,
            _ => FrameRate::Full,
        }
    }

    pub fn set_frame_rate(&self, frame_rate: FrameRate) {
        self.frame_rate.store(frame_rate.factor(), Ordering::Relaxed);
    }

    pub fn pause(&self) {
        log::debug!("Frame scheduler paused");
        self.running.store(false, Ordering::Release);
    }

    pub fn resume(&self) {
        log::debug!("Frame scheduler resumed");
        self.running.store(true, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether a tick callback is executing right now
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn period_nanos(&self) -> u64 {
        (NANOS_PER_SECOND / u64::from(self.max_frames_per_second())).max(1)
    }

    /// Run `f` unless this callback is throttled, re-entrant or paused.
    pub fn tick<R>(&self, now_nanos: u64, f: impl FnOnce() -> R) -> TickOutcome<R> {
        if !self.is_running() {
            return TickOutcome::Paused;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            log::debug!("Dropping vsync callback: previous frame still processing");
            return TickOutcome::Busy;
        };

        let bucket = now_nanos / self.period_nanos();
        let factor = self.frame_rate.load(Ordering::Relaxed);
        let last = self.last_bucket.load(Ordering::Acquire);
        if last != NO_TICK && last / factor == bucket / factor {
            return TickOutcome::Throttled;
        }
        self.last_bucket.store(bucket, Ordering::Release);

        TickOutcome::Ran(f())
    }

    /// Tick against the scheduler's own monotonic clock
    pub fn on_vsync<R>(&self, f: impl FnOnce() -> R) -> TickOutcome<R> {
        let now = self.start.elapsed().as_nanos() as u64;
        self.tick(now, f)
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(60, FrameRate::Full)
    }
}

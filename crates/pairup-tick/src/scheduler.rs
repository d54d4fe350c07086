use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Default: one second.
    pub interval: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

impl TickConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// Shortest interval accepted; anything faster is clamped.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "tick interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a completed tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// Fixed delta for this tick (always the configured interval).
    pub dt: Duration,
    /// Whole intervals that elapsed without a tick because the task was
    /// late (0 in normal operation). Missed ticks are skipped, never
    /// replayed, so a stalled task cannot drain the countdown in a burst.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-timestep tick scheduler.
///
/// Created paused: nothing ticks until [`resume`](Self::resume) is called.
pub struct TickScheduler {
    interval: Duration,
    tick_count: u64,
    /// When the next tick should fire.
    next_tick: Instant,
    paused: bool,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            "tick scheduler created"
        );
        Self {
            interval: config.interval,
            tick_count: 0,
            next_tick: Instant::now() + config.interval,
            paused: true,
        }
    }

    /// Wait until the next tick is due.
    ///
    /// While paused this future pends forever; `tokio::select!` keeps
    /// servicing its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        if self.paused {
            std::future::pending::<()>().await;
        }

        let next = self.next_tick;
        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let ticks_skipped = (late_by.as_nanos() / self.interval.as_nanos()) as u64;
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_millis() as u64,
                "tick overrun, skipping ahead"
            );
            self.next_tick = now + self.interval;
        } else {
            self.next_tick = next + self.interval;
        }

        trace!(tick = self.tick_count, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: self.interval,
            ticks_skipped,
        }
    }

    /// Stop ticking. Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Start ticking again, one full interval from now.
    ///
    /// Idempotent: resuming a running scheduler leaves its cadence alone.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.realign();
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    /// Unpause and move the next tick to one full interval from now.
    ///
    /// Used when the countdown is reassigned, so the first second of a new
    /// phase is a whole second.
    pub fn restart(&mut self) {
        self.paused = false;
        self.realign();
        debug!(tick = self.tick_count, "tick scheduler restarted");
    }

    fn realign(&mut self) {
        self.next_tick = Instant::now() + self.interval;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

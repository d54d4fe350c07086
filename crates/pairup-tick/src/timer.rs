use serde::Serialize;

/// What a single tick did to the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer is stopped or paused; nothing changed.
    Idle,
    /// One second elapsed; this many remain.
    Counting(u32),
    /// The countdown just reached zero. Reported exactly once.
    Expired,
}

/// The round countdown: `{remaining_seconds, running, paused}`.
///
/// `remaining_seconds` only moves on [`tick`](Self::tick) while running and
/// not paused. Pausing keeps the value; stopping discards it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimerState {
    pub remaining_seconds: u32,
    pub running: bool,
    pub paused: bool,
}

impl TimerState {
    /// A stopped timer at zero, the state of a fresh or reset round.
    pub fn stopped() -> Self {
        Self::default()
    }

    /// Reassigns the countdown to `seconds` and starts it, clearing any pause.
    pub fn start(&mut self, seconds: u32) {
        *self = Self {
            remaining_seconds: seconds,
            running: true,
            paused: false,
        };
    }

    /// Stops and zeroes the countdown.
    pub fn stop(&mut self) {
        *self = Self::stopped();
    }

    /// Freezes a running countdown. Returns whether anything changed.
    pub fn pause(&mut self) -> bool {
        if self.running && !self.paused {
            self.paused = true;
            true
        } else {
            false
        }
    }

    /// Unfreezes a paused countdown. Returns whether anything changed.
    pub fn resume(&mut self) -> bool {
        if self.running && self.paused {
            self.paused = false;
            true
        } else {
            false
        }
    }

    /// True while ticks should reach this timer.
    pub fn is_counting(&self) -> bool {
        self.running && !self.paused
    }

    /// Applies one tick.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_counting() {
            return TickOutcome::Idle;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.running = false;
            TickOutcome::Expired
        } else {
            TickOutcome::Counting(self.remaining_seconds)
        }
    }
}

//! Round timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// RoundConfig
// ---------------------------------------------------------------------------

/// Timing settings for the instructor console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Countdown shown while students find their partner. Default: 2 minutes.
    pub pairing_duration: Duration,

    /// Countdown for the discussion itself. Default: 5 minutes.
    pub talking_duration: Duration,

    /// Delay between the countdown reaching zero and the automatic
    /// transition, so observers see the zero first. Default: 1 second.
    pub expiry_delay: Duration,

    /// Countdown resolution. Default: 1 second.
    pub tick_interval: Duration,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            pairing_duration: Self::DEFAULT_PAIRING,
            talking_duration: Self::DEFAULT_TALKING,
            expiry_delay: Self::DEFAULT_EXPIRY_DELAY,
            tick_interval: Self::DEFAULT_TICK,
        }
    }
}

impl RoundConfig {
    pub const DEFAULT_PAIRING: Duration = Duration::from_secs(120);
    pub const DEFAULT_TALKING: Duration = Duration::from_secs(300);
    pub const DEFAULT_EXPIRY_DELAY: Duration = Duration::from_secs(1);
    pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

    /// Longest accepted phase duration (one day).
    pub const MAX_PHASE: Duration = Duration::from_secs(24 * 60 * 60);

    /// Longest accepted expiry delay.
    pub const MAX_EXPIRY_DELAY: Duration = Duration::from_secs(10);

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically when a console is spawned. Rules:
    /// - phase durations shorter than one second fall back to their default
    /// - phase durations are capped at [`Self::MAX_PHASE`]
    /// - `expiry_delay` is capped at [`Self::MAX_EXPIRY_DELAY`]
    pub fn validated(mut self) -> Self {
        self.pairing_duration =
            clamp_phase("pairing_duration", self.pairing_duration, Self::DEFAULT_PAIRING);
        self.talking_duration =
            clamp_phase("talking_duration", self.talking_duration, Self::DEFAULT_TALKING);
        if self.expiry_delay > Self::MAX_EXPIRY_DELAY {
            warn!(
                delay_ms = self.expiry_delay.as_millis() as u64,
                "expiry_delay too long, clamping"
            );
            self.expiry_delay = Self::MAX_EXPIRY_DELAY;
        }
        self
    }

    /// Pairing countdown in whole seconds.
    pub fn pairing_secs(&self) -> u32 {
        whole_seconds(self.pairing_duration)
    }

    /// Talking countdown in whole seconds.
    pub fn talking_secs(&self) -> u32 {
        whole_seconds(self.talking_duration)
    }
}

fn clamp_phase(name: &str, value: Duration, default: Duration) -> Duration {
    if value < Duration::from_secs(1) {
        warn!(field = name, "phase duration under one second, using default");
        default
    } else if value > RoundConfig::MAX_PHASE {
        warn!(field = name, "phase duration over one day, clamping");
        RoundConfig::MAX_PHASE
    } else {
        value
    }
}

fn whole_seconds(d: Duration) -> u32 {
    u32::try_from(d.as_secs()).unwrap_or(u32::MAX)
}

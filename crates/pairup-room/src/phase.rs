//! The session phase state machine.
//!
//! ```text
//!            Start              BeginDiscussion / TimerExpired
//!   Idle ──────────→ Pairing ─────────────────────────────→ Discussing
//!    ↑                  │                                       │
//!    │    ResetRound    │    NextRound / ResetRound / TimerExpired
//!    └──────────────────┴───────────────────────────────────────┘
//!
//!   any ──EndSession──→ (exit)
//! ```
//!
//! The table is total over `(SessionPhase, Trigger)`: every pair not drawn
//! above returns `None`, and the console rejects it without side effects.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the classroom is in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Pairing,
    Discussing,
}

impl SessionPhase {
    /// Returns `true` while a round's pairing set is live.
    pub fn is_round_active(self) -> bool {
        matches!(self, Self::Pairing | Self::Discussing)
    }

    /// Looks up the transition for `trigger` from this phase.
    ///
    /// Returns `None` when the trigger is not valid here.
    pub fn apply(self, trigger: Trigger) -> Option<Transition> {
        use SessionPhase::*;
        use Trigger::*;

        match (self, trigger) {
            (_, EndSession) => Some(Transition::Exit),
            (Idle, Start) => Some(Transition::To(Pairing)),
            (Pairing, BeginDiscussion | TimerExpired) => Some(Transition::To(Discussing)),
            (Pairing, ResetRound) => Some(Transition::To(Idle)),
            (Discussing, NextRound | ResetRound | TimerExpired) => Some(Transition::To(Idle)),
            (Idle, BeginDiscussion | TimerExpired | NextRound | ResetRound)
            | (Pairing, Start | NextRound)
            | (Discussing, Start | BeginDiscussion) => None,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Pairing => write!(f, "pairing"),
            Self::Discussing => write!(f, "discussing"),
        }
    }
}

/// Everything that can move the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Start,
    BeginDiscussion,
    TimerExpired,
    NextRound,
    ResetRound,
    EndSession,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::BeginDiscussion => "begin_discussion",
            Self::TimerExpired => "timer_expired",
            Self::NextRound => "next_round",
            Self::ResetRound => "reset_round",
            Self::EndSession => "end_session",
        };
        f.write_str(name)
    }
}

/// Result of a valid trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(SessionPhase),
    /// The session is over; the machine stops.
    Exit,
}

//! Round lifecycle for a Pairup session.
//!
//! The instructor console runs as an isolated Tokio task (actor model) that
//! owns the session phase, the countdown, the roster and the current
//! pairing set. Everything else talks to it through a [`ConsoleHandle`].
//!
//! # Key types
//!
//! - [`spawn_console`] / [`ConsoleHandle`]: start and drive a console actor
//! - [`SessionPhase`] / [`Trigger`]: the phase table
//! - [`Roster`]: idempotent membership keyed by join
//! - [`RoundPairingSet`]: a validated round and each student's view of it
//! - [`ClassroomService`] / [`Broadcaster`]: the seams to the outside
//! - [`RoundConfig`]: countdown lengths

mod config;
mod console;
mod error;
mod pairing;
mod phase;
mod roster;
mod service;

pub use config::RoundConfig;
pub use console::{ConsoleHandle, ConsoleSnapshot, REMOVED_REASON, spawn_console};
pub use error::{RoundError, ServiceError};
pub use pairing::{FALLBACK_PROMPT, RoundPairingSet};
pub use phase::{SessionPhase, Transition, Trigger};
pub use roster::{JoinKey, JoinOutcome, MAX_NAME_CHARS, Roster, normalize_name};
pub use service::{Broadcaster, ClassroomService};

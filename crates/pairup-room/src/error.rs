//! Error types for the round layer.

use crate::{SessionPhase, Trigger};

/// Why a call to an external collaborator failed.
///
/// The HTTP client maps its own errors onto these classes so the console
/// can report them without knowing about HTTP.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Credentials were missing or rejected.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The service could not be reached.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The service answered with a non-success status. `message` is the
    /// service's own text.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request was refused before it was sent.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The service answered with success but the body could not be
    /// understood.
    #[error("unexpected response body: {0}")]
    BadResponse(String),
}

/// Errors that can occur during console operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RoundError {
    /// The trigger is not valid in the current phase. Nothing changed.
    #[error("cannot {trigger} while {from}")]
    InvalidTransition { from: SessionPhase, trigger: Trigger },

    /// Local input was rejected and never sent.
    #[error("{0}")]
    Validation(String),

    /// The pairing service returned an inconsistent round.
    #[error("invalid pairing: {0}")]
    InvalidPairing(String),

    /// An external call failed. The console stayed in its last phase.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The realtime channel refused an outbound event.
    #[error("broadcast failed: {0}")]
    Broadcast(String),

    /// The console actor has stopped.
    #[error("console is unavailable")]
    Unavailable,
}

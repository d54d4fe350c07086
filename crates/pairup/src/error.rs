//! Unified error type for the Pairup clients.

use pairup_api::ApiError;
use pairup_protocol::ProtocolError;
use pairup_room::{RoundError, ServiceError};
use pairup_session::SessionError;
use pairup_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically. Use
/// [`kind`](Self::kind) to decide how to present a failure.
#[derive(Debug, thiserror::Error)]
pub enum PairupError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Round(#[from] RoundError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// A configured service URL that cannot be used.
    #[error("invalid service URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// The five ways a client operation can fail, as a user sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing credentials. Shown on the form; not fatal.
    Auth,
    /// The service is unreachable. Transient.
    Network,
    /// Local input rejected before anything was sent.
    Validation,
    /// The service refused the request; its message is shown verbatim.
    ServerRejection,
    /// The local session is gone or expired; clean up and start over.
    ExpiredSession,
}

impl PairupError {
    pub(crate) fn invalid_url(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.trim().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Network,
            Self::Protocol(_) => ErrorKind::ServerRejection,
            Self::Session(_) => ErrorKind::ExpiredSession,
            Self::Round(e) => round_kind(e),
            Self::Api(e) => api_kind(e),
            Self::InvalidUrl { .. } => ErrorKind::Validation,
        }
    }
}

fn round_kind(e: &RoundError) -> ErrorKind {
    match e {
        RoundError::InvalidTransition { .. } | RoundError::Validation(_) => ErrorKind::Validation,
        RoundError::InvalidPairing(_) => ErrorKind::ServerRejection,
        RoundError::Service(e) => match e {
            ServiceError::Unauthorized(_) => ErrorKind::Auth,
            ServiceError::Unreachable(_) => ErrorKind::Network,
            ServiceError::Rejected { .. } | ServiceError::BadResponse(_) => {
                ErrorKind::ServerRejection
            }
            ServiceError::Invalid(_) => ErrorKind::Validation,
        },
        RoundError::Broadcast(_) => ErrorKind::Network,
        RoundError::Unavailable => ErrorKind::ExpiredSession,
    }
}

fn api_kind(e: &ApiError) -> ErrorKind {
    match e {
        ApiError::Auth(_) => ErrorKind::Auth,
        ApiError::Network(_) => ErrorKind::Network,
        ApiError::Validation(_) => ErrorKind::Validation,
        ApiError::Rejected { .. } | ApiError::Decode(_) => ErrorKind::ServerRejection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairup_room::{SessionPhase, Trigger};

    #[test]
    fn test_from_transport_error_is_network() {
        let err: PairupError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, PairupError::Transport(_)));
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_from_session_error_is_expired_session() {
        let err: PairupError = SessionError::NoActiveSession.into();
        assert_eq!(err.kind(), ErrorKind::ExpiredSession);
    }

    #[test]
    fn test_round_errors_map_by_cause() {
        let rejected: PairupError = RoundError::InvalidTransition {
            from: SessionPhase::Idle,
            trigger: Trigger::NextRound,
        }
        .into();
        assert_eq!(rejected.kind(), ErrorKind::Validation);

        let auth: PairupError =
            RoundError::Service(ServiceError::Unauthorized("expired".into())).into();
        assert_eq!(auth.kind(), ErrorKind::Auth);

        let server: PairupError = RoundError::Service(ServiceError::Rejected {
            status: 409,
            message: "No active round".into(),
        })
        .into();
        assert_eq!(server.kind(), ErrorKind::ServerRejection);
        assert_eq!(server.to_string(), "No active round");
    }

    #[test]
    fn test_bad_response_body_is_server_rejection_on_both_paths() {
        let decode = || serde_json::from_str::<u32>("{").unwrap_err();

        let direct: PairupError = ApiError::Decode(decode()).into();
        let via_console: PairupError =
            RoundError::Service(ServiceError::from(ApiError::Decode(decode()))).into();

        assert_eq!(direct.kind(), ErrorKind::ServerRejection);
        assert_eq!(via_console.kind(), ErrorKind::ServerRejection);
    }

    #[test]
    fn test_api_errors_map_by_cause() {
        let err: PairupError = ApiError::Validation("keyword must not be empty".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: PairupError = ApiError::Auth("Invalid credentials".into()).into();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }
}

//! Session types: the durable record of "who this client is in which class".
//!
//! A [`SessionHandle`] is what lets a client come back after a restart
//! without logging in or re-joining. It tracks:
//! - WHO the client is (role, email or username, participant id)
//! - WHICH session it belongs to (keyword)
//! - HOW it authenticates (bearer token, instructors only)
//! - WHEN the handle stops being honoured (`expires_at`)

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pairup_protocol::{ClientRole, ParticipantId};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Default lifetime of a freshly issued handle.
pub const DEFAULT_HANDLE_LIFETIME: Duration = Duration::from_secs(8 * 60 * 60);

/// Configuration for handle persistence.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a handle stays valid after it is issued.
    ///
    /// Default: 8 hours, one school day.
    pub handle_lifetime: Duration,

    /// Directory holding `handle.json` and `keyword`.
    pub state_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handle_lifetime: DEFAULT_HANDLE_LIFETIME,
            state_dir: default_state_dir(),
        }
    }
}

impl SessionConfig {
    /// Returns a copy with out-of-range values replaced by defaults.
    pub fn validated(mut self) -> Self {
        if self.handle_lifetime.is_zero() {
            warn!(
                "handle_lifetime of zero would expire every handle immediately, using default"
            );
            self.handle_lifetime = DEFAULT_HANDLE_LIFETIME;
        }
        self
    }
}

/// The platform's local data directory joined with `pairup`.
///
/// Falls back to the system temp directory on platforms without one.
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pairup")
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// A client's durable claim on one classroom session.
///
/// Instructors receive a handle at login, before any session exists, so
/// `keyword` starts empty and is filled in once a session is created.
/// Students receive theirs on a successful join, keyword included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub keyword: Option<String>,
    pub role: ClientRole,
    /// Instructor email or student username.
    pub principal: String,
    /// Bearer token. Students have none.
    pub auth_token: Option<String>,
    /// The id the service assigned on join. Students only.
    pub participant_id: Option<ParticipantId>,
    pub expires_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Handle issued after a successful instructor login or registration.
    pub fn instructor(
        email: impl Into<String>,
        token: impl Into<String>,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            keyword: None,
            role: ClientRole::Instructor,
            principal: email.into(),
            auth_token: Some(token.into()),
            participant_id: None,
            expires_at: expiry(now, lifetime),
        }
    }

    /// Handle issued after a student joined `keyword`.
    pub fn student(
        keyword: impl Into<String>,
        username: impl Into<String>,
        participant_id: ParticipantId,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            keyword: Some(keyword.into()),
            role: ClientRole::Student,
            principal: username.into(),
            auth_token: None,
            participant_id: Some(participant_id),
            expires_at: expiry(now, lifetime),
        }
    }

    /// A handle is expired once `now` reaches `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub(crate) fn record(&self) -> HandleRecord {
        HandleRecord {
            token: self.auth_token.clone(),
            principal: self.principal.clone(),
            role: self.role,
            participant_id: self.participant_id,
            expires_at: self.expires_at,
        }
    }

    pub(crate) fn from_record(record: HandleRecord, keyword: Option<String>) -> Self {
        Self {
            keyword,
            role: record.role,
            principal: record.principal,
            auth_token: record.token,
            participant_id: record.participant_id,
            expires_at: record.expires_at,
        }
    }
}

fn expiry(now: DateTime<Utc>, lifetime: Duration) -> DateTime<Utc> {
    // Lifetimes beyond chrono's range are clamped to the far future.
    chrono::Duration::from_std(lifetime)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// On-disk form of `handle.json`.
///
/// The keyword lives in its own file so an instructor can hold a token
/// before any session exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HandleRecord {
    #[serde(default)]
    pub token: Option<String>,
    pub principal: String,
    pub role: ClientRole,
    #[serde(default)]
    pub participant_id: Option<ParticipantId>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// LoadOutcome
// ---------------------------------------------------------------------------

/// What a client finds on disk at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing stored; show the entry screen.
    Empty,

    /// A valid handle to resume from.
    Active(SessionHandle),

    /// A handle past its expiry. It is returned so the caller can attempt a
    /// best-effort session end with it before clearing local state.
    Expired(SessionHandle),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_instructor_handle_has_token_and_no_keyword() {
        let h = SessionHandle::instructor("t@school.edu", "tok", t0(), DEFAULT_HANDLE_LIFETIME);
        assert_eq!(h.role, ClientRole::Instructor);
        assert_eq!(h.auth_token.as_deref(), Some("tok"));
        assert!(h.keyword.is_none());
        assert_eq!(h.expires_at, t0() + chrono::Duration::hours(8));
    }

    #[test]
    fn test_student_handle_has_no_token() {
        let h = SessionHandle::student(
            "MATH1",
            "alice",
            ParticipantId(3),
            t0(),
            DEFAULT_HANDLE_LIFETIME,
        );
        assert!(h.auth_token.is_none());
        assert_eq!(h.participant_id, Some(ParticipantId(3)));
    }

    #[test]
    fn test_is_expired_at_exact_expiry_returns_true() {
        let h = SessionHandle::instructor("e", "t", t0(), Duration::from_secs(60));
        assert!(!h.is_expired(t0() + chrono::Duration::seconds(59)));
        assert!(h.is_expired(t0() + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_validated_zero_lifetime_restores_default() {
        let config = SessionConfig {
            handle_lifetime: Duration::ZERO,
            state_dir: PathBuf::from("/tmp/x"),
        }
        .validated();
        assert_eq!(config.handle_lifetime, DEFAULT_HANDLE_LIFETIME);
    }

    #[test]
    fn test_default_state_dir_ends_with_pairup() {
        assert!(default_state_dir().ends_with("pairup"));
    }
}

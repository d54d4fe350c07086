//! The session manager: owns the one local session handle.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Issuing handles with the configured lifetime
//! - Persisting them so they survive a restart
//! - Classifying what it finds on start-up (empty, active, expired)
//! - Clearing everything on logout, leave, or expiry
//!
//! Only one handle exists per state directory, which is how "at most one
//! active session per client" is kept: establishing a new handle replaces
//! the old one.
//!
//! Time is always passed in (`now`) rather than read from the clock, so
//! expiry is deterministic under test.

use std::path::Path;

use chrono::{DateTime, Utc};
use pairup_protocol::{ClientRole, ParticipantId};
use tracing::{debug, info, warn};

use crate::session::HandleRecord;
use crate::store::FileStore;
use crate::{LoadOutcome, SessionConfig, SessionError, SessionHandle};

/// Manages the persisted session handle for this client.
///
/// ## Lifecycle
///
/// ```text
/// issue_*() ──→ establish() ──→ set_keyword() ──→ clear()
///                    │                                ▲
///                    ▼                                │
///                 load(now) ──→ Active / Expired ─────┘
/// ```
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: FileStore,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        let config = config.validated();
        Self {
            store: FileStore::new(config.state_dir.clone()),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Builds an instructor handle expiring one lifetime after `now`.
    pub fn issue_instructor(
        &self,
        email: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> SessionHandle {
        SessionHandle::instructor(email, token, now, self.config.handle_lifetime)
    }

    /// Builds a student handle expiring one lifetime after `now`.
    pub fn issue_student(
        &self,
        keyword: &str,
        username: &str,
        participant_id: ParticipantId,
        now: DateTime<Utc>,
    ) -> SessionHandle {
        SessionHandle::student(
            keyword,
            username,
            participant_id,
            now,
            self.config.handle_lifetime,
        )
    }

    /// Reads whatever is on disk and classifies it.
    ///
    /// Inconsistent state (a corrupt handle, a keyword without a handle, a
    /// student handle without a keyword) is cleared and reported as
    /// [`LoadOutcome::Empty`]; it is never an error.
    ///
    /// # Errors
    /// Returns [`SessionError::Storage`] only if the state directory itself
    /// cannot be read.
    pub fn load(&self, now: DateTime<Utc>) -> Result<LoadOutcome, SessionError> {
        let record = match self.store.read_handle() {
            Ok(record) => record,
            Err(SessionError::Corrupt(e)) => {
                warn!(error = %e, "discarding corrupt session handle");
                self.clear()?;
                return Ok(LoadOutcome::Empty);
            }
            Err(e) => return Err(e),
        };
        let keyword = self.store.read_keyword()?;

        let Some(record) = record else {
            if keyword.is_some() {
                debug!("discarding keyword with no session handle");
                self.store.clear_keyword()?;
            }
            return Ok(LoadOutcome::Empty);
        };

        if record.role == ClientRole::Student && keyword.is_none() {
            warn!(principal = %record.principal, "student handle has no keyword, discarding");
            self.clear()?;
            return Ok(LoadOutcome::Empty);
        }

        let handle = SessionHandle::from_record(record, keyword);
        if handle.is_expired(now) {
            info!(
                role = %handle.role,
                expired_at = %handle.expires_at,
                "stored session handle has expired"
            );
            Ok(LoadOutcome::Expired(handle))
        } else {
            debug!(role = %handle.role, "resuming stored session handle");
            Ok(LoadOutcome::Active(handle))
        }
    }

    /// Returns the active handle, or why there isn't one.
    ///
    /// # Errors
    /// - [`SessionError::NoActiveSession`] — nothing stored
    /// - [`SessionError::Expired`] — stored handle is past its expiry
    pub fn current(&self, now: DateTime<Utc>) -> Result<SessionHandle, SessionError> {
        match self.load(now)? {
            LoadOutcome::Active(handle) => Ok(handle),
            LoadOutcome::Expired(handle) => Err(SessionError::Expired(handle.expires_at)),
            LoadOutcome::Empty => Err(SessionError::NoActiveSession),
        }
    }

    /// Persists `handle`, replacing any previous one.
    pub fn establish(&self, handle: &SessionHandle) -> Result<(), SessionError> {
        let record: HandleRecord = handle.record();
        self.store.write_handle(&record)?;
        match &handle.keyword {
            Some(keyword) => self.store.write_keyword(keyword)?,
            None => self.store.clear_keyword()?,
        }
        info!(role = %handle.role, principal = %handle.principal, "session handle stored");
        Ok(())
    }

    /// Binds the active handle to `keyword` and returns the updated handle.
    ///
    /// # Errors
    /// Fails like [`current`](Self::current) if there is no active handle.
    pub fn set_keyword(
        &self,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionHandle, SessionError> {
        let mut handle = self.current(now)?;
        self.store.write_keyword(keyword)?;
        handle.keyword = Some(keyword.to_string());
        info!(%keyword, "session keyword stored");
        Ok(handle)
    }

    /// Forgets the keyword but keeps the login. Used when an instructor
    /// ends a session and stays signed in.
    pub fn clear_keyword(&self) -> Result<(), SessionError> {
        self.store.clear_keyword()
    }

    /// Removes every stored file. Missing files are not an error.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.store.clear_handle()?;
        self.store.clear_keyword()?;
        debug!("local session state cleared");
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

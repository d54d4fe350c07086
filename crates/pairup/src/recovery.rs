//! Start-up recovery: decide which screen a client opens on.

use chrono::{DateTime, Utc};
use pairup_api::ApiClient;
use pairup_protocol::ClientRole;
use pairup_session::{LoadOutcome, SessionHandle, SessionManager};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::PairupError;

/// Where a client resumes after start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovered {
    /// Nothing usable on disk; show the entry screen.
    Fresh,
    /// A signed-in instructor, possibly with a session keyword.
    Instructor(SessionHandle),
    /// A joined student.
    Student(SessionHandle),
}

/// Reads the stored handle and classifies it.
///
/// An expired instructor handle that still names a session gets a
/// best-effort end call first. Expired state is then cleared and the
/// client starts fresh whatever the network said.
///
/// # Errors
/// Only when the state directory itself cannot be read.
pub async fn recover(config: &ClientConfig, now: DateTime<Utc>) -> Result<Recovered, PairupError> {
    let sessions = SessionManager::new(config.session.clone());

    let handle = match sessions.load(now)? {
        LoadOutcome::Empty => return Ok(Recovered::Fresh),
        LoadOutcome::Active(handle) => {
            return Ok(match handle.role {
                ClientRole::Instructor => Recovered::Instructor(handle),
                ClientRole::Student => Recovered::Student(handle),
            });
        }
        LoadOutcome::Expired(handle) => handle,
    };

    end_expired(config, &handle).await;
    if let Err(e) = sessions.clear() {
        warn!(error = %e, "failed to clear expired session");
    }
    info!(role = %handle.role, "expired session discarded");
    Ok(Recovered::Fresh)
}

async fn end_expired(config: &ClientConfig, handle: &SessionHandle) {
    let (ClientRole::Instructor, Some(keyword), Some(token)) =
        (handle.role, &handle.keyword, &handle.auth_token)
    else {
        return;
    };

    let api = match ApiClient::new(&config.api_url) {
        Ok(api) => api.with_token(token.clone()),
        Err(e) => {
            warn!(error = %e, "cannot build client to end expired session");
            return;
        }
    };
    match api.end_session(keyword).await {
        Ok(()) => info!(%keyword, "ended expired session"),
        Err(e) => warn!(%keyword, error = %e, "could not end expired session"),
    }
}

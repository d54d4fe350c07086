//! The student client: join a session, then follow the projection.

use chrono::Utc;
use pairup_api::{ApiClient, normalize_keyword, normalize_student_name};
use pairup_protocol::{ClientEvent, ClientRole, ParticipantId};
use pairup_session::{SessionError, SessionHandle, SessionManager};
use pairup_transport::{Connector, WebSocketConnector};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter::{AdapterHandle, ConnectionStatus, Subscription, spawn_adapter};
use crate::config::ClientConfig;
use crate::error::PairupError;
use crate::projection::{ExitReason, Reaction, StudentProjection, StudentView};

/// What the student screen shows, plus whether the session is over.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentState {
    pub view: StudentView,
    /// Set once the instructor removed this student or ended the session.
    #[serde(skip)]
    pub exit: Option<ExitReason>,
}

/// A joined student.
///
/// The projection runs on its own task and publishes every change through
/// [`watch`](Self::watch). When the session ends or the student is
/// removed, local state is cleared and the realtime link is shut down
/// without calling the leave endpoint.
pub struct StudentClient {
    api: ApiClient,
    sessions: SessionManager,
    handle: SessionHandle,
    adapter: AdapterHandle,
    state: watch::Receiver<StudentState>,
    projector: JoinHandle<()>,
}

impl StudentClient {
    /// Joins `keyword` as `name` over the configured WebSocket endpoint.
    pub async fn connect(
        config: &ClientConfig,
        keyword: &str,
        name: &str,
    ) -> Result<Self, PairupError> {
        let connector = WebSocketConnector::new(config.realtime_url()?);
        Self::join(config, connector, keyword, name).await
    }

    /// Joins `keyword` as `name`, stores the handle, then opens the
    /// realtime link through `connector`.
    ///
    /// # Errors
    /// Validation failures are returned before anything is sent.
    pub async fn join<C: Connector>(
        config: &ClientConfig,
        connector: C,
        keyword: &str,
        name: &str,
    ) -> Result<Self, PairupError> {
        let keyword = normalize_keyword(keyword)?;
        let name = normalize_student_name(name)?;
        let config = config.clone().validated();

        let api = ApiClient::new(&config.api_url)?;
        let sessions = SessionManager::new(config.session.clone());

        let student = api.add_student(&keyword, &name).await?;
        let handle = sessions.issue_student(&keyword, &student.name, student.id, Utc::now());
        sessions.establish(&handle)?;
        info!(%keyword, participant = %student.id, "joined session");

        Ok(Self::attach(&config, connector, api, sessions, handle))
    }

    /// Reopens the realtime link for a stored student handle. Nothing is
    /// re-registered with the service.
    ///
    /// # Errors
    /// [`SessionError::NoActiveSession`] if `handle` is not a student
    /// handle bound to a keyword.
    pub fn resume<C: Connector>(
        config: &ClientConfig,
        connector: C,
        handle: SessionHandle,
    ) -> Result<Self, PairupError> {
        if handle.role != ClientRole::Student || handle.keyword.is_none() {
            return Err(SessionError::NoActiveSession.into());
        }
        let config = config.clone().validated();
        let api = ApiClient::new(&config.api_url)?;
        let sessions = SessionManager::new(config.session.clone());
        info!(keyword = ?handle.keyword, principal = %handle.principal, "resuming student session");

        Ok(Self::attach(&config, connector, api, sessions, handle))
    }

    fn attach<C: Connector>(
        config: &ClientConfig,
        connector: C,
        api: ApiClient,
        sessions: SessionManager,
        handle: SessionHandle,
    ) -> Self {
        let handshake = ClientEvent::JoinSession {
            keyword: handle.keyword.clone().unwrap_or_default(),
            username: handle.principal.clone(),
        };
        let adapter = spawn_adapter(connector, handshake, config.adapter.clone());
        let subscription = adapter.subscribe();
        let (state_tx, state) = watch::channel(StudentState::default());

        let projector = tokio::spawn(project(
            subscription,
            state_tx,
            adapter.clone(),
            sessions.clone(),
        ));

        Self {
            api,
            sessions,
            handle,
            adapter,
            state,
            projector,
        }
    }

    pub fn keyword(&self) -> &str {
        self.handle.keyword.as_deref().unwrap_or_default()
    }

    pub fn username(&self) -> &str {
        &self.handle.principal
    }

    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.handle.participant_id
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// The current screen.
    pub fn state(&self) -> StudentState {
        self.state.borrow().clone()
    }

    /// A receiver notified on every projected change.
    pub fn watch(&self) -> watch::Receiver<StudentState> {
        self.state.clone()
    }

    pub fn connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.adapter.watch_status()
    }

    /// Leaves the session on purpose.
    ///
    /// The leave call is best effort: local state is cleared and the link
    /// closed whatever the service answers.
    pub async fn leave(self) -> Result<(), PairupError> {
        if self.state.borrow().exit.is_none() {
            if let Err(e) = self
                .api
                .leave_session(self.keyword(), &self.handle.principal)
                .await
            {
                warn!(keyword = self.keyword(), error = %e, "leave call failed");
            }
        }
        self.adapter.shutdown().await;
        self.projector.abort();
        self.sessions.clear()?;
        info!(keyword = self.keyword(), "left session");
        Ok(())
    }
}

async fn project(
    mut events: Subscription,
    state: watch::Sender<StudentState>,
    adapter: AdapterHandle,
    sessions: SessionManager,
) {
    let mut projection = StudentProjection::new();

    while let Some(event) = events.recv().await {
        debug!(event = event.name(), "projecting");
        match projection.apply(&event) {
            Reaction::Continue => {
                let view = projection.view().clone();
                state.send_if_modified(|current| {
                    if current.view == view {
                        false
                    } else {
                        current.view = view;
                        true
                    }
                });
            }
            Reaction::Exit(reason) => {
                info!(?reason, "session closed for this student");
                if let Err(e) = sessions.clear() {
                    warn!(error = %e, "failed to clear local session");
                }
                state.send_modify(|current| current.exit = Some(reason));
                drop(events);
                adapter.shutdown().await;
                return;
            }
        }
    }
    debug!("student event stream ended");
}

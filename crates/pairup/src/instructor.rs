//! The instructor client: sign in, open a session, drive the console.

use chrono::Utc;
use pairup_api::ApiClient;
use pairup_protocol::{ClientEvent, ClientRole, ServerEvent, Topic};
use pairup_room::{ConsoleHandle, spawn_console};
use pairup_session::{SessionError, SessionHandle, SessionManager};
use pairup_transport::{Connector, WebSocketConnector};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::adapter::{AdapterHandle, ConnectionStatus, Subscription, spawn_adapter};
use crate::config::ClientConfig;
use crate::error::PairupError;

/// A signed-in instructor, with or without an open session.
pub struct InstructorClient {
    config: ClientConfig,
    api: ApiClient,
    sessions: SessionManager,
    handle: SessionHandle,
}

impl InstructorClient {
    /// Signs in with existing credentials and stores the handle.
    pub async fn login(
        config: &ClientConfig,
        email: &str,
        password: &str,
    ) -> Result<Self, PairupError> {
        Self::sign_in(config, email, password, false).await
    }

    /// Registers a new instructor account and stores the handle.
    pub async fn register(
        config: &ClientConfig,
        email: &str,
        password: &str,
    ) -> Result<Self, PairupError> {
        Self::sign_in(config, email, password, true).await
    }

    async fn sign_in(
        config: &ClientConfig,
        email: &str,
        password: &str,
        register: bool,
    ) -> Result<Self, PairupError> {
        let config = config.clone().validated();
        let api = ApiClient::new(&config.api_url)?;
        let token = if register {
            api.register(email, password).await?
        } else {
            api.login(email, password).await?
        };

        let sessions = SessionManager::new(config.session.clone());
        let handle = sessions.issue_instructor(email.trim(), &token, Utc::now());
        sessions.establish(&handle)?;

        Ok(Self {
            api: api.with_token(token),
            config,
            sessions,
            handle,
        })
    }

    /// Rebuilds a client from a stored instructor handle.
    ///
    /// # Errors
    /// [`SessionError::NoActiveSession`] if `handle` is not an instructor
    /// handle carrying a token.
    pub fn from_handle(config: &ClientConfig, handle: SessionHandle) -> Result<Self, PairupError> {
        let Some(token) = handle.auth_token.clone() else {
            return Err(SessionError::NoActiveSession.into());
        };
        if handle.role != ClientRole::Instructor {
            return Err(SessionError::NoActiveSession.into());
        }
        let config = config.clone().validated();
        let api = ApiClient::new(&config.api_url)?.with_token(token);
        let sessions = SessionManager::new(config.session.clone());
        info!(email = %handle.principal, keyword = ?handle.keyword, "resuming instructor");

        Ok(Self {
            config,
            api,
            sessions,
            handle,
        })
    }

    pub fn email(&self) -> &str {
        &self.handle.principal
    }

    /// The keyword of the session this instructor owns, if any.
    pub fn keyword(&self) -> Option<&str> {
        self.handle.keyword.as_deref()
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Prompt categories for the start menu. Never fails.
    pub async fn topics(&self) -> Vec<Topic> {
        self.api.topics().await
    }

    /// Opens (or reopens) this instructor's session over the configured
    /// WebSocket endpoint.
    pub async fn open_session(&mut self) -> Result<InstructorSession, PairupError> {
        let connector = WebSocketConnector::new(self.config.realtime_url()?);
        self.open_session_with(connector).await
    }

    /// Reuses the stored keyword or creates a session, then starts the
    /// realtime link and the console.
    pub async fn open_session_with<C: Connector>(
        &mut self,
        connector: C,
    ) -> Result<InstructorSession, PairupError> {
        let keyword = match self.handle.keyword.clone() {
            Some(keyword) => {
                info!(%keyword, "reopening session");
                keyword
            }
            None => {
                let keyword = self.api.create_session().await?;
                self.handle = self.sessions.set_keyword(&keyword, Utc::now())?;
                keyword
            }
        };

        let handshake = ClientEvent::JoinInstructorRoom {
            keyword: keyword.clone(),
        };
        let adapter = spawn_adapter(connector, handshake, self.config.adapter.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_roster(adapter.subscribe(), events_tx));

        let console = spawn_console(
            keyword.clone(),
            self.config.round.clone(),
            self.api.clone(),
            adapter.clone(),
            events_rx,
        );

        Ok(InstructorSession {
            keyword,
            console,
            adapter,
            forwarder,
        })
    }

    /// Ends `session` on the service, notifies students and forgets the
    /// keyword. The login is kept.
    ///
    /// # Errors
    /// If the service refuses, the session keeps running and nothing local
    /// is cleared.
    pub async fn end_session(&mut self, session: &InstructorSession) -> Result<(), PairupError> {
        session.console.end_session().await?;
        session.close().await;
        self.sessions.clear_keyword()?;
        self.handle.keyword = None;
        info!(keyword = %session.keyword, "session ended");
        Ok(())
    }

    /// Forgets the stored login. Nothing is sent to the service.
    pub fn logout(self) -> Result<(), PairupError> {
        self.sessions.clear()?;
        info!(email = %self.handle.principal, "signed out");
        Ok(())
    }
}

/// A running session: the console actor plus its realtime link.
pub struct InstructorSession {
    keyword: String,
    console: ConsoleHandle,
    adapter: AdapterHandle,
    forwarder: JoinHandle<()>,
}

impl InstructorSession {
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Commands and snapshots.
    pub fn console(&self) -> &ConsoleHandle {
        &self.console
    }

    pub fn connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.adapter.watch_status()
    }

    /// Closes the realtime link without ending the session, so it can be
    /// reopened later from the stored keyword.
    pub async fn close(&self) {
        self.adapter.shutdown().await;
        self.forwarder.abort();
    }
}

/// Feeds roster events from the realtime link into the console.
async fn forward_roster(mut events: Subscription, console: mpsc::UnboundedSender<ServerEvent>) {
    while let Some(event) = events.recv().await {
        if !event.is_instructor_only() {
            debug!(event = event.name(), "ignoring student event on instructor link");
            continue;
        }
        if console.send(event).is_err() {
            debug!("console stopped, roster forwarding ends");
            return;
        }
    }
}

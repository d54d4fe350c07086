//! Realtime adapter: one persistent connection per client, re-joined after
//! every reconnect.
//!
//! The adapter runs as its own Tokio task and owns the connection, the
//! outbound queue and the handler registry:
//!
//! ```text
//!   AdapterHandle ──commands (unbounded mpsc)──▶ AdapterActor ◀──▶ Connection
//!   Subscription  ◀──events (unbounded mpsc)────┘     │
//!                                                     ▼
//!                                     watch<ConnectionStatus>
//! ```
//!
//! Every (re)connect sends the join handshake first, then flushes whatever
//! was queued while offline. Missed events are not replayed.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pairup_protocol::{ClientEvent, Codec, JsonCodec, Recipient, ServerEvent};
use pairup_room::{Broadcaster, RoundError};
use pairup_transport::{Connection, Connector, TransportError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;
use tracing::{debug, info, warn};

/// Outbound events kept while offline; the oldest is dropped beyond this.
const MAX_QUEUED: usize = 256;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Reconnect and handshake timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Delay after the first failed dial. Default: 1 second.
    pub initial_backoff: Duration,

    /// Upper bound for the doubling backoff. Default: 5 seconds.
    pub max_backoff: Duration,

    /// Extra random delay, as a fraction of the backoff. Default: 0.5.
    pub jitter: f64,

    /// Limit for dialing and for sending the join handshake.
    /// Default: 5 seconds.
    pub join_timeout: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            jitter: 0.5,
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl AdapterConfig {
    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`spawn_adapter`].
    pub fn validated(mut self) -> Self {
        if self.initial_backoff.is_zero() {
            warn!("initial_backoff is zero, using 1s");
            self.initial_backoff = Duration::from_secs(1);
        }
        if self.max_backoff < self.initial_backoff {
            warn!("max_backoff below initial_backoff, clamping");
            self.max_backoff = self.initial_backoff;
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            warn!(jitter = self.jitter, "jitter outside 0..=1, clamping");
            self.jitter = if self.jitter.is_nan() {
                0.0
            } else {
                self.jitter.clamp(0.0, 1.0)
            };
        }
        if self.join_timeout.is_zero() {
            warn!("join_timeout is zero, using 5s");
            self.join_timeout = Duration::from_secs(5);
        }
        self
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    fn jittered_backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let extra = rand::rng().random_range(0.0..=self.jitter);
        base.mul_f64(1.0 + extra)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Observable state of the realtime link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Dialing for the first time.
    Connecting,
    /// Connected and joined.
    Online,
    /// Lost the connection; retrying.
    Offline,
    /// Shut down. Terminal.
    Closed,
}

// ---------------------------------------------------------------------------
// Handle and subscriptions
// ---------------------------------------------------------------------------

enum AdapterCommand {
    Send(ClientEvent),
    Register {
        id: u64,
        events: mpsc::UnboundedSender<ServerEvent>,
    },
    Deregister {
        id: u64,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running adapter. Cheap to clone.
#[derive(Clone)]
pub struct AdapterHandle {
    commands: mpsc::UnboundedSender<AdapterCommand>,
    status: watch::Receiver<ConnectionStatus>,
    next_id: Arc<AtomicU64>,
}

impl AdapterHandle {
    /// Queues an event for the server. Never blocks; while offline the
    /// event waits for the next handshake.
    pub fn send(&self, event: ClientEvent) -> Result<(), TransportError> {
        self.commands
            .send(AdapterCommand::Send(event))
            .map_err(|_| TransportError::Shutdown)
    }

    /// Asks the server to fan `event` out to `to` within the session.
    pub fn relay(&self, to: Recipient, event: ServerEvent) -> Result<(), TransportError> {
        self.send(ClientEvent::Relay {
            to,
            payload: Box::new(event),
        })
    }

    /// Registers a handler. Every decoded server event is delivered to it
    /// until the returned [`Subscription`] is dropped or the adapter shuts
    /// down.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if self
            .commands
            .send(AdapterCommand::Register { id, events: tx })
            .is_err()
        {
            debug!(subscription = id, "adapter already stopped");
        }
        Subscription {
            id,
            events: rx,
            commands: self.commands.clone(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A receiver notified on every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Deregisters every handler, then closes the connection. Resolves once
    /// the adapter has stopped.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(AdapterCommand::Shutdown { reply }).is_ok() {
            let _ = done.await;
        }
    }
}

impl Broadcaster for AdapterHandle {
    fn broadcast(&self, to: Recipient, event: ServerEvent) -> Result<(), RoundError> {
        self.relay(to, event)
            .map_err(|e| RoundError::Broadcast(e.to_string()))
    }
}

/// A registered event handler. Dropping it deregisters the handler.
pub struct Subscription {
    id: u64,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    commands: mpsc::UnboundedSender<AdapterCommand>,
}

impl Subscription {
    /// The next server event, or `None` once the adapter has shut down.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self
            .commands
            .send(AdapterCommand::Deregister { id: self.id });
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Continue,
    Stop,
}

/// Everything except the connector, so the connector can be borrowed by a
/// pending dial while commands are handled.
struct AdapterCore {
    config: AdapterConfig,
    handshake: ClientEvent,
    codec: JsonCodec,
    commands: mpsc::UnboundedReceiver<AdapterCommand>,
    handlers: BTreeMap<u64, mpsc::UnboundedSender<ServerEvent>>,
    outbox: VecDeque<ClientEvent>,
    status: watch::Sender<ConnectionStatus>,
    shutdown_reply: Option<oneshot::Sender<()>>,
}

struct AdapterActor<C> {
    connector: C,
    core: AdapterCore,
}

impl AdapterCore {
    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                debug!(from = ?*current, to = ?status, "connection status");
                *current = status;
                true
            }
        });
    }

    fn enqueue(&mut self, event: ClientEvent) {
        if self.outbox.len() >= MAX_QUEUED {
            warn!(queued = self.outbox.len(), "outbound queue full, dropping oldest");
            self.outbox.pop_front();
        }
        self.outbox.push_back(event);
    }

    /// Handles one command while no connection is up.
    fn on_command(&mut self, cmd: Option<AdapterCommand>) -> Control {
        match cmd {
            Some(AdapterCommand::Send(event)) => self.enqueue(event),
            Some(AdapterCommand::Register { id, events }) => {
                debug!(subscription = id, "handler registered");
                self.handlers.insert(id, events);
            }
            Some(AdapterCommand::Deregister { id }) => {
                if self.handlers.remove(&id).is_some() {
                    debug!(subscription = id, "handler deregistered");
                }
            }
            Some(AdapterCommand::Shutdown { reply }) => {
                self.shutdown_reply = Some(reply);
                return Control::Stop;
            }
            None => return Control::Stop,
        }
        Control::Continue
    }

    fn on_frame(&mut self, data: &[u8]) {
        let event: ServerEvent = match self.codec.decode(data) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, len = data.len(), "skipping undecodable frame");
                return;
            }
        };
        debug!(event = event.name(), "event received");
        self.handlers
            .retain(|_, handler| handler.send(event.clone()).is_ok());
    }

    async fn write(&self, conn: &impl Connection, event: &ClientEvent) -> Result<(), TransportError> {
        match self.codec.encode(event) {
            Ok(bytes) => conn.send(&bytes).await,
            Err(e) => {
                warn!(error = %e, "dropping unencodable event");
                Ok(())
            }
        }
    }

    fn finish(&mut self) {
        // Handlers go first so nothing reaches a torn-down consumer.
        self.handlers.clear();
        if !self.outbox.is_empty() {
            debug!(dropped = self.outbox.len(), "discarding queued events");
            self.outbox.clear();
        }
        self.set_status(ConnectionStatus::Closed);
        if let Some(reply) = self.shutdown_reply.take() {
            let _ = reply.send(());
        }
    }
}

impl<C: Connector> AdapterActor<C> {
    async fn run(mut self) {
        // Consecutive attempts that never produced a healthy link.
        let mut attempt: u32 = 0;

        loop {
            let Some(dialed) = self.dial().await else { break };
            let conn = match dialed {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(attempt, error = %e, "connect failed");
                    if self.back_off(&mut attempt).await == Control::Stop {
                        break;
                    }
                    continue;
                }
            };

            let joined = time::timeout(
                self.core.config.join_timeout,
                self.core.write(&conn, &self.core.handshake),
            )
            .await;
            let failure = match joined {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some("timed out".to_string()),
            };
            if let Some(error) = failure {
                warn!(conn = %conn.id(), attempt, %error, "join handshake failed");
                let _ = conn.close().await;
                self.core.set_status(ConnectionStatus::Offline);
                if self.back_off(&mut attempt).await == Control::Stop {
                    break;
                }
                continue;
            }

            info!(conn = %conn.id(), "realtime link joined");
            self.core.set_status(ConnectionStatus::Online);
            let joined_at = time::Instant::now();

            if self.serve(&conn).await == Control::Stop {
                let _ = conn.close().await;
                break;
            }
            self.core.set_status(ConnectionStatus::Offline);

            // A link that drops before initial_backoff never counted as up.
            if joined_at.elapsed() >= self.core.config.initial_backoff {
                info!(conn = %conn.id(), "realtime link lost, reconnecting");
                attempt = 0;
                continue;
            }
            warn!(conn = %conn.id(), attempt, "realtime link dropped right after joining");
            if self.back_off(&mut attempt).await == Control::Stop {
                break;
            }
        }

        self.core.finish();
        info!("realtime adapter stopped");
    }

    /// Waits out the backoff for `attempt` and counts it.
    async fn back_off(&mut self, attempt: &mut u32) -> Control {
        let delay = self.core.config.jittered_backoff(*attempt);
        debug!(attempt = *attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
        *attempt = attempt.saturating_add(1);
        self.wait(delay).await
    }

    /// Dials once while still serving commands. `None` means stop.
    async fn dial(&mut self) -> Option<Result<C::Connection, TransportError>> {
        let connect = time::timeout(self.core.config.join_timeout, self.connector.connect());
        tokio::pin!(connect);
        loop {
            tokio::select! {
                result = &mut connect => {
                    return Some(result.unwrap_or_else(|_| {
                        Err(TransportError::ConnectionClosed("connect timed out".into()))
                    }));
                }
                cmd = self.core.commands.recv() => {
                    if self.core.on_command(cmd) == Control::Stop {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleeps out a backoff while still serving commands.
    async fn wait(&mut self, delay: Duration) -> Control {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Control::Continue,
                cmd = self.core.commands.recv() => {
                    if self.core.on_command(cmd) == Control::Stop {
                        return Control::Stop;
                    }
                }
            }
        }
    }

    /// Runs one joined connection until it drops or the adapter stops.
    async fn serve(&mut self, conn: &C::Connection) -> Control {
        while let Some(event) = self.core.outbox.pop_front() {
            if let Err(e) = self.core.write(conn, &event).await {
                warn!(error = %e, "flush failed, keeping event queued");
                self.core.outbox.push_front(event);
                return Control::Continue;
            }
        }

        loop {
            tokio::select! {
                // A handler registered before a frame arrives must see it.
                biased;

                cmd = self.core.commands.recv() => match cmd {
                    Some(AdapterCommand::Send(event)) => {
                        if let Err(e) = self.core.write(conn, &event).await {
                            warn!(error = %e, "send failed, queueing for reconnect");
                            self.core.enqueue(event);
                            return Control::Continue;
                        }
                    }
                    other => {
                        if self.core.on_command(other) == Control::Stop {
                            self.core.handlers.clear();
                            return Control::Stop;
                        }
                    }
                },
                frame = conn.recv() => match frame {
                    Ok(Some(data)) => self.core.on_frame(&data),
                    Ok(None) => {
                        debug!(conn = %conn.id(), "closed by server");
                        return Control::Continue;
                    }
                    Err(e) => {
                        warn!(conn = %conn.id(), error = %e, "receive failed");
                        return Control::Continue;
                    }
                },
            }
        }
    }
}

/// Spawns an adapter that dials through `connector` and joins with
/// `handshake` on every connect.
pub fn spawn_adapter<C: Connector>(
    connector: C,
    handshake: ClientEvent,
    config: AdapterConfig,
) -> AdapterHandle {
    if !handshake.is_handshake() {
        warn!("adapter handshake is not a join event");
    }
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);

    let actor = AdapterActor {
        connector,
        core: AdapterCore {
            config: config.validated(),
            handshake,
            codec: JsonCodec,
            commands: rx,
            handlers: BTreeMap::new(),
            outbox: VecDeque::new(),
            status: status_tx,
            shutdown_reply: None,
        },
    };
    tokio::spawn(actor.run());

    AdapterHandle {
        commands: tx,
        status: status_rx,
        next_id: Arc::new(AtomicU64::new(1)),
    }
}

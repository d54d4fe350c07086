//! Instructor console actor: the one owner of phase, timer, roster and
//! pairing for a session.
//!
//! The console runs in its own task and talks to the outside world through
//! channels only:
//!
//! ```text
//!  ConsoleHandle ──commands (mpsc + oneshot reply)──┐
//!  realtime adapter ──roster events (mpsc)──────────┤
//!                                                   ▼
//!                                            ConsoleActor ──▶ ClassroomService
//!                                                   │     ──▶ Broadcaster
//!                                                   ▼
//!                                  watch<ConsoleSnapshot> ──▶ views
//! ```
//!
//! Every transition calls the service first and only mutates state once the
//! call succeeded, so a failure leaves the console in its last stable phase.

use std::collections::HashSet;

use pairup_protocol::{Participant, ParticipantId, Recipient, ServerEvent};
use pairup_tick::{TickConfig, TickOutcome, TickScheduler, TimerState};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use crate::roster::normalize_name;
use crate::{
    Broadcaster, ClassroomService, Roster, RoundConfig, RoundError, RoundPairingSet,
    SessionPhase, Transition, Trigger,
};

/// Bound on queued commands; senders wait when it is full.
const COMMAND_CHANNEL_SIZE: usize = 32;

/// Reason given to a student removed by the instructor.
pub const REMOVED_REASON: &str = "removed from the session";

/// Everything a console view needs to render, published after every change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsoleSnapshot {
    pub keyword: String,
    pub phase: SessionPhase,
    pub timer: TimerState,
    /// Ordered by join time.
    pub roster: Vec<Participant>,
    /// Number of the most recently started round, 0 before the first.
    pub round_number: u32,
    pub pairing: Option<RoundPairingSet>,
    pub selected_topic: Option<String>,
    pub participating: bool,
    pub last_error: Option<String>,
    /// The session was ended; the console no longer accepts commands.
    pub ended: bool,
}

type Reply<T> = oneshot::Sender<Result<T, RoundError>>;

/// Commands sent to the console actor through its channel.
pub(crate) enum ConsoleCommand {
    Start {
        prompt_filter: Option<String>,
        reply: Reply<()>,
    },
    /// BeginDiscussion, NextRound or ResetRound.
    Advance { trigger: Trigger, reply: Reply<()> },
    Pause { reply: Reply<()> },
    Resume { reply: Reply<()> },
    AddStudent { name: String, reply: Reply<Participant> },
    RemoveStudent { id: ParticipantId, reply: Reply<()> },
    RefreshRoster { reply: Reply<()> },
    SetParticipating { participating: bool, reply: Reply<()> },
    EndSession { reply: Reply<()> },
}

/// Handle to a running console actor.
///
/// Cheap to clone: an `mpsc::Sender` and a `watch::Receiver`.
#[derive(Clone)]
pub struct ConsoleHandle {
    sender: mpsc::Sender<ConsoleCommand>,
    snapshot: watch::Receiver<ConsoleSnapshot>,
}

impl ConsoleHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> ConsoleCommand,
    ) -> Result<T, RoundError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoundError::Unavailable)?;
        reply_rx.await.map_err(|_| RoundError::Unavailable)?
    }

    /// Idle → Pairing: fetch pairings and send each student their slot.
    pub async fn start(&self, prompt_filter: Option<String>) -> Result<(), RoundError> {
        self.request(|reply| ConsoleCommand::Start {
            prompt_filter,
            reply,
        })
        .await
    }

    /// Pairing → Discussing.
    pub async fn begin_discussion(&self) -> Result<(), RoundError> {
        self.advance(Trigger::BeginDiscussion).await
    }

    /// Discussing → Idle.
    pub async fn next_round(&self) -> Result<(), RoundError> {
        self.advance(Trigger::NextRound).await
    }

    /// Pairing or Discussing → Idle.
    pub async fn reset_round(&self) -> Result<(), RoundError> {
        self.advance(Trigger::ResetRound).await
    }

    async fn advance(&self, trigger: Trigger) -> Result<(), RoundError> {
        self.request(|reply| ConsoleCommand::Advance { trigger, reply })
            .await
    }

    /// Freezes the countdown. The phase never changes.
    pub async fn pause(&self) -> Result<(), RoundError> {
        self.request(|reply| ConsoleCommand::Pause { reply }).await
    }

    /// Unfreezes the countdown. No-op outside an active round.
    pub async fn resume(&self) -> Result<(), RoundError> {
        self.request(|reply| ConsoleCommand::Resume { reply }).await
    }

    pub async fn add_student(&self, name: impl Into<String>) -> Result<Participant, RoundError> {
        let name = name.into();
        self.request(|reply| ConsoleCommand::AddStudent { name, reply })
            .await
    }

    pub async fn remove_student(&self, id: ParticipantId) -> Result<(), RoundError> {
        self.request(|reply| ConsoleCommand::RemoveStudent { id, reply })
            .await
    }

    /// Reloads the roster from the service.
    pub async fn refresh_roster(&self) -> Result<(), RoundError> {
        self.request(|reply| ConsoleCommand::RefreshRoster { reply })
            .await
    }

    pub async fn set_participating(&self, participating: bool) -> Result<(), RoundError> {
        self.request(|reply| ConsoleCommand::SetParticipating {
            participating,
            reply,
        })
        .await
    }

    /// Ends the session. On success the actor stops; on failure it keeps
    /// running in its current phase.
    pub async fn end_session(&self) -> Result<(), RoundError> {
        self.request(|reply| ConsoleCommand::EndSession { reply })
            .await
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> ConsoleSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that is notified after every change.
    pub fn subscribe(&self) -> watch::Receiver<ConsoleSnapshot> {
        self.snapshot.clone()
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// The internal console state. Runs inside a Tokio task.
struct ConsoleActor<S, B> {
    keyword: String,
    config: RoundConfig,
    service: S,
    broadcaster: B,
    phase: SessionPhase,
    timer: TimerState,
    scheduler: TickScheduler,
    roster: Roster,
    pairing: Option<RoundPairingSet>,
    round_number: u32,
    selected_topic: Option<String>,
    participating: bool,
    last_error: Option<String>,
    ended: bool,
    /// Automatic transition waiting out `expiry_delay`, tagged with the
    /// phase it was armed in.
    pending_expiry: Option<(Instant, SessionPhase)>,
    commands: mpsc::Receiver<ConsoleCommand>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    snapshot: watch::Sender<ConsoleSnapshot>,
}

async fn expiry_due(pending: Option<(Instant, SessionPhase)>) -> SessionPhase {
    match pending {
        Some((at, phase)) => {
            time::sleep_until(at).await;
            phase
        }
        None => std::future::pending().await,
    }
}

impl<S: ClassroomService, B: Broadcaster> ConsoleActor<S, B> {
    async fn run(mut self) {
        info!(keyword = %self.keyword, "console started");

        if let Err(e) = self.refresh_roster().await {
            warn!(keyword = %self.keyword, error = %e, "initial roster load failed");
            self.last_error = Some(e.to_string());
        }
        self.publish();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd).await == Flow::Exit {
                        break;
                    }
                }
                Some(event) = self.events.recv() => self.on_event(event),
                _ = self.scheduler.wait_for_tick() => self.on_tick(),
                phase = expiry_due(self.pending_expiry) => self.on_expiry(phase).await,
            }
        }

        info!(keyword = %self.keyword, "console stopped");
    }

    async fn handle(&mut self, cmd: ConsoleCommand) -> Flow {
        match cmd {
            ConsoleCommand::Start {
                prompt_filter,
                reply,
            } => {
                let result = self.start(prompt_filter).await;
                self.finish(reply, result);
            }
            ConsoleCommand::Advance { trigger, reply } => {
                let result = self.advance(trigger).await;
                self.finish(reply, result);
            }
            ConsoleCommand::Pause { reply } => {
                self.pause();
                self.finish(reply, Ok(()));
            }
            ConsoleCommand::Resume { reply } => {
                self.resume();
                self.finish(reply, Ok(()));
            }
            ConsoleCommand::AddStudent { name, reply } => {
                let result = self.add_student(&name).await;
                self.finish(reply, result);
            }
            ConsoleCommand::RemoveStudent { id, reply } => {
                let result = self.remove_student(id).await;
                self.finish(reply, result);
            }
            ConsoleCommand::RefreshRoster { reply } => {
                let result = self.refresh_roster().await;
                self.finish(reply, result);
            }
            ConsoleCommand::SetParticipating {
                participating,
                reply,
            } => {
                let result = self.set_participating(participating).await;
                self.finish(reply, result);
            }
            ConsoleCommand::EndSession { reply } => {
                let result = self.end_session().await;
                let ended = result.is_ok();
                self.finish(reply, result);
                if ended {
                    return Flow::Exit;
                }
            }
        }
        Flow::Continue
    }

    /// Records the outcome, publishes, then replies.
    fn finish<T>(&mut self, reply: Reply<T>, result: Result<T, RoundError>) {
        self.last_error = result.as_ref().err().map(ToString::to_string);
        self.publish();
        let _ = reply.send(result);
    }

    // -- Transitions ------------------------------------------------------

    fn rejected(&self, trigger: Trigger) -> RoundError {
        warn!(keyword = %self.keyword, phase = %self.phase, %trigger, "transition rejected");
        RoundError::InvalidTransition {
            from: self.phase,
            trigger,
        }
    }

    fn enter(&mut self, next: SessionPhase, trigger: Trigger) {
        info!(
            keyword = %self.keyword,
            from = %self.phase,
            to = %next,
            %trigger,
            "phase transition"
        );
        self.phase = next;
    }

    async fn start(&mut self, prompt_filter: Option<String>) -> Result<(), RoundError> {
        let Some(Transition::To(next)) = self.phase.apply(Trigger::Start) else {
            return Err(self.rejected(Trigger::Start));
        };
        if self.roster.len() < 2 {
            return Err(RoundError::Validation(
                "at least two students are needed to start a round".into(),
            ));
        }

        let roster = self.roster.participants();
        let entries = self
            .service
            .create_pairings(&self.keyword, prompt_filter.as_deref(), &roster)
            .await?;
        let set = RoundPairingSet::new(entries)?;
        if let Some(mismatch) = self.roster_mismatch(&set) {
            warn!(keyword = %self.keyword, %mismatch, "pairing disagrees with roster, refreshing");
            self.refresh_roster().await?;
            if let Some(mismatch) = self.roster_mismatch(&set) {
                return Err(RoundError::InvalidPairing(mismatch));
            }
        }

        for id in set.participant_ids() {
            if let Some(event) = set.assignment_event(id) {
                self.send(Recipient::Participant(id), event);
            }
        }
        info!(
            keyword = %self.keyword,
            round = set.round_number(),
            pairs = set.pair_count(),
            breaks = set.break_count(),
            "round paired"
        );

        self.pending_expiry = None;
        self.round_number = set.round_number();
        self.pairing = Some(set);
        self.selected_topic = prompt_filter;
        self.enter(next, Trigger::Start);
        self.timer.start(self.config.pairing_secs());
        self.scheduler.restart();
        Ok(())
    }

    /// Describes how `set` differs from the roster, if it does. Every
    /// student must be in exactly one entry.
    fn roster_mismatch(&self, set: &RoundPairingSet) -> Option<String> {
        let paired: HashSet<ParticipantId> = set.participant_ids().into_iter().collect();
        let enrolled: HashSet<ParticipantId> =
            self.roster.participants().iter().map(|p| p.id).collect();

        let mut missing: Vec<_> = enrolled.difference(&paired).map(|id| id.0).collect();
        let mut unknown: Vec<_> = paired.difference(&enrolled).map(|id| id.0).collect();
        if missing.is_empty() && unknown.is_empty() {
            return None;
        }
        missing.sort_unstable();
        unknown.sort_unstable();
        Some(format!("unpaired students {missing:?}, unknown students {unknown:?}"))
    }

    async fn advance(&mut self, trigger: Trigger) -> Result<(), RoundError> {
        match self.phase.apply(trigger) {
            Some(Transition::To(SessionPhase::Discussing)) => self.begin_discussion(trigger).await,
            Some(Transition::To(SessionPhase::Idle)) => self.reset_round(trigger).await,
            _ => Err(self.rejected(trigger)),
        }
    }

    async fn begin_discussion(&mut self, trigger: Trigger) -> Result<(), RoundError> {
        let Some(set) = self.pairing.as_ref() else {
            return Err(RoundError::InvalidPairing("no pairing for this round".into()));
        };
        self.service
            .begin_discussion(&self.keyword, set.entries())
            .await?;

        for id in set.participant_ids() {
            if let Some(event) = set.discussion_event(id) {
                self.send(Recipient::Participant(id), event);
            }
        }

        self.pending_expiry = None;
        self.enter(SessionPhase::Discussing, trigger);
        self.timer.start(self.config.talking_secs());
        self.scheduler.restart();
        Ok(())
    }

    async fn reset_round(&mut self, trigger: Trigger) -> Result<(), RoundError> {
        self.service.reset_round(&self.keyword).await?;

        self.send(Recipient::All, ServerEvent::RoundReset {});
        self.pending_expiry = None;
        self.pairing = None;
        self.enter(SessionPhase::Idle, trigger);
        self.timer.stop();
        self.scheduler.pause();
        Ok(())
    }

    async fn end_session(&mut self) -> Result<(), RoundError> {
        if self.phase.apply(Trigger::EndSession) != Some(Transition::Exit) {
            return Err(self.rejected(Trigger::EndSession));
        }
        self.service.end_session(&self.keyword).await?;

        self.send(Recipient::All, ServerEvent::SessionEnded {});
        self.pending_expiry = None;
        self.pairing = None;
        self.timer.stop();
        self.scheduler.pause();
        self.ended = true;
        info!(keyword = %self.keyword, phase = %self.phase, "session ended");
        Ok(())
    }

    // -- Timer ------------------------------------------------------------

    fn pause(&mut self) {
        if self.timer.pause() {
            self.scheduler.pause();
            info!(keyword = %self.keyword, remaining = self.timer.remaining_seconds, "timer paused");
        }
    }

    fn resume(&mut self) {
        if !self.phase.is_round_active() {
            debug!(keyword = %self.keyword, "resume ignored outside a round");
            return;
        }
        if self.timer.resume() {
            self.scheduler.resume();
            info!(keyword = %self.keyword, remaining = self.timer.remaining_seconds, "timer resumed");
        }
    }

    fn on_tick(&mut self) {
        match self.timer.tick() {
            TickOutcome::Idle => {
                self.scheduler.pause();
                return;
            }
            TickOutcome::Counting(remaining) => trace!(remaining, "timer tick"),
            TickOutcome::Expired => {
                self.scheduler.pause();
                self.pending_expiry = Some((Instant::now() + self.config.expiry_delay, self.phase));
                debug!(keyword = %self.keyword, phase = %self.phase, "timer reached zero");
            }
        }
        self.publish();
    }

    async fn on_expiry(&mut self, armed_in: SessionPhase) {
        self.pending_expiry = None;
        if armed_in != self.phase {
            debug!(armed_in = %armed_in, phase = %self.phase, "stale expiry dropped");
            return;
        }
        let result = self.advance(Trigger::TimerExpired).await;
        if let Err(e) = &result {
            warn!(keyword = %self.keyword, error = %e, "automatic transition failed");
        }
        self.last_error = result.err().map(|e| e.to_string());
        self.publish();
    }

    // -- Roster -----------------------------------------------------------

    fn on_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::StudentJoined { student } => {
                let id = student.id;
                let outcome = self.roster.apply_join(student);
                debug!(participant = %id, ?outcome, "student_joined applied");
                if self.roster.contains(id) {
                    self.resync(id);
                }
            }
            ServerEvent::StudentLeft { student } => {
                let removed = self.roster.apply_leave(student.id);
                debug!(participant = %student.id, removed, "student_left applied");
            }
            ServerEvent::InstructorJoined { message } => {
                info!(keyword = %self.keyword, %message, "joined instructor room");
                return;
            }
            other => {
                debug!(event = other.name(), "ignoring event not meant for the console");
                return;
            }
        }
        self.publish();
    }

    /// Re-sends the current round to a student who joined again mid-round.
    fn resync(&self, id: ParticipantId) {
        let Some(set) = &self.pairing else { return };
        if !set.contains(id) {
            return;
        }
        info!(participant = %id, phase = %self.phase, "re-sending round state");
        if let Some(event) = set.assignment_event(id) {
            self.send(Recipient::Participant(id), event);
        }
        if self.phase == SessionPhase::Discussing {
            if let Some(event) = set.discussion_event(id) {
                self.send(Recipient::Participant(id), event);
            }
        }
    }

    async fn add_student(&mut self, raw_name: &str) -> Result<Participant, RoundError> {
        let name = normalize_name(raw_name)?;
        if self.roster.contains_name(&name) {
            return Err(RoundError::Validation(format!(
                "a student named {name} is already in the session"
            )));
        }
        let participant = self.service.add_student(&self.keyword, &name).await?;
        self.roster.apply_join(participant.clone());
        info!(keyword = %self.keyword, participant = %participant.id, "student added");
        Ok(participant)
    }

    async fn remove_student(&mut self, id: ParticipantId) -> Result<(), RoundError> {
        self.service.remove_student(&self.keyword, id).await?;
        let was_present = self.roster.apply_leave(id);
        self.send(
            Recipient::Participant(id),
            ServerEvent::StudentRemoved {
                reason: REMOVED_REASON.into(),
            },
        );
        info!(keyword = %self.keyword, participant = %id, was_present, "student removed");
        Ok(())
    }

    async fn refresh_roster(&mut self) -> Result<(), RoundError> {
        let students = self.service.list_students(&self.keyword).await?;
        debug!(keyword = %self.keyword, count = students.len(), "roster loaded");
        self.roster.sync(students);
        Ok(())
    }

    async fn set_participating(&mut self, participating: bool) -> Result<(), RoundError> {
        self.service
            .set_participating(&self.keyword, participating)
            .await?;
        self.participating = participating;
        info!(keyword = %self.keyword, participating, "instructor participation changed");
        Ok(())
    }

    // -- Output -----------------------------------------------------------

    /// Sends one event to students. A refused send is logged; the transition
    /// that produced it has already been accepted by the service.
    fn send(&self, to: Recipient, event: ServerEvent) {
        let name = event.name();
        if let Err(e) = self.broadcaster.broadcast(to.clone(), event) {
            warn!(event = name, ?to, error = %e, "broadcast failed");
        } else {
            debug!(event = name, ?to, "event sent");
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(ConsoleSnapshot {
            keyword: self.keyword.clone(),
            phase: self.phase,
            timer: self.timer,
            roster: self.roster.participants(),
            round_number: self.round_number,
            pairing: self.pairing.clone(),
            selected_topic: self.selected_topic.clone(),
            participating: self.participating,
            last_error: self.last_error.clone(),
            ended: self.ended,
        });
    }
}

/// Spawns a console actor for `keyword` and returns a handle to it.
///
/// `events` carries the realtime roster notifications (`student_joined`,
/// `student_left`); they are applied through the same path as REST roster
/// changes.
pub fn spawn_console<S, B>(
    keyword: impl Into<String>,
    config: RoundConfig,
    service: S,
    broadcaster: B,
    events: mpsc::UnboundedReceiver<ServerEvent>,
) -> ConsoleHandle
where
    S: ClassroomService,
    B: Broadcaster,
{
    let keyword = keyword.into();
    let config = config.validated();
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (snapshot_tx, snapshot_rx) = watch::channel(ConsoleSnapshot {
        keyword: keyword.clone(),
        ..Default::default()
    });

    let actor = ConsoleActor {
        scheduler: TickScheduler::new(TickConfig::with_interval(config.tick_interval)),
        keyword,
        config,
        service,
        broadcaster,
        phase: SessionPhase::Idle,
        timer: TimerState::stopped(),
        roster: Roster::new(),
        pairing: None,
        round_number: 0,
        selected_topic: None,
        participating: false,
        last_error: None,
        ended: false,
        pending_expiry: None,
        commands: rx,
        events,
        snapshot: snapshot_tx,
    };

    tokio::spawn(actor.run());

    ConsoleHandle {
        sender: tx,
        snapshot: snapshot_rx,
    }
}

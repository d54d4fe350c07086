//! The two seams the console talks through.
//!
//! [`ClassroomService`] is the remote session service (roster, pairing,
//! round lifecycle). [`Broadcaster`] is the realtime channel that carries
//! events to students. The console is generic over both, so tests drive it
//! with in-memory fakes.

use std::future::Future;

use pairup_protocol::{PairingEntry, Participant, ParticipantId, Recipient, ServerEvent};

use crate::{RoundError, ServiceError};

/// Remote operations on one classroom session.
///
/// Futures are `Send` because the console awaits them inside its spawned
/// task.
pub trait ClassroomService: Send + Sync + 'static {
    fn list_students(
        &self,
        keyword: &str,
    ) -> impl Future<Output = Result<Vec<Participant>, ServiceError>> + Send;

    fn add_student(
        &self,
        keyword: &str,
        name: &str,
    ) -> impl Future<Output = Result<Participant, ServiceError>> + Send;

    /// Removing an id the service no longer knows must succeed.
    fn remove_student(
        &self,
        keyword: &str,
        id: ParticipantId,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Asks the pairing service for the next round.
    ///
    /// `roster` is the console's current view; implementations that pair
    /// server-side may ignore it.
    fn create_pairings(
        &self,
        keyword: &str,
        prompt_filter: Option<&str>,
        roster: &[Participant],
    ) -> impl Future<Output = Result<Vec<PairingEntry>, ServiceError>> + Send;

    fn begin_discussion(
        &self,
        keyword: &str,
        pairings: &[PairingEntry],
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn reset_round(&self, keyword: &str) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn end_session(&self, keyword: &str) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn set_participating(
        &self,
        keyword: &str,
        participating: bool,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}

/// Delivers events to students in the session.
///
/// Non-blocking: implementations queue the event and return.
pub trait Broadcaster: Send + Sync + 'static {
    fn broadcast(&self, to: Recipient, event: ServerEvent) -> Result<(), RoundError>;
}

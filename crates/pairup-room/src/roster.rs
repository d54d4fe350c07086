//! The roster: who is in the session right now.
//!
//! Joins reach the roster twice for most students, once from the REST call
//! that created them and once from the `student_joined` broadcast, and the
//! broadcast itself may be redelivered after a reconnect. Every join is
//! therefore keyed by `{id, joined_at}` and applied at most once.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use pairup_protocol::{Participant, ParticipantId};

use crate::RoundError;

/// Longest accepted student name, in characters.
pub const MAX_NAME_CHARS: usize = 50;

/// Deduplication key for a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinKey {
    pub id: ParticipantId,
    pub joined_at: DateTime<Utc>,
}

impl From<&Participant> for JoinKey {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            joined_at: p.joined_at,
        }
    }
}

/// What [`Roster::apply_join`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new participant.
    Added,
    /// This exact join was applied before. Nothing changed.
    Duplicate,
    /// The id was present with an older join time and has been replaced.
    Replaced,
    /// The id is present with a newer join time. The entry was kept.
    Stale,
}

/// Authoritative set of participants for one session.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: HashMap<ParticipantId, Participant>,
    /// Every key ever applied, kept after removal so a late duplicate
    /// cannot bring a departed student back.
    applied: HashSet<JoinKey>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a join, idempotently.
    pub fn apply_join(&mut self, participant: Participant) -> JoinOutcome {
        let key = JoinKey::from(&participant);
        if !self.applied.insert(key) {
            return JoinOutcome::Duplicate;
        }
        match self.members.get_mut(&participant.id) {
            Some(current) if current.joined_at > participant.joined_at => JoinOutcome::Stale,
            Some(current) => {
                *current = participant;
                JoinOutcome::Replaced
            }
            None => {
                self.members.insert(participant.id, participant);
                JoinOutcome::Added
            }
        }
    }

    /// Removes `id`. Returns whether it was present; absent is not an error.
    pub fn apply_leave(&mut self, id: ParticipantId) -> bool {
        self.members.remove(&id).is_some()
    }

    /// Replaces the membership with a freshly fetched list.
    ///
    /// The list is authoritative, so it wins even over keys that were
    /// applied and later removed.
    pub fn sync(&mut self, participants: Vec<Participant>) {
        self.members.clear();
        for p in participants {
            self.applied.insert(JoinKey::from(&p));
            self.members.insert(p.id, p);
        }
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.members.contains_key(&id)
    }

    /// Case-insensitive name lookup, ignoring surrounding whitespace.
    pub fn contains_name(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        self.members
            .values()
            .any(|p| p.name.trim().to_lowercase() == wanted)
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.members.get(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members ordered by join time, ties broken by id.
    pub fn participants(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> = self.members.values().cloned().collect();
        list.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        list
    }
}

/// Trims `raw` and checks it is a usable student name.
///
/// # Errors
/// [`RoundError::Validation`] for an empty name or one longer than
/// [`MAX_NAME_CHARS`].
pub fn normalize_name(raw: &str) -> Result<String, RoundError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RoundError::Validation("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(RoundError::Validation(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

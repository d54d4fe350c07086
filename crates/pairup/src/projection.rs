//! What a student sees, derived only from delivered events.
//!
//! The projection never asks the server anything. Each payload is
//! self-sufficient, so applying the latest relevant event is enough to
//! render the right screen after a reconnect.

use pairup_protocol::{AssignmentKind, PairRole, ServerEvent};
use serde::Serialize;
use tracing::debug;

/// The student's screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPhase {
    #[default]
    Waiting,
    Paired,
    Break,
    Discussing,
}

/// Everything the student screen renders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StudentView {
    pub phase: DisplayPhase,
    pub role: Option<PairRole>,
    pub partner: Option<String>,
    pub prompt: Option<String>,
    pub round_number: Option<u32>,
}

/// Why the student client must leave the session screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The instructor removed this student.
    Removed { reason: String },
    /// The instructor ended the session.
    SessionEnded,
}

/// What the host should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Continue,
    /// Leave the session without calling the leave endpoint.
    Exit(ExitReason),
}

#[derive(Debug, Clone, Default)]
pub struct StudentProjection {
    view: StudentView,
}

impl StudentProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &StudentView {
        &self.view
    }

    /// Applies one event.
    pub fn apply(&mut self, event: &ServerEvent) -> Reaction {
        match event {
            ServerEvent::RoundReset {} => {
                self.view = StudentView::default();
            }
            ServerEvent::PairingAssignment {
                kind: AssignmentKind::Break,
                round_number,
                ..
            } => {
                self.view = StudentView {
                    phase: DisplayPhase::Break,
                    round_number: *round_number,
                    ..StudentView::default()
                };
            }
            ServerEvent::PairingAssignment {
                kind: AssignmentKind::Pair,
                role,
                partner,
                round_number,
            } => {
                self.view = StudentView {
                    phase: DisplayPhase::Paired,
                    role: *role,
                    partner: partner.clone(),
                    prompt: None,
                    round_number: *round_number,
                };
            }
            ServerEvent::DiscussionPrompt { prompt } => {
                self.view.phase = DisplayPhase::Discussing;
                self.view.role = Some(PairRole::Leader);
                self.view.prompt = Some(prompt.clone());
            }
            ServerEvent::DiscussionStarted {} => {
                self.view.phase = DisplayPhase::Discussing;
                self.view.role = Some(PairRole::Talker);
                self.view.prompt = None;
            }
            ServerEvent::Prompt { role, prompt } => {
                self.view.phase = DisplayPhase::Discussing;
                self.view.role = Some(*role);
                self.view.prompt = Some(prompt.clone());
            }
            ServerEvent::StudentRemoved { reason } => {
                return Reaction::Exit(ExitReason::Removed {
                    reason: reason.clone(),
                });
            }
            ServerEvent::SessionEnded {} => return Reaction::Exit(ExitReason::SessionEnded),
            other => {
                debug!(event = other.name(), "not a student event");
            }
        }
        Reaction::Continue
    }
}

#[cfg(test)]
mod tests {
    use pairup_protocol::{Participant, ParticipantId, ParticipantRef};

    use super::*;

    fn paired(role: PairRole, partner: &str) -> ServerEvent {
        ServerEvent::PairingAssignment {
            kind: AssignmentKind::Pair,
            role: Some(role),
            partner: Some(partner.into()),
            round_number: Some(1),
        }
    }

    fn on_break() -> ServerEvent {
        ServerEvent::PairingAssignment {
            kind: AssignmentKind::Break,
            role: None,
            partner: None,
            round_number: Some(1),
        }
    }

    #[test]
    fn test_apply_pair_then_prompt_is_discussing_leader() {
        let mut p = StudentProjection::new();
        p.apply(&paired(PairRole::Leader, "Bo"));
        assert_eq!(p.view().phase, DisplayPhase::Paired);
        assert_eq!(p.view().partner.as_deref(), Some("Bo"));

        p.apply(&ServerEvent::DiscussionPrompt {
            prompt: "Favourite book?".into(),
        });
        assert_eq!(p.view().phase, DisplayPhase::Discussing);
        assert_eq!(p.view().role, Some(PairRole::Leader));
        assert_eq!(p.view().prompt.as_deref(), Some("Favourite book?"));
        assert_eq!(p.view().partner.as_deref(), Some("Bo"));
    }

    #[test]
    fn test_apply_break_clears_role_and_prompt() {
        let mut p = StudentProjection::new();
        p.apply(&ServerEvent::Prompt {
            role: PairRole::Leader,
            prompt: "old".into(),
        });
        p.apply(&on_break());

        assert_eq!(p.view().phase, DisplayPhase::Break);
        assert!(p.view().role.is_none());
        assert!(p.view().prompt.is_none());
    }

    #[test]
    fn test_apply_new_pair_clears_stale_prompt() {
        let mut p = StudentProjection::new();
        p.apply(&ServerEvent::DiscussionPrompt {
            prompt: "round one".into(),
        });
        p.apply(&paired(PairRole::Talker, "Cy"));

        assert_eq!(p.view().phase, DisplayPhase::Paired);
        assert!(p.view().prompt.is_none());
        assert_eq!(p.view().role, Some(PairRole::Talker));
    }

    #[test]
    fn test_apply_round_reset_returns_to_waiting() {
        let mut p = StudentProjection::new();
        p.apply(&paired(PairRole::Leader, "Bo"));
        p.apply(&ServerEvent::DiscussionStarted {});

        assert_eq!(p.apply(&ServerEvent::RoundReset {}), Reaction::Continue);
        assert_eq!(p.view(), &StudentView::default());
    }

    #[test]
    fn test_apply_legacy_prompt_maps_role() {
        let mut p = StudentProjection::new();
        p.apply(&ServerEvent::Prompt {
            role: PairRole::Talker,
            prompt: "Listen well".into(),
        });
        assert_eq!(p.view().phase, DisplayPhase::Discussing);
        assert_eq!(p.view().role, Some(PairRole::Talker));
    }

    #[test]
    fn test_apply_removed_and_ended_signal_exit() {
        let mut p = StudentProjection::new();
        assert_eq!(
            p.apply(&ServerEvent::StudentRemoved {
                reason: "removed from the session".into()
            }),
            Reaction::Exit(ExitReason::Removed {
                reason: "removed from the session".into()
            })
        );
        assert_eq!(
            p.apply(&ServerEvent::SessionEnded {}),
            Reaction::Exit(ExitReason::SessionEnded)
        );
    }

    #[test]
    fn test_apply_instructor_events_are_ignored() {
        let mut p = StudentProjection::new();
        p.apply(&paired(PairRole::Leader, "Bo"));
        let before = p.view().clone();

        p.apply(&ServerEvent::StudentLeft {
            student: ParticipantRef {
                id: ParticipantId(2),
                name: "Bo".into(),
            },
        });
        p.apply(&ServerEvent::StudentJoined {
            student: Participant {
                id: ParticipantId(3),
                name: "Cy".into(),
                joined_at: chrono::Utc::now(),
            },
        });

        assert_eq!(p.view(), &before);
    }
}

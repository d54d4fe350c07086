//! A validated round of pairings and what each student gets to see of it.

use std::collections::HashSet;

use pairup_protocol::{
    AssignmentKind, PairRole, PairingEntry, ParticipantId, ParticipantRef, RoundPairing,
    ServerEvent,
};
use serde::Serialize;

use crate::RoundError;

/// Leader prompt used when the service returned a pair without one.
pub const FALLBACK_PROMPT: &str = "Share something interesting you learned recently.";

/// The pairing service's answer for one round, checked for consistency.
///
/// Every participant appears in exactly one entry, and there is exactly one
/// break when the number of participants is odd and none when it is even.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundPairingSet {
    round_number: u32,
    entries: Vec<PairingEntry>,
}

impl RoundPairingSet {
    /// Validates raw entries into a set.
    ///
    /// # Errors
    /// [`RoundError::InvalidPairing`] if the entries are empty, span more
    /// than one round, pair someone with themselves, name a participant
    /// twice, or carry a break count that does not match the parity of the
    /// participant count.
    pub fn new(entries: Vec<PairingEntry>) -> Result<Self, RoundError> {
        let first = entries
            .first()
            .ok_or_else(|| RoundError::InvalidPairing("no pairings returned".into()))?;
        let round_number = first.round_number();

        let mut seen = HashSet::new();
        let mut breaks = 0usize;
        for entry in &entries {
            if entry.round_number() != round_number {
                return Err(RoundError::InvalidPairing(format!(
                    "entries span rounds {round_number} and {}",
                    entry.round_number()
                )));
            }
            if let PairingEntry::Pair { leader, talker, .. } = entry {
                if leader.id == talker.id {
                    return Err(RoundError::InvalidPairing(format!(
                        "{} is paired with themselves",
                        leader.id
                    )));
                }
            } else {
                breaks += 1;
            }
            for id in entry.participant_ids() {
                if !seen.insert(id) {
                    return Err(RoundError::InvalidPairing(format!("{id} appears twice")));
                }
            }
        }

        let expected_breaks = seen.len() % 2;
        if breaks != expected_breaks {
            return Err(RoundError::InvalidPairing(format!(
                "{breaks} breaks for {} participants",
                seen.len()
            )));
        }

        Ok(Self {
            round_number,
            entries,
        })
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    /// The entries exactly as the service returned them.
    pub fn entries(&self) -> &[PairingEntry] {
        &self.entries
    }

    pub fn pair_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, PairingEntry::Pair { .. }))
            .count()
    }

    pub fn break_count(&self) -> usize {
        self.entries.len() - self.pair_count()
    }

    /// Every participant in the round, in entry order.
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.entries.iter().flat_map(PairingEntry::participant_ids).collect()
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.entry_for(id).is_some()
    }

    fn entry_for(&self, id: ParticipantId) -> Option<&PairingEntry> {
        self.entries.iter().find(|e| e.participant_ids().contains(&id))
    }

    /// What `id` sees of this round. The Leader's prompt is only included
    /// once `discussing` is true.
    pub fn view_for(&self, id: ParticipantId, discussing: bool) -> Option<RoundPairing> {
        let entry = self.entry_for(id)?;
        Some(match entry {
            PairingEntry::Pair {
                leader,
                talker,
                prompt,
                ..
            } => {
                let (role, partner) = role_and_partner(id, leader, talker);
                let prompt = match role {
                    PairRole::Leader if discussing => Some(prompt_or_fallback(prompt.as_deref())),
                    _ => None,
                };
                RoundPairing::Paired {
                    round_number: self.round_number,
                    role,
                    partner_name: partner.name.clone(),
                    prompt,
                }
            }
            PairingEntry::Break { participant, .. } => RoundPairing::OnBreak {
                round_number: self.round_number,
                name: participant.name.clone(),
            },
        })
    }

    /// The `pairing_assignment` event for `id`. Only the partner's name is
    /// revealed.
    pub fn assignment_event(&self, id: ParticipantId) -> Option<ServerEvent> {
        Some(match self.view_for(id, false)? {
            RoundPairing::Paired {
                role, partner_name, ..
            } => ServerEvent::PairingAssignment {
                kind: AssignmentKind::Pair,
                role: Some(role),
                partner: Some(partner_name),
                round_number: Some(self.round_number),
            },
            RoundPairing::OnBreak { .. } => ServerEvent::PairingAssignment {
                kind: AssignmentKind::Break,
                role: None,
                partner: None,
                round_number: Some(self.round_number),
            },
        })
    }

    /// The event `id` receives when discussion begins: Leaders get the
    /// prompt, Talkers a bare start signal, students on break nothing.
    pub fn discussion_event(&self, id: ParticipantId) -> Option<ServerEvent> {
        match self.view_for(id, true)? {
            RoundPairing::Paired {
                role: PairRole::Leader,
                prompt,
                ..
            } => Some(ServerEvent::DiscussionPrompt {
                prompt: prompt.unwrap_or_else(|| FALLBACK_PROMPT.to_string()),
            }),
            RoundPairing::Paired {
                role: PairRole::Talker,
                ..
            } => Some(ServerEvent::DiscussionStarted {}),
            RoundPairing::OnBreak { .. } => None,
        }
    }
}

fn role_and_partner<'a>(
    id: ParticipantId,
    leader: &'a ParticipantRef,
    talker: &'a ParticipantRef,
) -> (PairRole, &'a ParticipantRef) {
    if leader.id == id {
        (PairRole::Leader, talker)
    } else {
        (PairRole::Talker, leader)
    }
}

fn prompt_or_fallback(prompt: Option<&str>) -> String {
    match prompt.map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => FALLBACK_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who(id: u64, name: &str) -> ParticipantRef {
        ParticipantRef {
            id: ParticipantId(id),
            name: name.into(),
        }
    }

    fn pair(leader: (u64, &str), talker: (u64, &str), prompt: Option<&str>) -> PairingEntry {
        PairingEntry::Pair {
            round_number: 1,
            leader: who(leader.0, leader.1),
            talker: who(talker.0, talker.1),
            prompt: prompt.map(str::to_string),
        }
    }

    fn rest(id: u64, name: &str) -> PairingEntry {
        PairingEntry::Break {
            round_number: 1,
            participant: who(id, name),
        }
    }

    fn abc() -> RoundPairingSet {
        RoundPairingSet::new(vec![
            pair((1, "A"), (2, "B"), Some("Favourite book?")),
            rest(3, "C"),
        ])
        .unwrap()
    }

    #[test]
    fn test_new_three_students_one_break_reciprocal_roles() {
        let set = abc();
        assert_eq!(set.pair_count(), 1);
        assert_eq!(set.break_count(), 1);

        assert_eq!(
            set.view_for(ParticipantId(1), false),
            Some(RoundPairing::Paired {
                round_number: 1,
                role: PairRole::Leader,
                partner_name: "B".into(),
                prompt: None
            })
        );
        assert_eq!(
            set.view_for(ParticipantId(2), false),
            Some(RoundPairing::Paired {
                round_number: 1,
                role: PairRole::Talker,
                partner_name: "A".into(),
                prompt: None
            })
        );
        assert_eq!(
            set.view_for(ParticipantId(3), false),
            Some(RoundPairing::OnBreak {
                round_number: 1,
                name: "C".into()
            })
        );
    }

    #[test]
    fn test_view_for_leader_gets_prompt_only_when_discussing() {
        let set = abc();
        match set.view_for(ParticipantId(1), true) {
            Some(RoundPairing::Paired { prompt, .. }) => {
                assert_eq!(prompt.as_deref(), Some("Favourite book?"))
            }
            other => panic!("unexpected {other:?}"),
        }
        match set.view_for(ParticipantId(2), true) {
            Some(RoundPairing::Paired { prompt, .. }) => assert!(prompt.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_new_even_roster_with_break_is_rejected() {
        let result = RoundPairingSet::new(vec![
            pair((1, "A"), (2, "B"), None),
            rest(3, "C"),
            rest(4, "D"),
        ]);
        assert!(matches!(result, Err(RoundError::InvalidPairing(_))));
    }

    #[test]
    fn test_new_odd_roster_with_three_breaks_is_rejected() {
        let result = RoundPairingSet::new(vec![
            pair((1, "A"), (2, "B"), None),
            rest(3, "C"),
            rest(4, "D"),
            rest(5, "E"),
        ]);
        assert!(matches!(result, Err(RoundError::InvalidPairing(_))));
    }

    #[test]
    fn test_new_duplicate_participant_is_rejected() {
        let result = RoundPairingSet::new(vec![
            pair((1, "A"), (2, "B"), None),
            pair((2, "B"), (3, "C"), None),
        ]);
        assert!(matches!(result, Err(RoundError::InvalidPairing(_))));
    }

    #[test]
    fn test_new_self_pair_is_rejected() {
        let result = RoundPairingSet::new(vec![pair((1, "A"), (1, "A"), None)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_new_empty_is_rejected() {
        assert!(RoundPairingSet::new(Vec::new()).is_err());
    }

    #[test]
    fn test_new_mixed_rounds_is_rejected() {
        let mut other = rest(3, "C");
        if let PairingEntry::Break { round_number, .. } = &mut other {
            *round_number = 2;
        }
        let result = RoundPairingSet::new(vec![pair((1, "A"), (2, "B"), None), other]);
        assert!(result.is_err());
    }

    #[test]
    fn test_assignment_event_reveals_partner_name_only() {
        let set = abc();
        assert_eq!(
            set.assignment_event(ParticipantId(2)),
            Some(ServerEvent::PairingAssignment {
                kind: AssignmentKind::Pair,
                role: Some(PairRole::Talker),
                partner: Some("A".into()),
                round_number: Some(1),
            })
        );
        assert!(matches!(
            set.assignment_event(ParticipantId(3)),
            Some(ServerEvent::PairingAssignment {
                kind: AssignmentKind::Break,
                role: None,
                ..
            })
        ));
        assert!(set.assignment_event(ParticipantId(99)).is_none());
    }

    #[test]
    fn test_discussion_event_is_asymmetric() {
        let set = abc();
        assert_eq!(
            set.discussion_event(ParticipantId(1)),
            Some(ServerEvent::DiscussionPrompt {
                prompt: "Favourite book?".into()
            })
        );
        assert_eq!(
            set.discussion_event(ParticipantId(2)),
            Some(ServerEvent::DiscussionStarted {})
        );
        assert_eq!(set.discussion_event(ParticipantId(3)), None);
    }

    #[test]
    fn test_discussion_event_missing_prompt_uses_fallback() {
        let set = RoundPairingSet::new(vec![pair((1, "A"), (2, "B"), Some("  "))]).unwrap();
        assert_eq!(
            set.discussion_event(ParticipantId(1)),
            Some(ServerEvent::DiscussionPrompt {
                prompt: FALLBACK_PROMPT.into()
            })
        );
    }
}

//! Realtime events exchanged over the session socket.
//!
//! Every frame is a JSON object of the form `{"event": <name>, "data": {...}}`.
//! Serde's *adjacently tagged* representation (`tag = "event"`,
//! `content = "data"`) produces exactly that shape, so the enums below are
//! the wire format; there is no separate envelope type.
//!
//! Variants with nothing to say are written as empty struct variants
//! (`RoundReset {}`) rather than unit variants so they still carry a
//! `"data": {}` object, which is what the session server emits.

use serde::{Deserialize, Serialize};

use crate::types::{PairRole, Participant, ParticipantId, ParticipantRef};

/// Who a relayed event should reach.
///
/// Serializes as `"all"` or `{"participant": 7}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    /// Every student in the session group.
    All,
    /// One student, by id.
    Participant(ParticipantId),
}

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Instructor handshake: subscribe to roster events for `keyword`.
    JoinInstructorRoom { keyword: String },

    /// Student handshake: join the broadcast group for `keyword`.
    JoinSession { keyword: String, username: String },

    /// Ask the server to fan `payload` out to `to` within the session.
    ///
    /// This is how the instructor console delivers assignments and
    /// discussion events to students.
    Relay {
        to: Recipient,
        payload: Box<ServerEvent>,
    },
}

impl ClientEvent {
    /// The handshake a client must re-send after every (re)connect.
    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::JoinInstructorRoom { .. } | Self::JoinSession { .. })
    }
}

/// Whether a `pairing_assignment` pairs the student or benches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Pair,
    Break,
}

/// Server → client events.
///
/// The first three are only ever delivered to the instructor; the rest
/// target students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    // -- Instructor --
    InstructorJoined { message: String },
    StudentJoined { student: Participant },
    StudentLeft { student: ParticipantRef },

    // -- Student --
    /// Legacy single-shot assignment that carries both role and prompt.
    Prompt { role: PairRole, prompt: String },

    /// This student's slot in the new round. Only the partner's name is
    /// revealed, never their id.
    PairingAssignment {
        #[serde(rename = "type")]
        kind: AssignmentKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<PairRole>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round_number: Option<u32>,
    },

    /// Sent to Leaders when discussion begins.
    DiscussionPrompt { prompt: String },

    /// Sent to Talkers when discussion begins.
    DiscussionStarted {},

    RoundReset {},
    StudentRemoved { reason: String },
    SessionEnded {},
}

impl ServerEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstructorJoined { .. } => "instructor_joined",
            Self::StudentJoined { .. } => "student_joined",
            Self::StudentLeft { .. } => "student_left",
            Self::Prompt { .. } => "prompt",
            Self::PairingAssignment { .. } => "pairing_assignment",
            Self::DiscussionPrompt { .. } => "discussion_prompt",
            Self::DiscussionStarted {} => "discussion_started",
            Self::RoundReset {} => "round_reset",
            Self::StudentRemoved { .. } => "student_removed",
            Self::SessionEnded {} => "session_ended",
        }
    }

    /// True for events only the instructor console consumes.
    pub fn is_instructor_only(&self) -> bool {
        matches!(
            self,
            Self::InstructorJoined { .. } | Self::StudentJoined { .. } | Self::StudentLeft { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_session_json_format() {
        let event = ClientEvent::JoinSession {
            keyword: "MATH1".into(),
            username: "alice".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "join_session", "data": {"keyword": "MATH1", "username": "alice"}})
        );
        assert!(event.is_handshake());
    }

    #[test]
    fn test_relay_to_participant_json_format() {
        let event = ClientEvent::Relay {
            to: Recipient::Participant(ParticipantId(4)),
            payload: Box::new(ServerEvent::DiscussionStarted {}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "relay");
        assert_eq!(value["data"]["to"], json!({"participant": 4}));
        assert_eq!(
            value["data"]["payload"],
            json!({"event": "discussion_started", "data": {}})
        );
        assert!(!event.is_handshake());
    }

    #[test]
    fn test_recipient_all_is_plain_string() {
        assert_eq!(serde_json::to_value(Recipient::All).unwrap(), json!("all"));
    }

    #[test]
    fn test_pairing_assignment_break_omits_role_and_partner() {
        let event = ServerEvent::PairingAssignment {
            kind: AssignmentKind::Break,
            role: None,
            partner: None,
            round_number: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "pairing_assignment", "data": {"type": "break"}})
        );
    }

    #[test]
    fn test_pairing_assignment_parses_server_frame() {
        let frame = json!({
            "event": "pairing_assignment",
            "data": {"type": "pair", "role": "talker", "partner": "Bob"}
        });
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(
            event,
            ServerEvent::PairingAssignment {
                kind: AssignmentKind::Pair,
                role: Some(PairRole::Talker),
                partner: Some("Bob".into()),
                round_number: None,
            }
        );
    }

    #[test]
    fn test_legacy_prompt_maps_asker_to_leader() {
        let frame = json!({"event": "prompt", "data": {"role": "asker", "prompt": "Why Rust?"}});
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(
            event,
            ServerEvent::Prompt {
                role: PairRole::Leader,
                prompt: "Why Rust?".into()
            }
        );
    }

    #[test]
    fn test_student_joined_parses_naive_timestamp() {
        let frame = json!({
            "event": "student_joined",
            "data": {"student": {"id": 9, "name": "Ivy", "joined_at": "2024-05-01T09:00:00"}}
        });
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        assert!(event.is_instructor_only());
        assert_eq!(event.name(), "student_joined");
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let frame = json!({"event": "teleport", "data": {}});
        assert!(serde_json::from_value::<ServerEvent>(frame).is_err());
    }
}

//! Core data types shared by every Pairup component.
//!
//! These are the structures that cross a boundary: they are serialized into
//! realtime frames, returned by the HTTP service, or persisted locally.
//! Keeping them in one place means the roster, the console and the student
//! projection all agree on what a participant or a pairing looks like.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Server-assigned identifier of a student in one session.
///
/// Identity is the id, never the display name: two students may briefly
/// share a name on the wire, but never an id.
///
/// `#[serde(transparent)]` keeps the JSON form a plain number, which is what
/// the session service emits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Which side of the classroom a client sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    Instructor,
    Student,
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instructor => f.write_str("instructor"),
            Self::Student => f.write_str("student"),
        }
    }
}

/// The role a student plays inside a pair.
///
/// The Leader receives the discussion prompt; the Talker is only told that
/// the discussion started. Older servers say `asker` / `responder`, which
/// the aliases accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairRole {
    #[serde(alias = "asker")]
    Leader,
    #[serde(alias = "responder")]
    Talker,
}

impl fmt::Display for PairRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leader => f.write_str("leader"),
            Self::Talker => f.write_str("talker"),
        }
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// A student on a session roster.
///
/// `joined_at` is part of the roster's deduplication key together with
/// `id`, so two deliveries of the same join collapse into one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Returns the lightweight `{id, name}` form used inside pairings.
    pub fn to_ref(&self) -> ParticipantRef {
        ParticipantRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// An `{id, name}` reference to a participant.
///
/// Used where the join time is irrelevant: pairing entries and leave
/// notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantRef {
    pub id: ParticipantId,
    pub name: String,
}

/// Accepts RFC 3339 timestamps and naive ISO-8601 timestamps.
///
/// The session service stores join times without an offset, so a bare
/// `2024-03-01T10:15:00.123456` is read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid timestamp: {raw}"))
    })
}

/// Parses a timestamp the way [`Participant`] deserialization does.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Pairings
// ---------------------------------------------------------------------------

/// One entry of the pairing service's answer for a round.
///
/// Entries are pair-level: a pair names both students, a break names the
/// one student sitting out. The same list is echoed back to the service
/// as `pairing_objects` when discussion begins, so the representation
/// must round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PairingEntry {
    Pair {
        round_number: u32,
        leader: ParticipantRef,
        talker: ParticipantRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },
    Break {
        round_number: u32,
        participant: ParticipantRef,
    },
}

impl PairingEntry {
    /// Round this entry belongs to.
    pub fn round_number(&self) -> u32 {
        match self {
            Self::Pair { round_number, .. } | Self::Break { round_number, .. } => {
                *round_number
            }
        }
    }

    /// Ids of every participant named by this entry.
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        match self {
            Self::Pair { leader, talker, .. } => vec![leader.id, talker.id],
            Self::Break { participant, .. } => vec![participant.id],
        }
    }
}

/// What one participant sees of a round.
///
/// `prompt` is only populated once discussion begins, and only ever for
/// the Leader of a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundPairing {
    Paired {
        round_number: u32,
        role: PairRole,
        partner_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },
    OnBreak {
        round_number: u32,
        name: String,
    },
}

impl RoundPairing {
    pub fn round_number(&self) -> u32 {
        match self {
            Self::Paired { round_number, .. } | Self::OnBreak { round_number, .. } => {
                *round_number
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// A prompt category the instructor can filter pairings by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub value: String,
    pub label: String,
}

impl Topic {
    fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }

    /// The categories used when the service's list cannot be fetched.
    pub fn builtin() -> Vec<Topic> {
        vec![
            Topic::new("general", "General Discussion"),
            Topic::new("technical", "Technical Topics"),
            Topic::new("personal", "Personal Development"),
            Topic::new("academic", "Academic Focus"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alice() -> ParticipantRef {
        ParticipantRef {
            id: ParticipantId(1),
            name: "Alice".into(),
        }
    }

    fn bob() -> ParticipantRef {
        ParticipantRef {
            id: ParticipantId(2),
            name: "Bob".into(),
        }
    }

    #[test]
    fn test_participant_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ParticipantId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_participant_id_display() {
        assert_eq!(ParticipantId(7).to_string(), "S-7");
    }

    #[test]
    fn test_participant_accepts_naive_timestamp_as_utc() {
        let json = r#"{"id":3,"name":"Cara","joined_at":"2024-03-01T10:15:00.123456"}"#;
        let p: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(p.id, ParticipantId(3));
        assert_eq!(
            p.joined_at.timestamp(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn test_participant_accepts_rfc3339_with_offset() {
        let json = r#"{"id":3,"name":"Cara","joined_at":"2024-03-01T12:15:00+02:00"}"#;
        let p: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(p.joined_at, Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap());
    }

    #[test]
    fn test_participant_serializes_rfc3339() {
        let p = Participant {
            id: ParticipantId(1),
            name: "Alice".into(),
            joined_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap(),
        };
        let value = serde_json::to_value(&p).unwrap();
        let raw = value["joined_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(raw).is_ok(), "got {raw}");
    }

    #[test]
    fn test_participant_rejects_garbage_timestamp() {
        let json = r#"{"id":3,"name":"Cara","joined_at":"yesterday"}"#;
        assert!(serde_json::from_str::<Participant>(json).is_err());
    }

    #[test]
    fn test_pair_role_accepts_legacy_names() {
        let leader: PairRole = serde_json::from_str(r#""asker""#).unwrap();
        let talker: PairRole = serde_json::from_str(r#""responder""#).unwrap();
        assert_eq!(leader, PairRole::Leader);
        assert_eq!(talker, PairRole::Talker);
        assert_eq!(serde_json::to_string(&leader).unwrap(), r#""leader""#);
    }

    #[test]
    fn test_pairing_entry_pair_json_format() {
        let entry = PairingEntry::Pair {
            round_number: 2,
            leader: alice(),
            talker: bob(),
            prompt: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "pair");
        assert_eq!(json["round_number"], 2);
        assert_eq!(json["leader"]["name"], "Alice");
        assert!(json.get("prompt").is_none());
    }

    #[test]
    fn test_pairing_entry_break_parses_from_service_json() {
        let json = r#"{"type":"break","round_number":1,"participant":{"id":5,"name":"Eve"}}"#;
        let entry: PairingEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.round_number(), 1);
        assert_eq!(entry.participant_ids(), vec![ParticipantId(5)]);
    }

    #[test]
    fn test_topic_builtin_has_four_categories() {
        let topics = Topic::builtin();
        let values: Vec<_> = topics.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, ["general", "technical", "personal", "academic"]);
    }
}

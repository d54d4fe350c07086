//! Wire protocol for Pairup.
//!
//! This crate defines the "language" the instructor console, the student
//! clients and the session server speak:
//!
//! - **Types** ([`Participant`], [`PairingEntry`], [`RoundPairing`], etc.) —
//!   the data that crosses a boundary.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — the realtime frames.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames become bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the client
//! components. It doesn't know about connections or rounds; it only knows
//! how to serialize and deserialize.
//!
//! ```text
//! Transport (bytes) → Protocol (ServerEvent) → Console / Projection
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{AssignmentKind, ClientEvent, Recipient, ServerEvent};
pub use types::{
    ClientRole, PairRole, PairingEntry, Participant, ParticipantId, ParticipantRef,
    RoundPairing, Topic, parse_timestamp,
};

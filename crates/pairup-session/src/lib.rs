//! Durable local session handles for Pairup.
//!
//! This crate is how a client remembers which class it belongs to:
//!
//! 1. **Handles** — who the client is and until when ([`SessionHandle`])
//! 2. **Persistence** — `handle.json` and `keyword` under a state directory
//! 3. **Recovery** — classifying stored state on start-up as empty, active
//!    or expired ([`SessionManager::load`], [`LoadOutcome`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client façades (above)  ← resume or discard a session at start-up
//!     ↕
//! Session Layer (this crate)  ← owns the one local handle
//!     ↕
//! Protocol Layer (below)  ← provides ClientRole, ParticipantId
//! ```

mod error;
mod manager;
mod session;
mod store;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{
    DEFAULT_HANDLE_LIFETIME, LoadOutcome, SessionConfig, SessionHandle, default_state_dir,
};

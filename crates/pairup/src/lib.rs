//! # Pairup
//!
//! Classroom speed-pairing clients.
//!
//! An instructor opens a session identified by a short keyword, students
//! join, and the instructor moves the class through timed rounds
//! (Idle → Pairing → Discussing → Idle). This crate wires the layers
//! together into two clients:
//!
//! - [`InstructorClient`]: sign in, open a session, drive the console
//! - [`StudentClient`]: join a session and follow the projected view
//!
//! [`recover`] decides at start-up whether a stored handle can be resumed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pairup::prelude::*;
//!
//! # async fn run() -> Result<(), PairupError> {
//! let config = ClientConfig::from_env().validated();
//! let mut instructor = InstructorClient::login(&config, "ada@school.edu", "secret").await?;
//! let session = instructor.open_session().await?;
//! println!("keyword: {}", session.keyword());
//! session.console().start(None).await?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod config;
mod error;
mod instructor;
mod projection;
mod recovery;
mod student;

pub use adapter::{AdapterConfig, AdapterHandle, ConnectionStatus, Subscription, spawn_adapter};
pub use config::{ClientConfig, DEFAULT_API_URL, derive_ws_url};
pub use error::{ErrorKind, PairupError};
pub use instructor::{InstructorClient, InstructorSession};
pub use projection::{DisplayPhase, ExitReason, Reaction, StudentProjection, StudentView};
pub use recovery::{Recovered, recover};
pub use student::{StudentClient, StudentState};

pub mod prelude {
    pub use crate::{
        ClientConfig, ConnectionStatus, DisplayPhase, ErrorKind, ExitReason, InstructorClient,
        InstructorSession, PairupError, Recovered, StudentClient, StudentState, StudentView,
        recover,
    };
    pub use pairup_protocol::{PairRole, ParticipantId, Topic};
    pub use pairup_room::{ConsoleHandle, ConsoleSnapshot, SessionPhase};
}

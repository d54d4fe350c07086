//! HTTP client for the Pairup session service.
//!
//! [`ApiClient`] covers every endpoint the clients use (auth, sessions,
//! roster, rounds, topics) and maps failures onto [`ApiError`]. It also
//! implements [`pairup_room::ClassroomService`], so an instructor console
//! can drive the real service directly.

mod client;
mod error;
mod validate;

pub use client::ApiClient;
pub use error::ApiError;
pub use validate::{
    MAX_KEYWORD_CHARS, normalize_keyword, normalize_student_name, validate_credentials,
};

//! Local input checks. Anything rejected here is never sent.

use crate::ApiError;

/// Longest accepted session keyword.
pub const MAX_KEYWORD_CHARS: usize = 20;

/// Trims and upper-cases a session keyword.
///
/// # Errors
/// [`ApiError::Validation`] unless the result is 1 to
/// [`MAX_KEYWORD_CHARS`] ASCII letters or digits.
pub fn normalize_keyword(raw: &str) -> Result<String, ApiError> {
    let keyword = raw.trim().to_ascii_uppercase();
    if keyword.is_empty() {
        return Err(ApiError::Validation("keyword must not be empty".into()));
    }
    if keyword.len() > MAX_KEYWORD_CHARS {
        return Err(ApiError::Validation(format!(
            "keyword must be at most {MAX_KEYWORD_CHARS} characters"
        )));
    }
    if !keyword.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::Validation(
            "keyword may only contain letters and digits".into(),
        ));
    }
    Ok(keyword)
}

/// Checks login or registration input.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::Validation("email and password are required".into()));
    }
    Ok(())
}

/// Trims a student name, reusing the roster's rules.
pub fn normalize_student_name(raw: &str) -> Result<String, ApiError> {
    pairup_room::normalize_name(raw).map_err(|e| ApiError::Validation(e.to_string()))
}

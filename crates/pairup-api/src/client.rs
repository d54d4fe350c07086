use std::time::Duration;

use pairup_protocol::{PairingEntry, Participant, ParticipantId, Topic};
use pairup_room::{ClassroomService, ServiceError};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::ApiError;
use crate::validate::{normalize_keyword, normalize_student_name, validate_credentials};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct KeywordResponse {
    keyword: String,
}

#[derive(Deserialize)]
struct StudentsResponse {
    students: Vec<Participant>,
}

#[derive(Deserialize)]
struct PairingsResponse {
    pairings: Vec<PairingEntry>,
}

#[derive(Deserialize)]
struct TagsResponse {
    tags: Vec<Topic>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Typed client for the session service.
///
/// Instructor calls need a bearer token ([`with_token`](Self::with_token));
/// student calls (join, leave, list) do not.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Creates a client for `base_url`, e.g. `http://localhost:5000/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match &self.token {
            Some(token) => Ok(req.bearer_auth(token)),
            None => Err(ApiError::Auth("not signed in".into())),
        }
    }

    // -- Auth -------------------------------------------------------------

    /// Signs in and returns the bearer token. The client itself is not
    /// modified.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        self.credentials("/auth/login", email, password).await
    }

    /// Registers a new instructor and returns the bearer token.
    pub async fn register(&self, email: &str, password: &str) -> Result<String, ApiError> {
        self.credentials("/auth/register", email, password).await
    }

    async fn credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<String, ApiError> {
        validate_credentials(email, password)?;
        let email = email.trim();
        let req = self
            .http
            .post(self.url(path))
            .json(&Credentials { email, password });
        let body: TokenResponse = read_json(req.send().await?).await?;
        info!(%email, path, "signed in");
        Ok(body.access_token)
    }

    // -- Sessions ---------------------------------------------------------

    /// Creates a session and returns its keyword.
    pub async fn create_session(&self) -> Result<String, ApiError> {
        let req = self.authed(self.http.post(self.url("/session/create")))?;
        let body: KeywordResponse = read_json(req.send().await?).await?;
        let keyword = normalize_keyword(&body.keyword)?;
        info!(%keyword, "session created");
        Ok(keyword)
    }

    pub async fn end_session(&self, keyword: &str) -> Result<(), ApiError> {
        let keyword = normalize_keyword(keyword)?;
        let req = self.authed(self.http.post(self.url(&format!("/session/{keyword}/end"))))?;
        read_empty(req.send().await?).await?;
        info!(%keyword, "session ended");
        Ok(())
    }

    pub async fn set_participating(
        &self,
        keyword: &str,
        participating: bool,
    ) -> Result<(), ApiError> {
        let keyword = normalize_keyword(keyword)?;
        let req = self.authed(
            self.http
                .put(self.url(&format!("/session/{keyword}/instructor/participating")))
                .json(&json!({ "participating": participating })),
        )?;
        read_empty(req.send().await?).await
    }

    /// Available prompt topics. Never fails: any error yields the built-in
    /// set.
    pub async fn topics(&self) -> Vec<Topic> {
        match self.fetch_topics().await {
            Ok(tags) if !tags.is_empty() => tags,
            Ok(_) => Topic::builtin(),
            Err(e) => {
                warn!(error = %e, "topic list unavailable, using built-in topics");
                Topic::builtin()
            }
        }
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>, ApiError> {
        let resp = self.http.get(self.url("/session/tags/public")).send().await?;
        let body: TagsResponse = read_json(resp).await?;
        Ok(body.tags)
    }

    // -- Roster -----------------------------------------------------------

    pub async fn list_students(&self, keyword: &str) -> Result<Vec<Participant>, ApiError> {
        let keyword = normalize_keyword(keyword)?;
        let resp = self
            .http
            .get(self.url(&format!("/session/{keyword}/students")))
            .send()
            .await?;
        let body: StudentsResponse = read_json(resp).await?;
        debug!(%keyword, count = body.students.len(), "students listed");
        Ok(body.students)
    }

    /// Adds a student to `keyword`. This is also how a student joins.
    pub async fn add_student(&self, keyword: &str, name: &str) -> Result<Participant, ApiError> {
        let keyword = normalize_keyword(keyword)?;
        let name = normalize_student_name(name)?;
        let resp = self
            .http
            .post(self.url(&format!("/session/{keyword}/students")))
            .json(&json!({ "name": name }))
            .send()
            .await?;
        let participant: Participant = read_json(resp).await?;
        info!(%keyword, participant = %participant.id, "student added");
        Ok(participant)
    }

    /// Removes a student by id. A student the service no longer knows
    /// counts as removed.
    pub async fn remove_student(&self, keyword: &str, id: ParticipantId) -> Result<(), ApiError> {
        let keyword = normalize_keyword(keyword)?;
        let req = self.authed(
            self.http
                .delete(self.url(&format!("/session/{keyword}/students/{}", id.0))),
        )?;
        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(%keyword, participant = %id, "student already gone");
            return Ok(());
        }
        read_empty(resp).await
    }

    /// A student leaving on their own.
    pub async fn leave_session(&self, keyword: &str, username: &str) -> Result<(), ApiError> {
        let keyword = normalize_keyword(keyword)?;
        let resp = self
            .http
            .delete(self.url(&format!(
                "/session/{keyword}/students/{}/leave",
                urlencoding::encode(username.trim())
            )))
            .send()
            .await?;
        read_empty(resp).await?;
        info!(%keyword, "left session");
        Ok(())
    }

    // -- Rounds -----------------------------------------------------------

    pub async fn create_pairings(
        &self,
        keyword: &str,
        prompt_filter: Option<&str>,
    ) -> Result<Vec<PairingEntry>, ApiError> {
        let keyword = normalize_keyword(keyword)?;
        let req = self.authed(
            self.http
                .post(self.url(&format!("/session/{keyword}/pairings-with-prompts")))
                .json(&json!({ "prompt_filter": prompt_filter })),
        )?;
        let body: PairingsResponse = read_json(req.send().await?).await?;
        debug!(%keyword, entries = body.pairings.len(), "pairings received");
        Ok(body.pairings)
    }

    pub async fn begin_discussion(
        &self,
        keyword: &str,
        pairings: &[PairingEntry],
    ) -> Result<(), ApiError> {
        let keyword = normalize_keyword(keyword)?;
        let req = self.authed(
            self.http
                .post(self.url(&format!("/session/{keyword}/begin-discussion")))
                .json(&json!({ "pairing_objects": pairings })),
        )?;
        read_empty(req.send().await?).await
    }

    pub async fn reset_round(&self, keyword: &str) -> Result<(), ApiError> {
        let keyword = normalize_keyword(keyword)?;
        let req = self.authed(
            self.http
                .post(self.url(&format!("/session/{keyword}/reset-round"))),
        )?;
        read_empty(req.send().await?).await
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

/// Maps a non-success response onto [`ApiError`], surfacing the service's
/// `message` (or `msg`) text verbatim.
async fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    warn!(status = status.as_u16(), %message, "request rejected");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Auth(message)),
        _ => Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        }),
    }
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg"]
        .iter()
        .find_map(|key| value.get(key)?.as_str().map(str::to_string))
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let body = check(resp).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

async fn read_empty(resp: Response) -> Result<(), ApiError> {
    check(resp).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Console seam
// ---------------------------------------------------------------------------

impl ClassroomService for ApiClient {
    async fn list_students(&self, keyword: &str) -> Result<Vec<Participant>, ServiceError> {
        Ok(ApiClient::list_students(self, keyword).await?)
    }

    async fn add_student(&self, keyword: &str, name: &str) -> Result<Participant, ServiceError> {
        Ok(ApiClient::add_student(self, keyword, name).await?)
    }

    async fn remove_student(&self, keyword: &str, id: ParticipantId) -> Result<(), ServiceError> {
        Ok(ApiClient::remove_student(self, keyword, id).await?)
    }

    /// The service pairs its own roster, so the console's view is not sent.
    async fn create_pairings(
        &self,
        keyword: &str,
        prompt_filter: Option<&str>,
        _roster: &[Participant],
    ) -> Result<Vec<PairingEntry>, ServiceError> {
        Ok(ApiClient::create_pairings(self, keyword, prompt_filter).await?)
    }

    async fn begin_discussion(
        &self,
        keyword: &str,
        pairings: &[PairingEntry],
    ) -> Result<(), ServiceError> {
        Ok(ApiClient::begin_discussion(self, keyword, pairings).await?)
    }

    async fn reset_round(&self, keyword: &str) -> Result<(), ServiceError> {
        Ok(ApiClient::reset_round(self, keyword).await?)
    }

    async fn end_session(&self, keyword: &str) -> Result<(), ServiceError> {
        Ok(ApiClient::end_session(self, keyword).await?)
    }

    async fn set_participating(
        &self,
        keyword: &str,
        participating: bool,
    ) -> Result<(), ServiceError> {
        Ok(ApiClient::set_participating(self, keyword, participating).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_message_then_msg() {
        assert_eq!(
            error_message(r#"{"message":"Email already registered"}"#).as_deref(),
            Some("Email already registered")
        );
        assert_eq!(
            error_message(r#"{"msg":"Token has expired"}"#).as_deref(),
            Some("Token has expired")
        );
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn test_new_trims_trailing_slashes() {
        let client = ApiClient::new("http://localhost:5000/api//").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
    }
}

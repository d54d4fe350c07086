//! Start-up recovery against stored handles in a `tempfile` directory.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pairup::{ClientConfig, Recovered, recover};
use pairup_protocol::{ClientRole, ParticipantId};
use pairup_session::{LoadOutcome, SessionConfig, SessionManager};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
}

/// Well past the default eight-hour handle lifetime.
fn next_day() -> DateTime<Utc> {
    t0() + Duration::hours(24)
}

async fn setup() -> (MockServer, ClientConfig, SessionManager, TempDir) {
    let api = MockServer::start().await;
    let state = TempDir::new().unwrap();
    let config = ClientConfig {
        api_url: format!("{}/api", api.uri()),
        session: SessionConfig {
            state_dir: state.path().to_path_buf(),
            ..SessionConfig::default()
        },
        ..ClientConfig::default()
    };
    let sessions = SessionManager::new(config.session.clone());
    (api, config, sessions, state)
}

fn store_instructor(sessions: &SessionManager, keyword: Option<&str>) {
    let handle = sessions.issue_instructor("t@school.edu", "tok", t0());
    sessions.establish(&handle).unwrap();
    if let Some(keyword) = keyword {
        sessions.set_keyword(keyword, t0()).unwrap();
    }
}

#[tokio::test]
async fn test_recover_nothing_stored_is_fresh() {
    let (_api, config, _sessions, _dir) = setup().await;
    assert_eq!(recover(&config, t0()).await.unwrap(), Recovered::Fresh);
}

#[tokio::test]
async fn test_recover_active_instructor_resumes_with_keyword() {
    let (_api, config, sessions, _dir) = setup().await;
    store_instructor(&sessions, Some("MATH1"));

    match recover(&config, t0() + Duration::hours(1)).await.unwrap() {
        Recovered::Instructor(handle) => {
            assert_eq!(handle.role, ClientRole::Instructor);
            assert_eq!(handle.keyword.as_deref(), Some("MATH1"));
            assert_eq!(handle.auth_token.as_deref(), Some("tok"));
        }
        other => panic!("expected instructor, got {other:?}"),
    }
}

#[tokio::test]
async fn test_recover_active_student_resumes() {
    let (_api, config, sessions, _dir) = setup().await;
    let handle = sessions.issue_student("MATH1", "alice", ParticipantId(7), t0());
    sessions.establish(&handle).unwrap();

    assert_eq!(
        recover(&config, t0()).await.unwrap(),
        Recovered::Student(handle)
    );
}

#[tokio::test]
async fn test_recover_expired_instructor_ends_session_and_clears() {
    let (api, config, sessions, _dir) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/session/MATH1/end"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&api)
        .await;
    store_instructor(&sessions, Some("MATH1"));

    assert_eq!(recover(&config, next_day()).await.unwrap(), Recovered::Fresh);
    assert_eq!(sessions.load(next_day()).unwrap(), LoadOutcome::Empty);
}

#[tokio::test]
async fn test_recover_expired_instructor_end_failure_still_fresh() {
    let (api, config, sessions, _dir) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/session/MATH1/end"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&api)
        .await;
    store_instructor(&sessions, Some("MATH1"));

    assert_eq!(recover(&config, next_day()).await.unwrap(), Recovered::Fresh);
    assert_eq!(sessions.load(next_day()).unwrap(), LoadOutcome::Empty);
}

#[tokio::test]
async fn test_recover_expired_unreachable_service_still_fresh() {
    let (_api, mut config, sessions, _dir) = setup().await;
    config.api_url = "http://127.0.0.1:1/api".into();
    store_instructor(&sessions, Some("MATH1"));

    assert_eq!(recover(&config, next_day()).await.unwrap(), Recovered::Fresh);
    assert_eq!(sessions.load(next_day()).unwrap(), LoadOutcome::Empty);
}

#[tokio::test]
async fn test_recover_expired_without_keyword_sends_nothing() {
    let (api, config, sessions, _dir) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&api)
        .await;
    store_instructor(&sessions, None);

    assert_eq!(recover(&config, next_day()).await.unwrap(), Recovered::Fresh);
}

#[tokio::test]
async fn test_recover_expired_student_sends_nothing() {
    let (api, config, sessions, _dir) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&api)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&api)
        .await;
    let handle = sessions.issue_student("MATH1", "alice", ParticipantId(7), t0());
    sessions.establish(&handle).unwrap();

    assert_eq!(recover(&config, next_day()).await.unwrap(), Recovered::Fresh);
    assert_eq!(sessions.load(next_day()).unwrap(), LoadOutcome::Empty);
}

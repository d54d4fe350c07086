//! Instructor client end to end: sign in, open a session, receive roster
//! events over the realtime link, start a round, end the session.

use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use pairup::{ClientConfig, ErrorKind, InstructorClient};
use pairup_protocol::{ClientEvent, Participant, ParticipantId, Recipient, ServerEvent};
use pairup_room::{ConsoleSnapshot, SessionPhase};
use pairup_session::{LoadOutcome, SessionConfig, SessionManager};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn joined(id: u64, name: &str) -> ServerEvent {
    ServerEvent::StudentJoined {
        student: Participant {
            id: ParticipantId(id),
            name: name.into(),
            joined_at: Utc::now(),
        },
    }
}

/// A realtime server that answers the instructor handshake with two
/// joins and forwards every later client frame to the test.
async fn classroom() -> (String, mpsc::UnboundedReceiver<ClientEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(frame)) = ws.next().await {
            if !frame.is_text() {
                continue;
            }
            let event: ClientEvent = serde_json::from_slice(&frame.into_data()).unwrap();
            if event.is_handshake() {
                for student in [joined(1, "Ana"), joined(2, "Bo")] {
                    let text = serde_json::to_string(&student).unwrap();
                    ws.send(Message::text(text)).await.unwrap();
                }
            }
            if tx.send(event).is_err() {
                break;
            }
        }
    });

    (url, rx)
}

async fn api() -> MockServer {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/session/MATH1/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"students": []})))
        .mount(&api)
        .await;
    api
}

fn config(api: &MockServer, ws_url: &str, state: &TempDir) -> ClientConfig {
    ClientConfig {
        api_url: format!("{}/api", api.uri()),
        ws_url: Some(ws_url.to_string()),
        session: SessionConfig {
            state_dir: state.path().to_path_buf(),
            ..SessionConfig::default()
        },
        ..ClientConfig::default()
    }
}

async fn next_frame(frames: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    timeout(Duration::from_secs(5), frames.recv())
        .await
        .expect("frame within 5s")
        .expect("server alive")
}

async fn wait_snapshot(
    rx: &mut tokio::sync::watch::Receiver<ConsoleSnapshot>,
    done: impl FnMut(&ConsoleSnapshot) -> bool,
) -> ConsoleSnapshot {
    timeout(Duration::from_secs(5), rx.wait_for(done))
        .await
        .expect("snapshot within 5s")
        .expect("console alive")
        .clone()
}

#[tokio::test]
async fn test_login_bad_credentials_is_auth_error() {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .mount(&api)
        .await;
    let state = TempDir::new().unwrap();

    let config = config(&api, "ws://127.0.0.1:1/ws", &state);

    match InstructorClient::login(&config, "t@school.edu", "nope").await {
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::Auth);
            assert_eq!(e.to_string(), "Invalid credentials");
        }
        Ok(_) => panic!("login should fail"),
    }
}

#[tokio::test]
async fn test_open_session_round_then_end() {
    let api = api().await;
    Mock::given(method("POST"))
        .and(path("/api/session/create"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keyword": "math1"})))
        .expect(1)
        .mount(&api)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/session/MATH1/pairings-with-prompts"))
        .and(body_json(json!({"prompt_filter": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pairings": [
                {"type": "pair", "round_number": 1,
                 "leader": {"id": 1, "name": "Ana"}, "talker": {"id": 2, "name": "Bo"},
                 "prompt": "Best book?"}
            ]
        })))
        .expect(1)
        .mount(&api)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/session/MATH1/end"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&api)
        .await;

    let (ws_url, mut frames) = classroom().await;
    let state = TempDir::new().unwrap();
    let config = config(&api, &ws_url, &state);

    let mut instructor = InstructorClient::login(&config, "t@school.edu", "pw")
        .await
        .unwrap();
    let session = instructor.open_session().await.unwrap();
    assert_eq!(session.keyword(), "MATH1");
    assert_eq!(instructor.keyword(), Some("MATH1"));

    assert_eq!(
        next_frame(&mut frames).await,
        ClientEvent::JoinInstructorRoom {
            keyword: "MATH1".into()
        }
    );

    let mut snapshots = session.console().subscribe();
    wait_snapshot(&mut snapshots, |s| s.roster.len() == 2).await;

    session.console().start(None).await.unwrap();
    let snapshot = session.console().snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Pairing);

    let mut targets = Vec::new();
    for _ in 0..2 {
        match next_frame(&mut frames).await {
            ClientEvent::Relay { to, payload } => {
                assert_eq!(payload.name(), "pairing_assignment");
                targets.push(to);
            }
            other => panic!("expected relay, got {other:?}"),
        }
    }
    targets.sort_by_key(|to| format!("{to:?}"));
    assert_eq!(
        targets,
        vec![
            Recipient::Participant(ParticipantId(1)),
            Recipient::Participant(ParticipantId(2)),
        ]
    );

    instructor.end_session(&session).await.unwrap();
    assert_eq!(
        next_frame(&mut frames).await,
        ClientEvent::Relay {
            to: Recipient::All,
            payload: Box::new(ServerEvent::SessionEnded {}),
        }
    );
    assert_eq!(instructor.keyword(), None);

    let stored = SessionManager::new(config.session.clone());
    match stored.load(Utc::now()).unwrap() {
        LoadOutcome::Active(handle) => assert!(handle.keyword.is_none()),
        other => panic!("login should be kept, got {other:?}"),
    }
}

#[tokio::test]
async fn test_open_session_reuses_stored_keyword() {
    let api = api().await;
    Mock::given(method("POST"))
        .and(path("/api/session/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keyword": "OTHER"})))
        .expect(0)
        .mount(&api)
        .await;

    let (ws_url, mut frames) = classroom().await;
    let state = TempDir::new().unwrap();
    let config = config(&api, &ws_url, &state);

    let sessions = SessionManager::new(config.session.clone());
    sessions
        .establish(&sessions.issue_instructor("t@school.edu", "tok", Utc::now()))
        .unwrap();
    let handle = sessions.set_keyword("MATH1", Utc::now()).unwrap();

    let mut instructor = InstructorClient::from_handle(&config, handle).unwrap();
    let session = instructor.open_session().await.unwrap();

    assert_eq!(session.keyword(), "MATH1");
    assert_eq!(
        next_frame(&mut frames).await,
        ClientEvent::JoinInstructorRoom {
            keyword: "MATH1".into()
        }
    );
    session.close().await;
}

#[tokio::test]
async fn test_logout_clears_local_state_only() {
    let api = api().await;
    Mock::given(method("POST"))
        .and(path("/api/session/MATH1/end"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&api)
        .await;
    let state = TempDir::new().unwrap();
    let config = config(&api, "ws://127.0.0.1:1/ws", &state);

    let instructor = InstructorClient::login(&config, "t@school.edu", "pw")
        .await
        .unwrap();
    instructor.logout().unwrap();

    let stored = SessionManager::new(config.session.clone());
    assert_eq!(stored.load(Utc::now()).unwrap(), LoadOutcome::Empty);
}

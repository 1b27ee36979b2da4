mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use yakapi::publish::{PublishError, Publisher};
use yakapi::retry::RetryPolicy;
use yakapi::{Client, ClientConfig, ClientError};

use common::{refused_base_url, spawn_server, MockServer};

#[derive(Clone, Debug)]
struct Captured {
    content_type: Option<String>,
    user_agent: Option<String>,
    body: Bytes,
}

impl Captured {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("captured body is json")
    }
}

/// Records every POST and answers with the scripted statuses, then 200.
#[derive(Clone, Default)]
struct Recorder {
    captured: Arc<Mutex<Vec<Captured>>>,
    script: Arc<Mutex<Vec<StatusCode>>>,
    posts: Arc<AtomicUsize>,
}

impl Recorder {
    fn failing_with(statuses: Vec<StatusCode>) -> Self {
        let recorder = Self::default();
        *recorder.script.lock().expect("script lock") = statuses;
        recorder
    }

    fn captured(&self) -> Vec<Captured> {
        self.captured.lock().expect("captured lock").clone()
    }

    fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    fn app(&self) -> Router {
        Router::new()
            .route("/v1/stream/{name}", post(record_post))
            .with_state(self.clone())
    }
}

async fn record_post(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    recorder.posts.fetch_add(1, Ordering::SeqCst);
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    recorder.captured.lock().expect("captured lock").push(Captured {
        content_type: header(CONTENT_TYPE),
        user_agent: header(USER_AGENT),
        body,
    });

    let mut script = recorder.script.lock().expect("script lock");
    if script.is_empty() {
        StatusCode::OK
    } else {
        script.remove(0)
    }
}

#[test]
fn structured_event_without_id_gets_one() {
    let recorder = Recorder::default();
    let server = MockServer::start(recorder.app());
    let client = Client::new(server.base_url()).expect("client");

    let event = client
        .publish("telemetry", json!({"uptime": "12.5"}))
        .expect("publish");
    let id = event.id().expect("assigned id").to_string();
    assert!(!id.is_empty());
    assert_eq!(event.stream(), "telemetry");

    let captured = recorder.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].content_type.as_deref(), Some("application/json"));
    let body = captured[0].json();
    assert_eq!(body["id"], json!(id));
    assert_eq!(body["uptime"], json!("12.5"));
}

#[test]
fn generated_ids_are_unique_per_publish() {
    let recorder = Recorder::default();
    let server = MockServer::start(recorder.app());
    let client = Client::new(server.base_url()).expect("client");

    for _ in 0..2 {
        client
            .publish("motor_a", json!({"power": 50}))
            .expect("publish");
    }

    let ids: Vec<String> = recorder
        .captured()
        .iter()
        .map(|c| c.json()["id"].as_str().expect("id").to_string())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn explicit_id_is_preserved() {
    let recorder = Recorder::default();
    let server = MockServer::start(recorder.app());
    let client = Client::new(server.base_url()).expect("client");

    for _ in 0..2 {
        let event = client
            .publish("ci", json!({"id": "cmd-7", "command": "fwd 5"}))
            .expect("publish");
        assert_eq!(event.id(), Some("cmd-7"));
    }

    for captured in recorder.captured() {
        assert_eq!(captured.json()["id"], json!("cmd-7"));
    }
}

#[test]
fn text_payload_is_sent_verbatim_without_id() {
    let recorder = Recorder::default();
    let server = MockServer::start(recorder.app());
    let client = Client::new(server.base_url()).expect("client");

    let event = client.publish("ci", "lt 90").expect("publish");
    assert_eq!(event.id(), None);

    let captured = recorder.captured();
    assert_eq!(captured[0].content_type.as_deref(), Some("text/plain"));
    assert_eq!(&captured[0].body[..], b"lt 90");
}

#[test]
fn requests_carry_user_agent() {
    let recorder = Recorder::default();
    let server = MockServer::start(recorder.app());

    let default_client = Client::new(server.base_url()).expect("client");
    default_client.publish("ci", "noop").expect("publish");

    let custom_client =
        Client::with_config(ClientConfig::new(server.base_url()).with_user_agent("rover-7/2.1"))
            .expect("client");
    custom_client.publish("ci", "noop").expect("publish");

    let captured = recorder.captured();
    assert!(captured[0]
        .user_agent
        .as_deref()
        .is_some_and(|ua| ua.starts_with("yakapi/")));
    assert_eq!(captured[1].user_agent.as_deref(), Some("rover-7/2.1"));
}

#[test]
fn server_error_fails_without_retry() {
    let recorder = Recorder::failing_with(vec![StatusCode::INTERNAL_SERVER_ERROR; 5]);
    let server = MockServer::start(recorder.app());
    let client = Client::new(server.base_url()).expect("client");

    let err = client
        .publish("telemetry", json!({"uptime": "1"}))
        .expect_err("500 must fail");
    match err {
        ClientError::Publish(PublishError::HttpStatus { status, .. }) => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(recorder.posts(), 1);
}

#[test]
fn transport_retry_policy_bounds_attempts() {
    let recorder = Recorder::failing_with(vec![StatusCode::INTERNAL_SERVER_ERROR; 10]);
    let server = MockServer::start(recorder.app());
    let client = Client::with_config(
        ClientConfig::new(server.base_url())
            .with_publish_retry(RetryPolicy::fixed(3, Duration::from_millis(10))),
    )
    .expect("client");

    let err = client
        .publish("telemetry", json!({"uptime": "1"}))
        .expect_err("persistent 500 must fail");
    assert!(matches!(err, ClientError::Publish(PublishError::HttpStatus { .. })));
    assert_eq!(recorder.posts(), 3);
}

#[test]
fn transport_retry_recovers_and_keeps_the_same_id() {
    let recorder = Recorder::failing_with(vec![
        StatusCode::SERVICE_UNAVAILABLE,
        StatusCode::SERVICE_UNAVAILABLE,
    ]);
    let server = MockServer::start(recorder.app());
    let client = Client::with_config(
        ClientConfig::new(server.base_url())
            .with_publish_retry(RetryPolicy::fixed(5, Duration::from_millis(10))),
    )
    .expect("client");

    let event = client
        .publish("telemetry", json!({"uptime": "2"}))
        .expect("third attempt succeeds");
    assert_eq!(recorder.posts(), 3);

    let ids: HashSet<String> = recorder
        .captured()
        .iter()
        .map(|c| c.json()["id"].as_str().expect("id").to_string())
        .collect();
    assert_eq!(ids.len(), 1);
    assert!(ids.contains(event.id().expect("id")));
}

#[test]
fn client_errors_are_not_retried() {
    let recorder = Recorder::failing_with(vec![StatusCode::BAD_REQUEST; 3]);
    let server = MockServer::start(recorder.app());
    let client = Client::with_config(
        ClientConfig::new(server.base_url())
            .with_publish_retry(RetryPolicy::fixed(3, Duration::from_millis(10))),
    )
    .expect("client");

    assert!(client.publish("ci", "bogus").is_err());
    assert_eq!(recorder.posts(), 1);
}

#[test]
fn unreachable_service_is_a_transport_error() {
    let client = Client::new(refused_base_url()).expect("client");
    let err = client.publish("ci", "noop").expect_err("refused");
    assert!(matches!(err, ClientError::Publish(PublishError::Transport(_))));
}

#[test]
fn concurrent_publishes_share_one_client() {
    let recorder = Recorder::default();
    let server = MockServer::start(recorder.app());
    let client = Client::new(server.base_url()).expect("client");

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let client = &client;
            scope.spawn(move || {
                client
                    .publish("telemetry", json!({"worker": worker}))
                    .expect("publish");
            });
        }
    });

    let ids: HashSet<String> = recorder
        .captured()
        .iter()
        .map(|c| c.json()["id"].as_str().expect("id").to_string())
        .collect();
    assert_eq!(ids.len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_publisher_posts_to_named_stream() {
    let recorder = Recorder::default();
    let (addr, shutdown_tx, server_task) = spawn_server(recorder.app()).await;

    let publisher =
        Publisher::from_config(&ClientConfig::new(format!("http://{addr}"))).expect("publisher");
    let event = publisher
        .publish("motor_b", json!({"power": -20}))
        .await
        .expect("publish");
    assert_eq!(event.stream(), "motor_b");

    let captured = recorder.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].json()["power"], json!(-20));

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

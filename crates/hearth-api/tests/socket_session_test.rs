// End-to-end tests for `Connection` against an in-process socket hub.
#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hearth_api::{
    Connection, ConnectionOptions, ConnectionState, CredentialProvider, Error, OAuthRefresher,
    ReconnectConfig, StaticToken,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Reply that makes the hub drop the transport.
const HANG_UP: Value = Value::Null;

/// Start a hub that answers each inbound frame with `respond(frame)`.
async fn spawn_hub<F>(respond: F) -> Url
where
    F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let challenge = json!({ "type": "auth_required", "ha_version": "test" });
                if ws.send(Message::text(challenge.to_string())).await.is_err() {
                    return;
                }
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    for reply in respond(&frame) {
                        if reply == HANG_UP {
                            return;
                        }
                        if ws.send(Message::text(reply.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    Url::parse(&format!("ws://{addr}/api/websocket")).unwrap()
}

/// Standard auth handling: `good` is accepted, anything else rejected.
fn authenticate(frame: &Value) -> Option<Vec<Value>> {
    if frame["type"] != "auth" {
        return None;
    }
    if frame["access_token"] == "good" {
        Some(vec![json!({ "type": "auth_ok", "ha_version": "test" })])
    } else {
        Some(vec![json!({ "type": "auth_invalid", "message": "Invalid access token" })])
    }
}

fn ok_result(frame: &Value, result: Value) -> Value {
    json!({ "id": frame["id"], "type": "result", "success": true, "result": result })
}

fn connection(endpoint: Url, token: &str) -> Connection {
    connection_with(
        endpoint,
        Arc::new(StaticToken::new(SecretString::from(token.to_string()))),
    )
}

/// Connection with a short reconnect delay so retries happen quickly.
fn connection_with(endpoint: Url, credential: Arc<dyn CredentialProvider>) -> Connection {
    let conn = Connection::new(ConnectionOptions {
        heartbeat_interval: None,
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            max_retries: None,
        },
        ..ConnectionOptions::default()
    });
    conn.configure(endpoint, credential);
    conn
}

/// Token endpoint handing out `tokens` in order, the last one repeatedly.
async fn token_server(tokens: &[&str]) -> (MockServer, OAuthRefresher) {
    let server = MockServer::start().await;
    let (last, first) = tokens.split_last().unwrap();
    for token in first {
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "expires_in": 1800
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": last,
            "expires_in": 1800
        })))
        .mount(&server)
        .await;

    let origin = Url::parse(&format!("{}/", server.uri())).unwrap();
    let refresher = OAuthRefresher::new(
        reqwest::Client::new(),
        &origin,
        "http://hearth.app/",
        SecretString::from("refresh-abc".to_string()),
    )
    .unwrap();
    (server, refresher)
}

/// Hub that records every token it is offered.
async fn recording_hub() -> (Url, Arc<Mutex<Vec<String>>>) {
    let offered = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&offered);
    let endpoint = spawn_hub(move |frame| {
        if frame["type"] == "auth" {
            let token = frame["access_token"].as_str().unwrap_or_default().to_owned();
            seen.lock().unwrap().push(token);
        }
        authenticate(frame).unwrap_or_default()
    })
    .await;
    (endpoint, offered)
}

const WAIT: Duration = Duration::from_secs(5);

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_authenticates_and_lists_labels() {
    let endpoint = spawn_hub(|frame| {
        if let Some(reply) = authenticate(frame) {
            return reply;
        }
        match frame["type"].as_str() {
            Some("config/label_registry/list") => vec![ok_result(
                frame,
                json!([{ "label_id": "hearth_order-000010", "name": "hearth_order-000010" }]),
            )],
            _ => Vec::new(),
        }
    })
    .await;

    let conn = connection(endpoint, "good");
    conn.connect().await.unwrap();
    conn.wait_authenticated(WAIT).await.unwrap();

    let labels = conn.list_labels().await.unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].label_id, "hearth_order-000010");

    conn.disconnect().await;
}

#[tokio::test]
async fn test_static_token_rejection_is_terminal() {
    let endpoint = spawn_hub(|frame| authenticate(frame).unwrap_or_default()).await;

    let conn = connection(endpoint, "wrong");
    conn.connect().await.unwrap();

    let err = conn.wait_authenticated(WAIT).await.unwrap_err();
    assert!(matches!(err, Error::AuthInvalid { .. }));
    assert!(matches!(
        conn.current_state(),
        ConnectionState::AuthFailed { .. }
    ));
}

#[tokio::test]
async fn test_refreshable_token_retries_once_after_rejection() {
    let (endpoint, offered) = recording_hub().await;
    let (_server, refresher) = token_server(&["stale", "good"]).await;

    let conn = connection_with(endpoint, Arc::new(refresher));
    conn.connect().await.unwrap();
    conn.wait_authenticated(WAIT).await.unwrap();

    assert_eq!(*offered.lock().unwrap(), vec!["stale", "good"]);
    conn.disconnect().await;
}

#[tokio::test]
async fn test_refreshable_token_rejected_twice_is_terminal() {
    let (endpoint, offered) = recording_hub().await;
    let (server, refresher) = token_server(&["stale"]).await;

    let conn = connection_with(endpoint, Arc::new(refresher));
    conn.connect().await.unwrap();

    let err = conn.wait_authenticated(WAIT).await.unwrap_err();
    assert!(matches!(err, Error::AuthInvalid { .. }));
    assert!(matches!(
        conn.current_state(),
        ConnectionState::AuthFailed { .. }
    ));
    assert_eq!(*offered.lock().unwrap(), vec!["stale", "stale"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

// ── Reconnect ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnect_reauthenticates_with_fresh_ids() {
    let auths = Arc::new(AtomicUsize::new(0));
    let hung_up = Arc::new(AtomicBool::new(false));
    let state_ids = Arc::new(Mutex::new(Vec::new()));
    let (a, h, s) = (Arc::clone(&auths), Arc::clone(&hung_up), Arc::clone(&state_ids));
    let endpoint = spawn_hub(move |frame| {
        if let Some(reply) = authenticate(frame) {
            a.fetch_add(1, Ordering::SeqCst);
            return reply;
        }
        match frame["type"].as_str() {
            Some("get_states") => {
                s.lock().unwrap().push(frame["id"].as_u64().unwrap());
                if h.swap(true, Ordering::SeqCst) {
                    vec![ok_result(frame, json!([]))]
                } else {
                    vec![HANG_UP]
                }
            }
            _ => Vec::new(),
        }
    })
    .await;

    let conn = connection(endpoint, "good");
    conn.connect().await.unwrap();
    conn.wait_authenticated(WAIT).await.unwrap();

    let first = tokio::time::timeout(WAIT, conn.get_states()).await.unwrap();
    assert!(matches!(first, Err(Error::Disconnected)));

    // Requests fail fast while the loop reconnects, then go through.
    let states = tokio::time::timeout(WAIT, async {
        loop {
            match conn.get_states().await {
                Ok(states) => return states,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    })
    .await
    .unwrap();

    assert!(states.is_empty());
    assert_eq!(auths.load(Ordering::SeqCst), 2);
    let ids = state_ids.lock().unwrap().clone();
    assert_eq!(ids.len(), 2);
    assert!(ids[1] > ids[0], "ids must keep increasing across transports: {ids:?}");
    assert!(conn.correlator().is_empty());
    conn.disconnect().await;
}

// ── Correlation ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_remote_failure_surfaces_code() {
    let endpoint = spawn_hub(|frame| {
        if let Some(reply) = authenticate(frame) {
            return reply;
        }
        vec![json!({
            "id": frame["id"],
            "type": "result",
            "success": false,
            "error": { "code": "not_found", "message": "Label not found" }
        })]
    })
    .await;

    let conn = connection(endpoint, "good");
    conn.connect().await.unwrap();
    conn.wait_authenticated(WAIT).await.unwrap();

    let err = conn.delete_label("missing").await.unwrap_err();
    assert_eq!(err.remote_code(), Some("not_found"));
    conn.disconnect().await;
}

#[tokio::test]
async fn test_dropped_transport_fails_pending_request() {
    let endpoint = spawn_hub(|frame| {
        if let Some(reply) = authenticate(frame) {
            return reply;
        }
        match frame["type"].as_str() {
            Some("get_states") => vec![HANG_UP],
            _ => Vec::new(),
        }
    })
    .await;

    let conn = connection(endpoint, "good");
    conn.connect().await.unwrap();
    conn.wait_authenticated(WAIT).await.unwrap();

    let result = tokio::time::timeout(WAIT, conn.get_states()).await.unwrap();
    assert!(matches!(result, Err(Error::Disconnected)));
    assert!(conn.correlator().is_empty());
    conn.disconnect().await;
}

// ── Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_events_reach_subscribers() {
    let endpoint = spawn_hub(|frame| {
        if let Some(reply) = authenticate(frame) {
            return reply;
        }
        match frame["type"].as_str() {
            Some("subscribe_events") => vec![
                ok_result(frame, Value::Null),
                json!({
                    "id": frame["id"],
                    "type": "event",
                    "event": {
                        "event_type": "state_changed",
                        "data": {
                            "entity_id": "light.desk",
                            "new_state": { "entity_id": "light.desk", "state": "on" }
                        }
                    }
                }),
            ],
            _ => Vec::new(),
        }
    })
    .await;

    let conn = connection(endpoint, "good");
    let mut events = conn.subscribe();
    conn.connect().await.unwrap();
    conn.wait_authenticated(WAIT).await.unwrap();

    let subscription = conn.subscribe_events("state_changed").await.unwrap();
    let frame = tokio::time::timeout(WAIT, events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.subscription_id, subscription);
    assert_eq!(frame.event.event_type, "state_changed");
    assert_eq!(frame.event.data["entity_id"], "light.desk");
    conn.disconnect().await;
}

// End-to-end tests for `Session` against an in-process hub.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use hearth_core::{
    Credential, MemoryStore, RemoteWrite, Scope, Session, SessionConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(5);

/// Registry contents and recorded traffic of the fake hub.
#[derive(Default)]
struct Hub {
    floors: Vec<Value>,
    areas: Vec<Value>,
    entities: Vec<Value>,
    states: Vec<Value>,
    labels: Vec<Value>,
    service_calls: Vec<Value>,
    state_subscription: Option<Value>,
    /// Ids of every `state_changed` subscription, across transports.
    state_subscription_ids: Vec<u64>,
    /// Drop the transport on the next frame of this type.
    hang_up_on: Option<String>,
    /// State pushed back after every service call.
    push_after_call: Option<Value>,
}

/// Reply that makes the hub drop the transport.
const HANG_UP: Value = Value::Null;

fn ok(frame: &Value, result: Value) -> Value {
    json!({ "id": frame["id"], "type": "result", "success": true, "result": result })
}

fn respond(hub: &Mutex<Hub>, frame: &Value) -> Vec<Value> {
    let mut hub = hub.lock().unwrap();
    let kind = frame["type"].as_str().unwrap_or_default();
    if hub.hang_up_on.as_deref() == Some(kind) {
        hub.hang_up_on = None;
        return vec![HANG_UP];
    }
    match kind {
        "auth" => vec![json!({ "type": "auth_ok", "ha_version": "test" })],
        "subscribe_events" => {
            if frame["event_type"] == "state_changed" {
                hub.state_subscription = Some(frame["id"].clone());
                hub.state_subscription_ids.push(frame["id"].as_u64().unwrap());
            }
            vec![ok(frame, Value::Null)]
        }
        "get_states" => vec![ok(frame, json!(hub.states))],
        "config/entity_registry/list" => vec![ok(frame, json!(hub.entities))],
        "config/area_registry/list" => vec![ok(frame, json!(hub.areas))],
        "config/floor_registry/list" => vec![ok(frame, json!(hub.floors))],
        "config/label_registry/list" => vec![ok(frame, json!(hub.labels))],
        "config/label_registry/create" => {
            let name = frame["name"].as_str().unwrap_or_default();
            let label = json!({ "label_id": name.replace('-', "_"), "name": name });
            hub.labels.push(label.clone());
            vec![ok(frame, label)]
        }
        "config/area_registry/update" => {
            let area = hub
                .areas
                .iter_mut()
                .find(|a| a["area_id"] == frame["area_id"])
                .unwrap();
            area["labels"] = frame["labels"].clone();
            vec![ok(frame, area.clone())]
        }
        "config/entity_registry/update" => {
            let entity = hub
                .entities
                .iter_mut()
                .find(|e| e["entity_id"] == frame["entity_id"])
                .unwrap();
            entity["labels"] = frame["labels"].clone();
            vec![ok(frame, json!({ "entity_entry": entity.clone() }))]
        }
        "call_service" => {
            hub.service_calls.push(frame.clone());
            let mut replies = vec![ok(frame, json!({}))];
            if let (Some(sub), Some(state)) = (&hub.state_subscription, &hub.push_after_call) {
                replies.push(json!({
                    "id": sub,
                    "type": "event",
                    "event": {
                        "event_type": "state_changed",
                        "data": { "entity_id": state["entity_id"], "new_state": state }
                    }
                }));
            }
            replies
        }
        _ => Vec::new(),
    }
}

async fn spawn_hub(hub: Hub) -> (Url, Arc<Mutex<Hub>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hub = Arc::new(Mutex::new(hub));
    let shared = Arc::clone(&hub);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let hub = Arc::clone(&shared);
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
                    for reply in respond(&hub, &frame) {
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

    (Url::parse(&format!("ws://{addr}/api/websocket")).unwrap(), hub)
}

fn home() -> Hub {
    Hub {
        floors: vec![
            json!({ "floor_id": "ground", "name": "Ground", "level": 0 }),
            json!({ "floor_id": "first", "name": "First", "level": 1 }),
        ],
        areas: vec![
            json!({ "area_id": "bedroom", "name": "Bedroom", "floor_id": "first", "labels": [] }),
            json!({ "area_id": "office", "name": "Office", "floor_id": "ground", "labels": [] }),
            json!({ "area_id": "kitchen", "name": "Kitchen", "floor_id": "ground", "labels": [] }),
        ],
        entities: vec![
            json!({ "entity_id": "light.desk", "area_id": "office", "name": "Desk", "labels": [] }),
            json!({ "entity_id": "light.shelf", "area_id": "office", "name": "Shelf", "labels": [] }),
        ],
        states: vec![
            json!({ "entity_id": "light.desk", "state": "off" }),
            json!({ "entity_id": "light.shelf", "state": "on" }),
        ],
        ..Hub::default()
    }
}

async fn open_session(endpoint: Url) -> Session {
    let mut config = SessionConfig::new(
        endpoint,
        Credential::Token(SecretString::from("good".to_string())),
    );
    config.heartbeat_interval = None;
    config.reconnect.initial_delay = Duration::from_millis(20);
    let session = Session::open(config, Arc::new(MemoryStore::new()))
        .await
        .unwrap();
    session.connect().await.unwrap();
    session.wait_ready(WAIT).await.unwrap();
    session
}

/// Poll `check` until it holds or the wait expires.
async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

// ── Registry ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_loads_registry_in_display_order() {
    let (endpoint, _hub) = spawn_hub(home()).await;
    let session = open_session(endpoint).await;

    let rooms: Vec<String> = session
        .rooms()
        .await
        .unwrap()
        .iter()
        .map(|a| a.area_id.clone())
        .collect();
    assert_eq!(rooms, vec!["kitchen", "office", "bedroom"]);

    let lights = session.room_entities("office", "light").await.unwrap();
    assert_eq!(lights.len(), 2);
    assert_eq!(lights[0].entity_id, "light.desk");

    let layout = session.cached_layout().await.unwrap().unwrap();
    assert_eq!(layout.rooms.len(), 3);
    assert_eq!(layout.rooms[1].domains["light"], vec!["light.desk", "light.shelf"]);

    session.disconnect().await;
}

// ── Toggle ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_toggle_shows_prediction_before_confirmation() {
    let (endpoint, hub) = spawn_hub(home()).await;
    let session = open_session(endpoint).await;

    let predicted = session.toggle("light.desk").unwrap();
    assert_eq!(predicted, "on");
    assert_eq!(session.effective_state("light.desk").as_deref(), Some("on"));
    assert_eq!(
        session.store().entity("light.desk").unwrap().state.as_deref(),
        Some("off")
    );

    eventually(|| !hub.lock().unwrap().service_calls.is_empty()).await;
    let call = hub.lock().unwrap().service_calls[0].clone();
    assert_eq!(call["domain"], "light");
    assert_eq!(call["service"], "turn_on");
    assert_eq!(call["target"]["entity_id"], "light.desk");

    session.disconnect().await;
}

#[tokio::test]
async fn test_disagreeing_state_frame_overrules_prediction() {
    let mut home = home();
    home.push_after_call = Some(json!({ "entity_id": "light.desk", "state": "off" }));
    let (endpoint, _hub) = spawn_hub(home).await;
    let session = open_session(endpoint).await;

    session.toggle("light.desk").unwrap();
    eventually(|| session.overlay().is_empty()).await;

    assert_eq!(session.effective_state("light.desk").as_deref(), Some("off"));
    session.disconnect().await;
}

#[tokio::test]
async fn test_toggle_unknown_entity_is_not_found() {
    let (endpoint, _hub) = spawn_hub(home()).await;
    let session = open_session(endpoint).await;

    let err = session.toggle("light.missing").unwrap_err();
    assert!(matches!(err, hearth_core::CoreError::NotFound { .. }));
    session.disconnect().await;
}

// ── Sync ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_order_write_is_mirrored_onto_area_labels() {
    let (endpoint, hub) = spawn_hub(home()).await;
    let session = open_session(endpoint).await;

    session.sync().set_sync_enabled(true).await.unwrap();
    let outcome = session
        .sync()
        .set_order(&Scope::Rooms, "office", 10)
        .await
        .unwrap();

    assert_eq!(outcome.remote, RemoteWrite::Mirrored);
    assert_eq!(
        session.store().area("office").unwrap().labels,
        vec!["hearth_order_000010".to_string()]
    );
    let hub = hub.lock().unwrap();
    let office = hub.areas.iter().find(|a| a["area_id"] == "office").unwrap();
    assert_eq!(office["labels"], json!(["hearth_order_000010"]));
}

#[tokio::test]
async fn test_first_connect_adopts_existing_labels() {
    let mut home = home();
    home.labels = vec![json!({ "label_id": "hearth_order_000020", "name": "hearth_order-000020" })];
    home.areas[2]["labels"] = json!(["hearth_order_000020"]);
    let (endpoint, _hub) = spawn_hub(home).await;
    let session = open_session(endpoint).await;

    assert!(session.sync().sync_enabled());
    assert_eq!(
        session.sync().get_order(&Scope::Rooms, "kitchen").await.unwrap(),
        Some(20)
    );
    session.disconnect().await;
}

// ── Reconnect ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnect_resubscribes_and_routes_new_events() {
    let mut home = home();
    home.push_after_call = Some(json!({ "entity_id": "light.desk", "state": "on" }));
    let (endpoint, hub) = spawn_hub(home).await;
    let session = open_session(endpoint).await;
    assert_eq!(hub.lock().unwrap().state_subscription_ids.len(), 1);

    hub.lock().unwrap().hang_up_on = Some("get_states".to_owned());
    assert!(session.full_refresh().await.is_err());

    eventually(|| hub.lock().unwrap().state_subscription_ids.len() == 2).await;
    session.wait_ready(WAIT).await.unwrap();
    let ids = hub.lock().unwrap().state_subscription_ids.clone();
    assert!(ids[1] > ids[0], "subscription ids must not be reused: {ids:?}");

    // State pushed under the new subscription still reaches the store.
    session.toggle("light.desk").unwrap();
    eventually(|| {
        session.store().entity("light.desk").unwrap().state.as_deref() == Some("on")
    })
    .await;
    session.disconnect().await;
}

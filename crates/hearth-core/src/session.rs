// ── Session ──
//
// One constructed session per hub. Owns the connection, the registry
// store, the optimistic overlay and the sync service, and wires them
// together with background tasks: a supervisor that runs a full refresh
// after every authentication, and a bridge that routes push events into
// the store.

use std::sync::Arc;
use std::time::Duration;

use hearth_api::registry::CallService;
use hearth_api::transport::{TlsMode, TransportConfig, http_origin};
use hearth_api::{
    Connection, ConnectionOptions, ConnectionState, CredentialProvider, EventFrame,
    OAuthRefresher, StateChangedData, StaticToken,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Credential, SessionConfig, TlsVerification};
use crate::error::CoreError;
use crate::layout::{LayoutSnapshot, order_entities, order_rooms};
use crate::model::{Area, Entity, predict_toggle, toggle_service};
use crate::overlay::OptimisticOverlay;
use crate::order::OrderEngine;
use crate::store::{RegistrySnapshot, RegistryStore};
use crate::sync::{HubRegistry, KeyValueStore, LabelCodec, OrderSyncService, Scope};

/// Push events the session subscribes to after each authentication.
const SUBSCRIBED_EVENTS: [&str; 5] = [
    "state_changed",
    "entity_registry_updated",
    "area_registry_updated",
    "floor_registry_updated",
    "label_registry_updated",
];

const MIN_PURGE_INTERVAL: Duration = Duration::from_millis(250);

/// Cheaply cloneable handle to one hub session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    connection: Connection,
    store: Arc<RegistryStore>,
    overlay: Arc<OptimisticOverlay>,
    storage: Arc<dyn KeyValueStore>,
    sync: Arc<OrderSyncService>,
    /// `true` once the store has been refreshed since the last authentication.
    ready: watch::Sender<bool>,
    cancel: CancellationToken,
    /// Child token for the current connection; replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Build a session. Does NOT connect; call [`connect()`](Self::connect).
    pub async fn open(
        config: SessionConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self, CoreError> {
        let connection = Connection::new(ConnectionOptions {
            request_timeout: config.request_timeout,
            reconnect: config.reconnect.clone(),
            heartbeat_interval: config.heartbeat_interval,
        });
        connection.configure(config.url.clone(), build_credential(&config)?);

        let store = Arc::new(RegistryStore::new());
        let remote = Arc::new(HubRegistry::new(connection.clone(), Arc::clone(&store)));
        let sync = OrderSyncService::open(
            Arc::clone(&storage),
            remote,
            LabelCodec::new(config.label_prefix.clone()),
            OrderEngine::new(config.order),
        )
        .await?;

        let (ready, _) = watch::channel(false);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                connection,
                store,
                overlay: Arc::new(OptimisticOverlay::new()),
                storage,
                sync: Arc::new(sync),
                ready,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start the socket and the background tasks.
    ///
    /// Returns once the connection loop is running; use
    /// [`wait_ready()`](Self::wait_ready) to wait for the first refresh.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let child = {
            let mut guard = self.inner.cancel_child.lock().await;
            if guard.is_cancelled() {
                *guard = self.inner.cancel.child_token();
            }
            guard.clone()
        };

        let mut handles = self.inner.task_handles.lock().await;
        if handles.iter().any(|h| !h.is_finished()) {
            debug!("session already running");
            return Ok(());
        }
        handles.clear();

        // Subscribe before connecting so no early frame is missed.
        let events = self.inner.connection.subscribe();
        handles.push(tokio::spawn(event_bridge_task(
            self.clone(),
            events,
            child.clone(),
        )));
        handles.push(tokio::spawn(supervisor_task(self.clone(), child)));
        drop(handles);

        self.inner.connection.connect().await?;
        info!(url = %self.inner.config.url, "session started");
        Ok(())
    }

    /// Wait for authentication and the first full refresh.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), CoreError> {
        self.inner.connection.wait_authenticated(timeout).await?;

        let mut ready = self.inner.ready.subscribe();
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        tokio::time::timeout(timeout, ready.wait_for(|r| *r))
            .await
            .map_err(|_| CoreError::Timeout { timeout_ms })?
            .map_err(|_| CoreError::Disconnected)?;
        Ok(())
    }

    /// Stop background tasks and close the socket.
    pub async fn disconnect(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.connection.disconnect().await;
        self.inner.ready.send_replace(false);
        debug!("session disconnected");
    }

    /// Replace the store from the five registry lists.
    pub async fn full_refresh(&self) -> Result<(), CoreError> {
        let conn = &self.inner.connection;
        let (entities, states, areas, floors, labels) = tokio::join!(
            conn.list_entity_registry(),
            conn.get_states(),
            conn.list_areas(),
            conn.list_floors(),
            conn.list_labels(),
        );
        self.inner.store.apply_snapshot(RegistrySnapshot {
            entities: entities?,
            states: states?,
            areas: areas?,
            floors: floors?,
            labels: labels?,
        });
        Ok(())
    }

    // ── Device commands ──────────────────────────────────────────────

    /// Toggle an entity optimistically.
    ///
    /// The predicted state shows immediately through
    /// [`effective_state()`](Self::effective_state); the service call is
    /// issued in the background. Returns the predicted state.
    pub fn toggle(&self, entity_id: &str) -> Result<String, CoreError> {
        if !self.inner.connection.current_state().is_authenticated() {
            return Err(CoreError::Disconnected);
        }
        let entity = self
            .inner
            .store
            .entity(entity_id)
            .ok_or_else(|| CoreError::not_found("Entity", entity_id))?;

        let current = self
            .effective_state(entity_id)
            .ok_or_else(|| CoreError::Validation {
                message: format!("{entity_id} has no state to toggle"),
            })?;
        let predicted = predict_toggle(&current).ok_or_else(|| CoreError::Validation {
            message: format!("cannot toggle {entity_id} from state '{current}'"),
        })?;
        let domain = entity.domain_kind();
        let service = toggle_service(&domain, predicted).ok_or_else(|| CoreError::Validation {
            message: format!("{domain} entities cannot be toggled"),
        })?;

        self.inner
            .overlay
            .set(entity_id, predicted, self.inner.config.overlay_ttl);

        let command = CallService::for_entity(entity.domain(), service, entity_id);
        let connection = self.inner.connection.clone();
        let overlay = Arc::clone(&self.inner.overlay);
        let id = entity_id.to_owned();
        tokio::spawn(async move {
            if let Err(e) = connection.call_service(&command).await {
                warn!(entity_id = %id, error = %e, "toggle failed, dropping prediction");
                overlay.clear(&id);
            }
        });

        debug!(entity_id, service, predicted, "toggle issued");
        Ok(predicted.to_owned())
    }

    /// Display state: the live prediction if any, otherwise the real state.
    pub fn effective_state(&self, entity_id: &str) -> Option<String> {
        let real = self.inner.store.entity(entity_id).and_then(|e| e.state.clone());
        self.inner.overlay.effective(entity_id, real.as_deref())
    }

    // ── Ordered views ────────────────────────────────────────────────

    /// Areas in display order.
    pub async fn rooms(&self) -> Result<Vec<Arc<Area>>, CoreError> {
        let ranks = self.inner.sync.order_map(&Scope::Rooms).await?;
        Ok(order_rooms(
            &self.inner.store.areas_snapshot(),
            &self.inner.store.floors_snapshot(),
            &ranks,
        ))
    }

    /// Visible entities of one room and domain in display order.
    pub async fn room_entities(
        &self,
        area_id: &str,
        domain: &str,
    ) -> Result<Vec<Arc<Entity>>, CoreError> {
        let ranks = self
            .inner
            .sync
            .order_map(&Scope::room_domain(area_id, domain))
            .await?;
        let hidden = self.inner.sync.hidden().await?;
        Ok(order_entities(
            &self.inner.store.entities_snapshot(),
            area_id,
            domain,
            &ranks,
            &hidden,
        ))
    }

    /// Last cached layout, available before the socket authenticates.
    pub async fn cached_layout(&self) -> Result<Option<LayoutSnapshot>, CoreError> {
        LayoutSnapshot::load(self.inner.storage.as_ref()).await
    }

    /// Capture the current layout and cache it.
    pub async fn refresh_layout(&self) -> Result<LayoutSnapshot, CoreError> {
        let snapshot = LayoutSnapshot::capture(&self.inner.store, &self.inner.sync).await?;
        snapshot.save(self.inner.storage.as_ref()).await?;
        Ok(snapshot)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.inner.store
    }

    pub fn sync(&self) -> &Arc<OrderSyncService> {
        &self.inner.sync
    }

    pub fn overlay(&self) -> &Arc<OptimisticOverlay> {
        &self.inner.overlay
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state()
    }

    /// Whether the store reflects the current authentication.
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.inner.ready.subscribe()
    }

    // ── Private ──────────────────────────────────────────────────────

    /// Resubscribe, refresh and reconcile after an authentication.
    async fn on_authenticated(&self) -> Result<(), CoreError> {
        for event_type in SUBSCRIBED_EVENTS {
            self.inner.connection.subscribe_events(event_type).await?;
        }
        self.full_refresh().await?;

        let migration = self.inner.sync.migrate().await?;
        debug!(?migration, "migration checked");
        self.inner.sync.pull_remote().await?;
        self.refresh_layout().await?;
        Ok(())
    }

    /// Re-list one registry after a registry-updated event.
    async fn refresh_registry(&self, event_type: &str) -> Result<(), CoreError> {
        let conn = &self.inner.connection;
        let store = &self.inner.store;
        match event_type {
            "entity_registry_updated" => store.replace_entity_registry(conn.list_entity_registry().await?),
            "area_registry_updated" => store.replace_areas(conn.list_areas().await?),
            "floor_registry_updated" => store.replace_floors(conn.list_floors().await?),
            "label_registry_updated" => store.replace_labels(conn.list_labels().await?),
            _ => return Ok(()),
        }
        self.inner.sync.pull_remote().await?;
        Ok(())
    }

    fn apply_state_changed(&self, frame: &EventFrame) {
        let data: StateChangedData = match serde_json::from_value(frame.event.data.clone()) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "malformed state_changed event");
                return;
            }
        };
        let change = self.inner.store.apply_state_changed(data);
        self.inner
            .overlay
            .reconcile(&change.entity_id, change.new.as_deref());
    }
}

fn build_credential(config: &SessionConfig) -> Result<Arc<dyn CredentialProvider>, CoreError> {
    match &config.credential {
        Credential::Token(token) => Ok(Arc::new(StaticToken::new(token.clone()))),
        Credential::Refresh {
            refresh_token,
            client_id,
        } => {
            let transport = TransportConfig {
                tls: tls_to_transport(&config.tls),
                timeout: config.request_timeout,
            };
            let http = transport.build_client()?;
            let origin = http_origin(&config.url)?;
            let refresher = OAuthRefresher::new(http, &origin, client_id.clone(), refresh_token.clone())?;
            Ok(Arc::new(refresher))
        }
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Refresh after each authentication; clear readiness when it drops.
async fn supervisor_task(session: Session, cancel: CancellationToken) {
    let mut state = session.inner.connection.state();
    loop {
        let authenticated = state.borrow_and_update().is_authenticated();
        if authenticated {
            if let Err(e) = session.on_authenticated().await {
                warn!(error = %e, "post-auth refresh failed");
            } else {
                session.inner.ready.send_replace(true);
                info!(
                    entities = session.inner.store.entity_count(),
                    areas = session.inner.store.area_count(),
                    "registry loaded"
                );
            }
        } else {
            session.inner.ready.send_replace(false);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

/// Route push events into the store and overlay.
async fn event_bridge_task(
    session: Session,
    mut events: broadcast::Receiver<Arc<EventFrame>>,
    cancel: CancellationToken,
) {
    let period = session.inner.config.overlay_ttl.max(MIN_PURGE_INTERVAL);
    let mut purge = tokio::time::interval(period);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = events.recv() => match result {
                Ok(frame) => {
                    let event_type = frame.event.event_type.as_str();
                    if event_type == "state_changed" {
                        session.apply_state_changed(&frame);
                    } else if let Err(e) = session.refresh_registry(event_type).await {
                        warn!(event_type, error = %e, "registry re-list failed");
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event bridge lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = purge.tick() => {
                session.inner.overlay.purge_expired();
            }
        }
    }
}

//! Socket connection with challenge auth and auto-reconnect.
//!
//! A [`Connection`] owns at most one live transport at a time. A single
//! background loop opens the socket, answers the `auth_required`
//! challenge, demultiplexes inbound frames (results go to the
//! [`RequestCorrelator`], events are broadcast to subscribers), and on
//! any transport failure sweeps every pending request and waits out an
//! exponential backoff before the next attempt. Because the loop is the
//! only place that reconnects, at most one reconnect timer is ever
//! pending.
//!
//! ```rust,ignore
//! let conn = Connection::new(ConnectionOptions::default());
//! conn.configure(endpoint, Arc::new(StaticToken::new(token)));
//! conn.connect().await?;
//! let mut events = conn.subscribe();
//! let states = conn.get_states().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::correlator::{DEFAULT_REQUEST_TIMEOUT, RequestCorrelator};
use crate::credential::CredentialProvider;
use crate::error::Error;
use crate::protocol::{self, EventFrame, InboundMessage};

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle state observable by consumers (e.g. for a "reconnecting"
/// banner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected, or explicitly disconnected.
    Idle,
    /// Opening the transport.
    Connecting,
    /// Transport open, waiting for the challenge or its verdict.
    Authenticating,
    Authenticated,
    /// Transport lost; a reconnect is scheduled.
    Disconnected { attempt: u32 },
    /// Credential rejected. Terminal until `connect()` is called again.
    AuthFailed { message: String },
}

impl ConnectionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── ConnectionOptions ────────────────────────────────────────────────

/// Tuning knobs that do not change between sessions.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Deadline for each request. Default: 30s.
    pub request_timeout: Duration,
    pub reconnect: ReconnectConfig,
    /// Ping cadence once authenticated. `None` disables the heartbeat.
    pub heartbeat_interval: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: ReconnectConfig::default(),
            heartbeat_interval: Some(Duration::from_secs(30)),
        }
    }
}

// ── Connection ───────────────────────────────────────────────────────

struct Target {
    endpoint: Url,
    credential: Arc<dyn CredentialProvider>,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct ConnectionInner {
    options: ConnectionOptions,
    target: ArcSwapOption<Target>,
    state: watch::Sender<ConnectionState>,
    correlator: RequestCorrelator,
    next_id: AtomicU64,
    /// Writer for the live, authenticated transport.
    outbound: ArcSwapOption<mpsc::UnboundedSender<String>>,
    events: broadcast::Sender<Arc<EventFrame>>,
    running: Mutex<Option<Running>>,
}

/// Handle to the registry socket.
///
/// Cheaply cloneable via `Arc<ConnectionInner>`.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub fn new(options: ConnectionOptions) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(ConnectionInner {
                options,
                target: ArcSwapOption::empty(),
                state,
                correlator: RequestCorrelator::new(),
                next_id: AtomicU64::new(1),
                outbound: ArcSwapOption::empty(),
                events,
                running: Mutex::new(None),
            }),
        }
    }

    /// Set the endpoint and credential used by the next `connect()`.
    pub fn configure(&self, endpoint: Url, credential: Arc<dyn CredentialProvider>) {
        self.inner.target.store(Some(Arc::new(Target {
            endpoint,
            credential,
        })));
    }

    /// Spawn the connection loop.
    ///
    /// Returns once the loop is running; authentication completes
    /// asynchronously (watch [`state()`](Self::state)). Calling this
    /// while a loop is already live is a no-op.
    pub async fn connect(&self) -> Result<(), Error> {
        let target = self.inner.target.load_full().ok_or(Error::NotConfigured)?;

        let mut running = self.inner.running.lock().await;
        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                return Ok(());
            }
        }

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            connection_loop(inner, target, loop_cancel).await;
        });
        *running = Some(Running { cancel, handle });
        Ok(())
    }

    /// Tear down the transport and stop reconnecting.
    ///
    /// Waits for the loop to exit, so a following `connect()` never
    /// overlaps the old transport.
    pub async fn disconnect(&self) {
        let taken = self.inner.running.lock().await.take();
        if let Some(Running { cancel, handle }) = taken {
            cancel.cancel();
            let _ = handle.await;
        }
        self.inner.outbound.store(None);
        self.inner.correlator.fail_all();
        let _ = self.inner.state.send(ConnectionState::Idle);
        tracing::debug!("Connection closed");
    }

    /// Send a raw frame on the authenticated transport.
    pub fn send(&self, frame: String) -> Result<(), Error> {
        let Some(outbound) = self.inner.outbound.load_full() else {
            return Err(Error::NotConnected);
        };
        outbound.send(frame).map_err(|_| Error::NotConnected)
    }

    /// Issue a typed command and await its correlated result.
    pub async fn request<C: WsCommand>(&self, command: &C) -> Result<C::Response, Error> {
        self.request_tracked(command).await.map(|(_, response)| response)
    }

    /// Like [`request`](Self::request), also returning the id the command
    /// was sent under. Subscriptions are keyed by that id.
    pub async fn request_tracked<C: WsCommand>(
        &self,
        command: &C,
    ) -> Result<(u64, C::Response), Error> {
        let (id, value) = self.request_raw(C::TYPE, command).await?;
        let response = serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: value.to_string(),
        })?;
        Ok((id, response))
    }

    /// Issue a command without waiting for its result.
    ///
    /// The request is still tracked, so a late result is matched and
    /// dropped quietly instead of being treated as stale.
    pub fn fire<C: WsCommand>(&self, command: &C) -> Result<u64, Error> {
        let id = self.next_id();
        let frame = protocol::command_frame(id, C::TYPE, command)?;
        let pending = self.inner.correlator.register(id, self.inner.options.request_timeout);
        if let Err(e) = self.send(frame) {
            self.inner.correlator.resolve(id, Err(Error::NotConnected));
            return Err(e);
        }
        tokio::spawn(async move {
            if let Err(e) = pending.wait().await {
                tracing::debug!(request_id = id, error = %e, "Fire-and-forget command failed");
            }
        });
        Ok(id)
    }

    async fn request_raw<T: Serialize>(
        &self,
        kind: &str,
        body: &T,
    ) -> Result<(u64, serde_json::Value), Error> {
        let id = self.next_id();
        let frame = protocol::command_frame(id, kind, body)?;
        let pending = self.inner.correlator.register(id, self.inner.options.request_timeout);
        if let Err(e) = self.send(frame) {
            self.inner.correlator.resolve(id, Err(Error::NotConnected));
            return Err(e);
        }
        tracing::trace!(request_id = id, kind, "Command sent");
        pending.wait().await.map(|value| (id, value))
    }

    /// Get a new receiver for push events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EventFrame>> {
        self.inner.events.subscribe()
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// The correlator backing this connection.
    pub fn correlator(&self) -> &RequestCorrelator {
        &self.inner.correlator
    }

    /// Wait until the session authenticates, or fail if auth is rejected.
    pub async fn wait_authenticated(&self, timeout: Duration) -> Result<(), Error> {
        let mut rx = self.state();
        let wait = async {
            loop {
                match &*rx.borrow_and_update() {
                    ConnectionState::Authenticated => return Ok(()),
                    ConnectionState::AuthFailed { message } => {
                        return Err(Error::AuthInvalid {
                            message: message.clone(),
                        });
                    }
                    _ => {}
                }
                if rx.changed().await.is_err() {
                    return Err(Error::Disconnected);
                }
            }
        };
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| Error::Timeout { timeout_ms })?
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// A typed socket command.
pub trait WsCommand: Serialize {
    /// Value of the frame's `type` field.
    const TYPE: &'static str;
    type Response: DeserializeOwned;
}

// ── Background reconnection loop ─────────────────────────────────────

/// How a single transport session ended without an error.
enum SessionEnd {
    Cancelled,
    Closed,
    /// Refreshable credential rejected once; retry after refreshing.
    RetryAuth,
}

#[derive(Default)]
struct Progress {
    attempt: u32,
    rejections: u32,
}

/// Main loop: connect → authenticate → read → on drop, sweep + backoff.
async fn connection_loop(
    inner: Arc<ConnectionInner>,
    target: Arc<Target>,
    cancel: CancellationToken,
) {
    let reconnect = inner.options.reconnect.clone();
    let mut progress = Progress::default();

    loop {
        let _ = inner.state.send(ConnectionState::Connecting);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = run_transport(&inner, &target, &cancel, &mut progress) => result,
        };

        // Transport is gone: nothing may wait on it any longer.
        inner.outbound.store(None);
        inner.correlator.fail_all();

        match result {
            Ok(SessionEnd::Cancelled) => break,
            Ok(SessionEnd::Closed) => {
                tracing::info!("Socket closed by remote, reconnecting");
            }
            Ok(SessionEnd::RetryAuth) => {
                tracing::info!("Credential rejected, retrying with a refreshed token");
            }
            Err(e) if e.is_auth_invalid() => {
                tracing::error!(error = %e, "Authentication failed, not retrying");
                let _ = inner.state.send(ConnectionState::AuthFailed {
                    message: e.to_string(),
                });
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt = progress.attempt, "Socket error");
            }
        }

        if let Some(max) = reconnect.max_retries {
            if progress.attempt >= max {
                tracing::error!(max_retries = max, "Reconnection limit reached, giving up");
                break;
            }
        }

        let _ = inner.state.send(ConnectionState::Disconnected {
            attempt: progress.attempt,
        });

        let delay = calculate_backoff(progress.attempt, &reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = progress.attempt,
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        progress.attempt += 1;
    }

    tracing::debug!("Connection loop exiting");
}

// ── Single transport lifecycle ───────────────────────────────────────

/// Open one transport, authenticate, and pump frames until it drops.
#[allow(clippy::too_many_lines)]
async fn run_transport(
    inner: &ConnectionInner,
    target: &Target,
    cancel: &CancellationToken,
    progress: &mut Progress,
) -> Result<SessionEnd, Error> {
    tracing::info!(url = %target.endpoint, "Connecting to registry socket");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(target.endpoint.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let _ = inner.state.send(ConnectionState::Authenticating);
    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let heartbeat = inner.options.heartbeat_interval;
    let mut ticker = heartbeat.map(tokio::time::interval);
    let mut last_frame = Instant::now();
    let mut authenticated = false;

    loop {
        let tick = async {
            match ticker.as_mut() {
                Some(t) => {
                    t.tick().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Cancelled);
            }
            Some(frame) = out_rx.recv() => {
                write
                    .send(Message::text(frame))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        last_frame = Instant::now();
                        for message in protocol::parse_frame(&text) {
                            match message {
                                InboundMessage::AuthRequired { server_version } => {
                                    tracing::debug!(?server_version, "Auth challenge received");
                                    let token = target.credential.access_token().await?;
                                    write
                                        .send(Message::text(protocol::auth_frame(
                                            secrecy::ExposeSecret::expose_secret(&token),
                                        )))
                                        .await
                                        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                                }
                                InboundMessage::AuthOk { server_version } => {
                                    progress.attempt = 0;
                                    progress.rejections = 0;
                                    authenticated = true;
                                    inner.outbound.store(Some(Arc::new(out_tx.clone())));
                                    let _ = inner.state.send(ConnectionState::Authenticated);
                                    tracing::info!(?server_version, "Authenticated");
                                }
                                InboundMessage::AuthInvalid { message } => {
                                    let message = message.unwrap_or_else(|| "invalid credential".into());
                                    target.credential.invalidate();
                                    if target.credential.can_refresh() && progress.rejections == 0 {
                                        progress.rejections += 1;
                                        return Ok(SessionEnd::RetryAuth);
                                    }
                                    return Err(Error::AuthInvalid { message });
                                }
                                InboundMessage::Result { id, success, result, error } => {
                                    let settlement = if success {
                                        Ok(result.unwrap_or(serde_json::Value::Null))
                                    } else {
                                        Err(error.map_or_else(
                                            || Error::Remote {
                                                code: "unknown_error".into(),
                                                message: "command failed".into(),
                                            },
                                            Error::from,
                                        ))
                                    };
                                    inner.correlator.resolve(id, settlement);
                                }
                                InboundMessage::Event { id, event } => {
                                    // No subscribers right now is fine.
                                    let _ = inner.events.send(Arc::new(EventFrame {
                                        subscription_id: id,
                                        event,
                                    }));
                                }
                                InboundMessage::Pong { id } => {
                                    inner.correlator.resolve(id, Ok(serde_json::Value::Null));
                                }
                                InboundMessage::Unknown => {
                                    tracing::trace!("Ignoring unknown message type");
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite answers pings automatically
                        last_frame = Instant::now();
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "Close frame received");
                        } else {
                            tracing::info!("Close frame received (no payload)");
                        }
                        return Ok(SessionEnd::Closed);
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("Socket stream ended");
                        return Ok(SessionEnd::Closed);
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
            () = tick => {
                if let Some(interval) = heartbeat {
                    let silent = last_frame.elapsed();
                    if silent > interval * 2 {
                        return Err(Error::Stalled { silent_secs: silent.as_secs() });
                    }
                    if authenticated {
                        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
                        let ping = serde_json::json!({ "id": id, "type": "ping" }).to_string();
                        write
                            .send(Message::text(ping))
                            .await
                            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                    }
                }
            }
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from many clients.
pub(crate) fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

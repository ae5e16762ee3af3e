use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use futures_util::StreamExt as _;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};

pub const PATH_START_TEST: &str = "/start-test";
pub const PATH_WS: &str = "/ws";

const DEFAULT_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTestRequest {
    pub url: String,
    pub payload: String,
    pub total_requests: u64,
    pub concurrency: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RunnerStats {
    start_requests: Arc<AtomicU64>,
    ws_connections: Arc<AtomicU64>,
    frames_sent: Arc<AtomicU64>,
    last_request: Arc<Mutex<Option<StartTestRequest>>>,
}

impl RunnerStats {
    fn record_start(&self, req: StartTestRequest) {
        self.start_requests.fetch_add(1, Ordering::Relaxed);
        let mut guard = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(req);
    }

    fn inc_ws_connections(&self) {
        self.ws_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_frames_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_requests(&self) -> u64 {
        self.start_requests.load(Ordering::Relaxed)
    }

    pub fn ws_connections(&self) -> u64 {
        self.ws_connections.load(Ordering::Relaxed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<StartTestRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Frames pushed verbatim to every stream subscriber as soon as it connects.
#[derive(Debug, Clone, Default)]
pub struct FrameScript {
    pub frames: Vec<String>,
    pub interval: Duration,
    /// Send a close frame once the script is exhausted.
    pub close_after: bool,
}

impl FrameScript {
    pub fn new<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
            interval: Duration::ZERO,
            close_after: false,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn closing(mut self) -> Self {
        self.close_after = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub script: FrameScript,
    /// Pace of synthetic frames emitted for a started test.
    pub tick: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            script: FrameScript::default(),
            tick: DEFAULT_TICK,
        }
    }
}

/// Deterministic outcome split for requests `start..start + count`:
/// every 10th request errors, every 5th otherwise is rejected.
pub fn synthetic_counts(start: u64, count: u64) -> (u64, u64, u64) {
    let (mut accepted, mut rejected, mut errors) = (0, 0, 0);
    for i in start..start.saturating_add(count) {
        if i % 10 == 9 {
            errors += 1;
        } else if i % 5 == 4 {
            rejected += 1;
        } else {
            accepted += 1;
        }
    }
    (accepted, rejected, errors)
}

fn delta_frame(accepted: u64, rejected: u64, errors: u64) -> String {
    serde_json::json!({
        "accepted": accepted,
        "rejected": rejected,
        "errors": errors,
    })
    .to_string()
}

#[derive(Debug, Clone)]
struct AppState {
    stats: RunnerStats,
    script: Arc<FrameScript>,
    tick: Duration,
    tx: broadcast::Sender<String>,
}

async fn handle_start_test(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let req: StartTestRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return StatusCode::BAD_REQUEST,
    };
    if req.total_requests == 0 || req.concurrency == 0 {
        return StatusCode::BAD_REQUEST;
    }

    state.stats.record_start(req.clone());
    tokio::spawn(simulate(req, state.tick, state.tx.clone()));
    StatusCode::OK
}

async fn simulate(req: StartTestRequest, tick: Duration, tx: broadcast::Sender<String>) {
    let mut ticker = tokio::time::interval(tick.max(Duration::from_millis(1)));
    ticker.tick().await;

    let mut next = 0u64;
    while next < req.total_requests {
        ticker.tick().await;
        let batch = req.concurrency.min(req.total_requests - next);
        let (accepted, rejected, errors) = synthetic_counts(next, batch);
        next += batch;
        let _ = tx.send(delta_frame(accepted, rejected, errors));
    }
}

async fn handle_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_frames(socket, state))
}

async fn stream_frames(mut socket: WebSocket, state: AppState) {
    let mut rx = state.tx.subscribe();
    state.stats.inc_ws_connections();

    for frame in &state.script.frames {
        if !state.script.interval.is_zero() {
            tokio::time::sleep(state.script.interval).await;
        }
        if socket
            .send(Message::Text(frame.clone().into()))
            .await
            .is_err()
        {
            return;
        }
        state.stats.inc_frames_sent();
    }

    if state.script.close_after {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            recv = rx.recv() => {
                let text = match recv {
                    Ok(v) => v,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
                state.stats.inc_frames_sent();
            }
            incoming = socket.next() => {
                let Some(Ok(msg)) = incoming else {
                    break;
                };
                if let Message::Close(_) = msg {
                    break;
                }
            }
        }
    }
}

pub fn router(stats: RunnerStats, config: RunnerConfig) -> (Router, broadcast::Sender<String>) {
    let (tx, _rx) = broadcast::channel::<String>(1024);
    let state = AppState {
        stats,
        script: Arc::new(config.script),
        tick: config.tick,
        tx: tx.clone(),
    };

    let app = Router::new()
        .route(PATH_START_TEST, post(handle_start_test))
        .route(PATH_WS, get(handle_ws))
        .with_state(state);
    (app, tx)
}

/// In-process stand-in for the test-runner service.
pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: RunnerStats,
    frames_tx: broadcast::Sender<String>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(RunnerConfig::default()).await
    }

    pub async fn start_with(config: RunnerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = RunnerStats::default();
        let (app, frames_tx) = router(stats.clone(), config);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            frames_tx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{PATH_WS}", self.addr)
    }

    pub fn stats(&self) -> &RunnerStats {
        &self.stats
    }

    /// Broadcasts `frame` to every connected subscriber; returns how many
    /// subscribers received it.
    pub fn push_frame(&self, frame: impl Into<String>) -> usize {
        self.frames_tx.send(frame.into()).unwrap_or(0)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}

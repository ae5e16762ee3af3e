use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use askama::Template;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use futures_util::StreamExt as _;
use loadview_core::SessionHandle;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::Dashboard;

#[derive(Debug, Clone, Copy)]
pub struct WebUiConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Debug)]
pub struct WebUi {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

#[derive(Debug, Clone)]
struct AppState {
    dashboard: Arc<Dashboard>,
    session: SessionHandle,
}

impl WebUi {
    pub async fn start(
        cfg: WebUiConfig,
        dashboard: Arc<Dashboard>,
        session: SessionHandle,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(cfg.bind_addr)
            .await
            .with_context(|| format!("failed to bind web ui: {}", cfg.bind_addr))?;
        let addr = listener
            .local_addr()
            .context("failed to resolve web ui address")?;

        let app = router(AppState { dashboard, session });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = serve.await {
                tracing::warn!(error = %err, "web ui stopped");
            }
        });

        tracing::info!(%addr, "web ui listening");
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let _ = self.task.await;
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/snapshot", get(snapshot))
        .route("/api/reset", post(reset))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let tpl = IndexTemplate {
        history_size: state.dashboard.history_size(),
    };
    let html = match tpl.render() {
        Ok(v) => v,
        Err(_) => "template render failed".to_string(),
    };
    Html(html)
}

async fn snapshot(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dashboard.view())
}

async fn reset(State(state): State<AppState>) -> StatusCode {
    if state.session.reset() {
        StatusCode::ACCEPTED
    } else {
        // The watch is over; there is no session left to reset.
        StatusCode::CONFLICT
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state.dashboard))
}

async fn handle_ws(mut socket: WebSocket, dashboard: Arc<Dashboard>) {
    // Subscribe before taking the snapshot so no update falls in between.
    let mut rx = dashboard.subscribe();
    let snapshot_msg = dashboard.snapshot_message_json();

    if socket
        .send(Message::Text(snapshot_msg.into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            recv = rx.recv() => {
                let text = match recv {
                    Ok(v) => v,
                    // A slow client misses intermediate updates; the next
                    // one still carries the full totals.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                if socket
                    .send(Message::Text(text.into()))
                    .await
                    .is_err()
                {
                    break;
                }
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

#[derive(askama::Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    history_size: usize,
}

use std::ops::ControlFlow;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use url::Url;

use crate::{Aggregator, Delta, Error, ErrorKind, Result, Snapshot, decode_frame};

mod backoff;
mod connection;
mod status;

pub use backoff::ReconnectPolicy;
pub use connection::Connection;
pub use status::ConnectionStatus;

const FRAME_PREVIEW_BYTES: usize = 128;

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Status(ConnectionStatus),
    Applied { delta: Delta, snapshot: Snapshot },
    Discarded { kind: ErrorKind },
    Reset { snapshot: Snapshot },
}

pub type EventFn = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Why [`StreamSession::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StreamOutcome {
    /// A shutdown was requested through the session handle.
    Shutdown,
    /// The stream was established and later ended, with no retry configured.
    Ended,
    /// The stream could not be (re-)established.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Reset,
    Shutdown,
}

pub type ControlReceiver = mpsc::UnboundedReceiver<Control>;

/// Cloneable remote for a running session. Commands are handled between
/// frames, never in the middle of an apply.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl SessionHandle {
    /// Returns `false` if the session is no longer running.
    pub fn reset(&self) -> bool {
        self.tx.send(Control::Reset).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.tx.send(Control::Shutdown).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub fn control_channel() -> (SessionHandle, ControlReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SessionHandle { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: Url,
    /// `None` disables automatic reconnection.
    pub reconnect: Option<ReconnectPolicy>,
}

impl StreamConfig {
    pub fn new(url: Url) -> Result<Self> {
        if url.scheme() != "ws" {
            return Err(Error::InvalidUrl(format!(
                "{url} (only ws:// stream URLs are supported)"
            )));
        }
        Ok(Self {
            url,
            reconnect: None,
        })
    }

    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }
}

/// Decodes one inbound frame and applies it.
///
/// A frame that fails decoding or validation is logged and dropped; the
/// aggregator is left exactly as it was.
pub fn handle_frame(aggregator: &mut Aggregator, raw: &[u8]) -> Result<Delta> {
    match decode_frame(raw) {
        Ok(delta) => {
            aggregator.apply(delta);
            Ok(delta)
        }
        Err(err) => {
            let preview = &raw[..raw.len().min(FRAME_PREVIEW_BYTES)];
            tracing::warn!(
                kind = %err.kind(),
                error = %err,
                frame = %String::from_utf8_lossy(preview),
                "discarding frame"
            );
            Err(err)
        }
    }
}

enum Pump {
    Shutdown,
    Ended,
    Lost(Error),
}

/// A watch session: one aggregator fed by one subscription at a time.
pub struct StreamSession {
    config: StreamConfig,
    aggregator: Aggregator,
    on_event: Option<EventFn>,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("config", &self.config)
            .field("aggregator", &self.aggregator)
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

impl StreamSession {
    pub fn new(config: StreamConfig, aggregator: Aggregator) -> Self {
        Self {
            config,
            aggregator,
            on_event: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, on_event: EventFn) -> Self {
        self.on_event = Some(on_event);
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn into_aggregator(self) -> Aggregator {
        self.aggregator
    }

    /// Receives and applies frames until shutdown, or until the stream is
    /// gone and the reconnect policy (if any) gives up.
    ///
    /// If every [`SessionHandle`] is dropped the session keeps running and
    /// simply stops listening for commands.
    pub async fn run(&mut self, control: &mut ControlReceiver) -> StreamOutcome {
        let mut control_open = true;
        let mut attempt: u32 = 0;
        let mut ever_connected = false;

        loop {
            self.emit(StreamEvent::Status(ConnectionStatus::Connecting));

            let url = self.config.url.clone();
            let open = Connection::open(&url);
            tokio::pin!(open);

            let opened = loop {
                tokio::select! {
                    res = &mut open => break res,
                    cmd = control.recv(), if control_open => {
                        if self.on_control(cmd, &mut control_open).is_break() {
                            return self.closed();
                        }
                    }
                }
            };

            match opened {
                Ok(mut conn) => {
                    attempt = 0;
                    ever_connected = true;
                    self.emit(StreamEvent::Status(ConnectionStatus::Connected));

                    let pumped = self.pump(&mut conn, control, &mut control_open).await;
                    conn.close().await;

                    match pumped {
                        Pump::Shutdown => return self.closed(),
                        Pump::Ended => tracing::info!(url = %url, "result stream ended"),
                        Pump::Lost(err) => tracing::warn!(
                            url = %url,
                            kind = %err.kind(),
                            error = %err,
                            "result stream lost"
                        ),
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        url = %url,
                        kind = %err.kind(),
                        error = %err,
                        "result stream unavailable"
                    );
                }
            }

            self.emit(StreamEvent::Status(ConnectionStatus::Disconnected));

            let Some(policy) = self.config.reconnect else {
                return if ever_connected {
                    StreamOutcome::Ended
                } else {
                    StreamOutcome::Unavailable
                };
            };

            if policy.exhausted(attempt) {
                tracing::warn!(url = %url, attempts = attempt, "giving up on result stream");
                return StreamOutcome::Unavailable;
            }

            let delay = policy.delay(attempt);
            attempt = attempt.saturating_add(1);
            let retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            tracing::info!(url = %url, attempt, retry_in_ms, "reconnecting to result stream");
            self.emit(StreamEvent::Status(ConnectionStatus::Reconnecting {
                attempt,
                retry_in_ms,
            }));

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    () = &mut sleep => break,
                    cmd = control.recv(), if control_open => {
                        if self.on_control(cmd, &mut control_open).is_break() {
                            return self.closed();
                        }
                    }
                }
            }
        }
    }

    async fn pump(
        &mut self,
        conn: &mut Connection,
        control: &mut ControlReceiver,
        control_open: &mut bool,
    ) -> Pump {
        loop {
            tokio::select! {
                frame = conn.next_frame() => match frame {
                    Ok(Some(raw)) => self.on_frame(&raw),
                    Ok(None) => return Pump::Ended,
                    Err(err) => return Pump::Lost(err),
                },
                cmd = control.recv(), if *control_open => {
                    if self.on_control(cmd, control_open).is_break() {
                        return Pump::Shutdown;
                    }
                }
            }
        }
    }

    fn on_frame(&mut self, raw: &[u8]) {
        match handle_frame(&mut self.aggregator, raw) {
            Ok(delta) => {
                if let Some(on_event) = &self.on_event {
                    on_event(StreamEvent::Applied {
                        delta,
                        snapshot: self.aggregator.snapshot(),
                    });
                }
            }
            Err(err) => self.emit(StreamEvent::Discarded { kind: err.kind() }),
        }
    }

    fn on_control(&mut self, cmd: Option<Control>, control_open: &mut bool) -> ControlFlow<()> {
        match cmd {
            Some(Control::Shutdown) => ControlFlow::Break(()),
            Some(Control::Reset) => {
                self.aggregator.reset();
                tracing::info!("session reset");
                if let Some(on_event) = &self.on_event {
                    on_event(StreamEvent::Reset {
                        snapshot: self.aggregator.snapshot(),
                    });
                }
                ControlFlow::Continue(())
            }
            None => {
                *control_open = false;
                ControlFlow::Continue(())
            }
        }
    }

    fn closed(&self) -> StreamOutcome {
        tracing::info!(url = %self.config.url, "stream session closed");
        self.emit(StreamEvent::Status(ConnectionStatus::Closed));
        StreamOutcome::Shutdown
    }

    fn emit(&self, event: StreamEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(event);
        }
    }
}

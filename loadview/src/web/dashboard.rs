use std::sync::{Arc, RwLock};

use loadview_core::{
    ConnectionStatus, CumulativeTotals, Delta, EventFn, Sample, Snapshot, StreamEvent,
    StreamOutcome,
};
use serde::Serialize;
use tokio::sync::broadcast;

/// Latest published state of the watch session, plus a fan-out of every
/// change as a serialized [`WsMessage`].
#[derive(Debug)]
pub struct Dashboard {
    state: RwLock<State>,
    history_size: usize,
    tx: broadcast::Sender<String>,
}

#[derive(Debug, Clone)]
struct State {
    status: ConnectionStatus,
    snapshot: Snapshot,
    outcome: Option<StreamOutcome>,
}

/// Body of `GET /api/snapshot`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub status: ConnectionStatus,
    pub outcome: Option<StreamOutcome>,
    pub history_size: usize,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

impl Dashboard {
    pub fn new(history_size: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<String>(1024);
        Self {
            state: RwLock::new(State {
                status: ConnectionStatus::Connecting,
                snapshot: Snapshot::empty(),
                outcome: None,
            }),
            history_size,
            tx,
        }
    }

    pub fn event_fn(self: &Arc<Self>) -> EventFn {
        let dashboard = self.clone();
        Arc::new(move |event| dashboard.on_event(event))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn history_size(&self) -> usize {
        self.history_size
    }

    pub fn view(&self) -> DashboardView {
        let guard = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        DashboardView {
            status: guard.status,
            outcome: guard.outcome,
            history_size: self.history_size,
            snapshot: guard.snapshot.clone(),
        }
    }

    pub fn notify_done(&self, outcome: StreamOutcome) {
        {
            let mut guard = self
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.outcome = Some(outcome);
        }
        self.publish(&WsMessage::Done { outcome });
    }

    pub fn snapshot_message_json(&self) -> String {
        let view = self.view();
        serde_json::to_string(&WsMessage::Snapshot { data: view })
            .unwrap_or_else(|_| r#"{"type":"snapshot"}"#.to_string())
    }

    fn on_event(&self, event: StreamEvent) {
        let msg = {
            let mut guard = self
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match event {
                StreamEvent::Status(status) => {
                    guard.status = status;
                    WsMessage::Status { status }
                }
                StreamEvent::Applied { delta, snapshot } => {
                    let sample = snapshot.history.last().cloned();
                    let totals = snapshot.totals;
                    let applied = snapshot.applied;
                    guard.snapshot = snapshot;
                    WsMessage::Update {
                        delta,
                        totals,
                        sample,
                        applied,
                    }
                }
                StreamEvent::Reset { snapshot } => {
                    guard.snapshot = snapshot;
                    WsMessage::Reset
                }
                StreamEvent::Discarded { .. } => return,
            }
        };
        self.publish(&msg);
    }

    fn publish(&self, msg: &WsMessage) {
        let Ok(text) = serde_json::to_string(msg) else {
            return;
        };
        let _ = self.tx.send(text);
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    Snapshot {
        data: DashboardView,
    },
    Update {
        delta: Delta,
        totals: CumulativeTotals,
        sample: Option<Sample>,
        applied: u64,
    },
    Status {
        status: ConnectionStatus,
    },
    Reset,
    Done {
        outcome: StreamOutcome,
    },
}

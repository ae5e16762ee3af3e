use serde::Serialize;
use std::io::Write as _;
use std::sync::Arc;

use loadview_core::{
    ConnectionStatus, CumulativeTotals, Delta, Endpoints, EventFn, Sample, StreamEvent,
    StreamOutcome, TestRequest,
};

use super::{OutputFormatter, WatchSummary};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _endpoints: &Endpoints, _test: Option<&TestRequest>) {}

    fn events(&self) -> Option<EventFn> {
        Some(Arc::new(move |event| {
            if let Some(line) = build_event_line(event) {
                emit_json_line(&line);
            }
        }))
    }

    fn print_summary(&self, summary: &WatchSummary) -> anyhow::Result<()> {
        let line = build_summary_line(summary);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum JsonEventLine {
    Status {
        #[serde(flatten)]
        status: ConnectionStatus,
    },
    Sample {
        delta: Delta,
        totals: CumulativeTotals,
        sample: Sample,
        applied: u64,
    },
    Discarded {
        reason: String,
    },
    Reset,
}

fn build_event_line(event: StreamEvent) -> Option<JsonEventLine> {
    match event {
        StreamEvent::Status(status) => Some(JsonEventLine::Status { status }),
        StreamEvent::Applied {
            delta,
            mut snapshot,
        } => {
            let sample = snapshot.history.pop()?;
            Some(JsonEventLine::Sample {
                delta,
                totals: snapshot.totals,
                sample,
                applied: snapshot.applied,
            })
        }
        StreamEvent::Discarded { kind } => Some(JsonEventLine::Discarded {
            reason: kind.to_string(),
        }),
        StreamEvent::Reset { .. } => Some(JsonEventLine::Reset),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine<'a> {
    pub kind: &'static str,
    pub outcome: StreamOutcome,
    pub elapsed_secs: f64,
    pub applied: u64,
    pub discarded: u64,
    pub totals: CumulativeTotals,
    pub failure_ratio: f64,
    pub history: &'a [Sample],
}

fn build_summary_line(summary: &WatchSummary) -> JsonSummaryLine<'_> {
    JsonSummaryLine {
        kind: "summary",
        outcome: summary.outcome,
        elapsed_secs: summary.elapsed.as_secs_f64(),
        applied: summary.snapshot.applied,
        discarded: summary.discarded,
        totals: summary.snapshot.totals,
        failure_ratio: summary.snapshot.totals.failure_ratio(),
        history: &summary.snapshot.history,
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
        let _ = out.flush();
    }
}

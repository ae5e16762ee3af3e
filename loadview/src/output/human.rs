use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

mod format;
mod progress;

use format::{format_delta, format_elapsed, format_percent, format_totals};
use loadview_core::{ConnectionStatus, Endpoints, EventFn, StreamEvent, TestRequest};
use progress::HumanProgress;

use super::{OutputFormatter, WatchSummary};

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

#[derive(Debug)]
struct LiveLine {
    status: ConnectionStatus,
    body: String,
}

impl LiveLine {
    fn render(&self) -> String {
        if self.body.is_empty() {
            format!("[{}]", self.status)
        } else {
            format!("[{}] {}", self.status, self.body)
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, endpoints: &Endpoints, test: Option<&TestRequest>) {
        println!("stream: {}", endpoints.stream);
        if let Some(t) = test {
            println!(
                "test: {} total_requests={} concurrency={}",
                t.url, t.total_requests, t.concurrency
            );
        }
        println!();
    }

    fn events(&self) -> Option<EventFn> {
        let progress = self.progress.clone();
        let line = Arc::new(Mutex::new(LiveLine {
            status: ConnectionStatus::Connecting,
            body: String::new(),
        }));

        Some(Arc::new(move |event| {
            let mut line = line.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match event {
                StreamEvent::Status(status) => {
                    if let ConnectionStatus::Reconnecting { .. } = status {
                        progress.println(format!("stream lost, {status}"));
                    }
                    line.status = status;
                }
                StreamEvent::Applied { delta, snapshot } => {
                    line.body = format!(
                        "{} ({}) samples={}",
                        format_totals(&snapshot.totals),
                        format_delta(&delta),
                        snapshot.history.len()
                    );
                }
                StreamEvent::Discarded { kind } => {
                    progress.println(format!("discarded frame: {kind}"));
                    return;
                }
                StreamEvent::Reset { .. } => line.body.clear(),
            }
            progress.update(line.render());
        }))
    }

    fn print_summary(&self, summary: &WatchSummary) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary));
        Ok(())
    }
}

fn render(summary: &WatchSummary) -> String {
    let totals = summary.snapshot.totals;
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(&mut out, "  outcome: {}", summary.outcome).ok();
    writeln!(&mut out, "  elapsed: {}", format_elapsed(summary.elapsed)).ok();
    writeln!(
        &mut out,
        "  frames: applied {} discarded {}",
        summary.snapshot.applied, summary.discarded
    )
    .ok();
    writeln!(&mut out, "  accepted: {}", totals.accepted).ok();
    writeln!(&mut out, "  rejected: {}", totals.rejected).ok();
    writeln!(&mut out, "  errors: {}", totals.errors).ok();
    writeln!(
        &mut out,
        "  total: {} (failed {})",
        totals.outcomes(),
        format_percent(totals.failure_ratio())
    )
    .ok();

    match (
        summary.snapshot.history.first(),
        summary.snapshot.history.last(),
    ) {
        (Some(first), Some(last)) => {
            writeln!(
                &mut out,
                "  window: {} samples {} .. {}",
                summary.snapshot.history.len(),
                first.timestamp,
                last.timestamp
            )
            .ok();
        }
        _ => out.push_str("  window: empty\n"),
    }

    out
}

use std::time::Duration;

use loadview_core::{Endpoints, EventFn, Snapshot, StreamOutcome, TestRequest};

use crate::cli::OutputFormat;

mod human;
mod json;

/// Final state of a watch, printed once the session has stopped.
#[derive(Debug, Clone)]
pub(crate) struct WatchSummary {
    pub outcome: StreamOutcome,
    pub elapsed: Duration,
    pub discarded: u64,
    pub snapshot: Snapshot,
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, endpoints: &Endpoints, test: Option<&TestRequest>);
    fn events(&self) -> Option<EventFn>;
    fn print_summary(&self, summary: &WatchSummary) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}

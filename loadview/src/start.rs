use loadview_core::TriggerClient;

use crate::cli::StartArgs;
use crate::exit_codes::ExitCode;
use crate::run_error::RunError;
use crate::run_support::{endpoints, test_request};

/// Sends the start command and waits for the runner to acknowledge it.
pub async fn start(args: StartArgs) -> Result<ExitCode, RunError> {
    let endpoints = endpoints(&args.server)?;
    let req = test_request(&args.test);

    TriggerClient::new(endpoints.start_test.clone())
        .with_timeout(args.test.trigger_timeout)
        .send(&req)
        .await?;

    println!(
        "started: {} total_requests={} concurrency={}",
        req.url, req.total_requests, req.concurrency
    );
    Ok(ExitCode::Success)
}

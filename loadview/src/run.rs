use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use loadview_core::{
    Aggregator, ConnectionStatus, Endpoints, EventFn, SessionHandle, StreamEvent, StreamSession,
    TestRequest, TriggerClient, control_channel,
};
use tokio::sync::Notify;

use crate::cli::{RunArgs, ViewArgs, WatchArgs};
use crate::exit_codes::ExitCode;
use crate::output::{self, WatchSummary};
use crate::run_error::RunError;
use crate::run_support::{
    compose_events, dashboard_bind_addr, endpoints, stream_config, test_request,
};
use crate::web::{Dashboard, WebUi, WebUiConfig};

pub async fn watch(args: WatchArgs) -> Result<ExitCode, RunError> {
    let endpoints = endpoints(&args.server)?;
    watch_stream(&endpoints, &args.view, None).await
}

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let endpoints = endpoints(&args.server)?;
    let trigger = Trigger {
        client: TriggerClient::new(endpoints.start_test.clone())
            .with_timeout(args.test.trigger_timeout),
        request: test_request(&args.test),
    };
    watch_stream(&endpoints, &args.view, Some(trigger)).await
}

struct Trigger {
    client: TriggerClient,
    request: TestRequest,
}

async fn watch_stream(
    endpoints: &Endpoints,
    view: &ViewArgs,
    trigger: Option<Trigger>,
) -> Result<ExitCode, RunError> {
    let dashboard_addr = dashboard_bind_addr(view)?;
    let aggregator = Aggregator::with_history_size(view.history_size)?;
    let config = stream_config(endpoints, view)?;

    let out = output::formatter(view.output);
    out.print_header(endpoints, trigger.as_ref().map(|t| &t.request));

    let (handle, mut control) = control_channel();

    let dashboard = dashboard_addr.map(|_| Arc::new(Dashboard::new(view.history_size)));
    let mut web_ui = match (dashboard_addr, &dashboard) {
        (Some(bind_addr), Some(dashboard)) => {
            let web = WebUi::start(WebUiConfig { bind_addr }, dashboard.clone(), handle.clone())
                .await
                .map_err(RunError::RuntimeError)?;
            eprintln!("dashboard={}", web.url());
            Some(web)
        }
        _ => None,
    };

    let discarded = Arc::new(AtomicU64::new(0));
    let (trigger_events, trigger_task) = match trigger {
        Some(t) => {
            let (events, task) = spawn_trigger(t, handle.clone());
            (Some(events), Some(task))
        }
        None => (None, None),
    };

    let events = compose_events([
        out.events(),
        dashboard.as_ref().map(|d| d.event_fn()),
        Some(count_discarded(discarded.clone())),
        trigger_events,
    ]);

    let mut session = StreamSession::new(config, aggregator);
    if let Some(events) = events {
        session = session.with_events(events);
    }

    let stopper = tokio::spawn(stop_on_signal(handle, view.duration));

    let started = Instant::now();
    let outcome = session.run(&mut control).await;
    let elapsed = started.elapsed();

    stopper.abort();
    if let Some(task) = trigger_task {
        task.abort();
    }

    let summary = WatchSummary {
        outcome,
        elapsed,
        discarded: discarded.load(Ordering::Relaxed),
        snapshot: session.aggregator().snapshot(),
    };
    out.print_summary(&summary).map_err(RunError::RuntimeError)?;

    if let Some(d) = &dashboard {
        d.notify_done(outcome);
    }
    if let Some(web) = web_ui.take() {
        web.shutdown().await;
    }

    let code = ExitCode::from_outcome(outcome);
    if code == ExitCode::StreamUnavailable {
        eprintln!("result stream unavailable: {}", endpoints.stream);
    }
    Ok(code)
}

fn count_discarded(discarded: Arc<AtomicU64>) -> EventFn {
    Arc::new(move |event| {
        if let StreamEvent::Discarded { .. } = event {
            discarded.fetch_add(1, Ordering::Relaxed);
        }
    })
}

/// Fires the start command once the stream is up and the session has been
/// reset, so no frame from an earlier test is counted.
fn spawn_trigger(
    trigger: Trigger,
    handle: SessionHandle,
) -> (EventFn, tokio::task::JoinHandle<()>) {
    let connected = Arc::new(Notify::new());
    let reset = Arc::new(Notify::new());

    let events: EventFn = {
        let connected = connected.clone();
        let reset = reset.clone();
        Arc::new(move |event: StreamEvent| match event {
            StreamEvent::Status(ConnectionStatus::Connected) => connected.notify_one(),
            StreamEvent::Reset { .. } => reset.notify_one(),
            _ => {}
        })
    };

    let task = tokio::spawn(async move {
        connected.notified().await;
        if !handle.reset() {
            return;
        }
        reset.notified().await;
        // Fire-and-forget: a failed start is logged by the client and the
        // watch carries on.
        let _ = trigger.client.fire(trigger.request);
    });

    (events, task)
}

async fn stop_on_signal(handle: SessionHandle, duration: Option<Duration>) {
    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = interrupted => tracing::info!("interrupted, closing stream"),
        () = deadline => tracing::info!("watch duration elapsed, closing stream"),
    }

    handle.shutdown();
}

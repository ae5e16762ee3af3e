use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use loadview_core::{Endpoints, EventFn, ReconnectPolicy, StreamConfig, StreamEvent, TestRequest};

use crate::cli::{ServerArgs, TestArgs, ViewArgs};
use crate::run_error::RunError;

pub(crate) fn endpoints(args: &ServerArgs) -> Result<Endpoints, RunError> {
    let endpoints = Endpoints::from_server(&args.server)?;
    match &args.stream_url {
        Some(url) => Ok(endpoints.with_stream_url(url)?),
        None => Ok(endpoints),
    }
}

pub(crate) fn test_request(args: &TestArgs) -> TestRequest {
    TestRequest {
        url: args.target.clone(),
        payload: args.payload.clone(),
        total_requests: args.total_requests,
        concurrency: args.concurrency,
    }
}

pub(crate) fn stream_config(
    endpoints: &Endpoints,
    args: &ViewArgs,
) -> Result<StreamConfig, RunError> {
    let config = StreamConfig::new(endpoints.stream.clone())?;
    if !args.reconnect {
        return Ok(config);
    }
    Ok(config.with_reconnect(ReconnectPolicy {
        max: args.reconnect_max,
        max_attempts: args.reconnect_attempts,
        ..ReconnectPolicy::default()
    }))
}

/// `None` when the dashboard is off.
pub(crate) fn dashboard_bind_addr(args: &ViewArgs) -> Result<Option<SocketAddr>, RunError> {
    if !args.dashboard {
        if args.dashboard_port.is_some() || args.dashboard_bind.is_some() {
            return Err(RunError::InvalidInput(anyhow::anyhow!(
                "--dashboard-port/--dashboard-bind requires --dashboard"
            )));
        }
        return Ok(None);
    }

    let addr = match args.dashboard_bind {
        Some(addr) => addr,
        None => SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            args.dashboard_port.unwrap_or(0),
        ),
    };

    if !addr.ip().is_loopback() {
        return Err(RunError::InvalidInput(anyhow::anyhow!(
            "--dashboard-bind must be a loopback address (got {addr}); remote binding is not supported"
        )));
    }
    Ok(Some(addr))
}

pub(crate) fn compose_events(fns: impl IntoIterator<Item = Option<EventFn>>) -> Option<EventFn> {
    let mut fns: Vec<EventFn> = fns.into_iter().flatten().collect();
    match fns.len() {
        0 => None,
        1 => fns.pop(),
        _ => Some(Arc::new(move |e: StreamEvent| {
            for f in &fns {
                f(e.clone());
            }
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser as _;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn view_args(extra: &[&str]) -> ViewArgs {
        let mut argv = vec!["loadview", "watch"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv) {
            Ok(Cli {
                command: Command::Watch(args),
                ..
            }) => args.view,
            Ok(other) => panic!("expected watch, got {other:?}"),
            Err(err) => panic!("failed to parse args: {err}"),
        }
    }

    #[test]
    fn dashboard_defaults_to_localhost() {
        let addr = dashboard_bind_addr(&view_args(&["--dashboard", "--dashboard-port", "9100"]));
        assert!(matches!(addr, Ok(Some(a)) if a == SocketAddr::from(([127, 0, 0, 1], 9100))));
    }

    #[test]
    fn dashboard_rejects_non_loopback_bind() {
        let res = dashboard_bind_addr(&view_args(&[
            "--dashboard",
            "--dashboard-bind",
            "0.0.0.0:9100",
        ]));
        assert!(matches!(res, Err(RunError::InvalidInput(_))));
    }

    #[test]
    fn dashboard_port_without_dashboard_is_invalid() {
        let res = dashboard_bind_addr(&view_args(&["--dashboard-port", "9100"]));
        assert!(matches!(res, Err(RunError::InvalidInput(_))));
        assert!(matches!(dashboard_bind_addr(&view_args(&[])), Ok(None)));
    }

    #[test]
    fn stream_url_override_must_be_ws() {
        let ok = endpoints(&ServerArgs {
            server: "http://127.0.0.1:8080".to_string(),
            stream_url: Some("ws://127.0.0.1:9000/results".to_string()),
        });
        assert!(matches!(ok, Ok(e) if e.stream.as_str() == "ws://127.0.0.1:9000/results"));

        let bad = endpoints(&ServerArgs {
            server: "http://127.0.0.1:8080".to_string(),
            stream_url: Some("http://127.0.0.1:9000/results".to_string()),
        });
        assert!(matches!(bad, Err(RunError::InvalidInput(_))));
    }

    #[test]
    fn reconnect_flag_enables_policy() {
        let endpoints = match Endpoints::from_server("http://127.0.0.1:8080") {
            Ok(v) => v,
            Err(err) => panic!("endpoints: {err}"),
        };

        let off = stream_config(&endpoints, &view_args(&[]));
        assert!(matches!(off, Ok(c) if c.reconnect.is_none()));

        let on = stream_config(
            &endpoints,
            &view_args(&["--reconnect", "--reconnect-max", "5s", "--reconnect-attempts", "3"]),
        );
        match on {
            Ok(c) => {
                let policy = c.reconnect.unwrap_or_default();
                assert_eq!(policy.max, std::time::Duration::from_secs(5));
                assert_eq!(policy.max_attempts, Some(3));
            }
            Err(err) => panic!("stream config: {err}"),
        }
    }

    #[test]
    fn compose_events_calls_every_sink() {
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = |hits: Arc<AtomicUsize>| -> Option<EventFn> {
            Some(Arc::new(move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            }))
        };

        let composed = compose_events([sink(hits.clone()), None, sink(hits.clone())]);
        match composed {
            Some(f) => f(loadview_core::StreamEvent::Status(
                loadview_core::ConnectionStatus::Connected,
            )),
            None => panic!("expected a composed callback"),
        }
        assert_eq!(hits.load(Ordering::Relaxed), 2);
        assert!(compose_events([None::<EventFn>, None]).is_none());
    }
}

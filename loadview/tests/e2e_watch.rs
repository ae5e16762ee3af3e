use std::process::Command;
use std::time::Duration;

use anyhow::Context as _;
use loadview_testserver::{FrameScript, RunnerConfig, StartTestRequest, TestServer};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Eq)]
struct Totals {
    accepted: u64,
    rejected: u64,
    errors: u64,
}

#[derive(Debug, Deserialize)]
struct SampleLine {
    totals: Totals,
}

#[derive(Debug, Deserialize)]
struct SummaryLine {
    outcome: String,
    applied: u64,
    discarded: u64,
    totals: Totals,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonLine {
    Status {},
    Sample(SampleLine),
    Discarded {},
    Reset {},
    Summary(SummaryLine),
}

fn parse_lines(stdout: &[u8]) -> anyhow::Result<Vec<JsonLine>> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).with_context(|| format!("parse json line: {l}")))
        .collect()
}

fn summary(lines: &[JsonLine]) -> anyhow::Result<&SummaryLine> {
    lines
        .iter()
        .find_map(|l| match l {
            JsonLine::Summary(s) => Some(s),
            _ => None,
        })
        .context("missing summary line")
}

#[tokio::test]
async fn e2e_watch_aggregates_scripted_stream() -> anyhow::Result<()> {
    let script = FrameScript::new([
        r#"{"accepted":2,"rejected":0,"errors":0}"#,
        "{not json",
        r#"{"accepted":1,"rejected":1,"errors":0,"latencyMs":12}"#,
        r#"{"accepted":0,"rejected":-3,"errors":0}"#,
        r#"{"accepted":0,"rejected":0,"errors":1}"#,
    ])
    .closing();
    let server = TestServer::start_with(RunnerConfig {
        script,
        ..Default::default()
    })
    .await
    .context("start test server")?;
    let base_url = server.base_url().to_string();

    let out = tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_loadview"))
            .arg("watch")
            .arg("--server")
            .arg(&base_url)
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run loadview binary")?;

    server.shutdown().await;

    anyhow::ensure!(
        out.status.success(),
        "loadview exited with {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr)
    );

    let lines = parse_lines(&out.stdout)?;

    let samples: Vec<&Totals> = lines
        .iter()
        .filter_map(|l| match l {
            JsonLine::Sample(s) => Some(&s.totals),
            _ => None,
        })
        .collect();
    assert_eq!(
        samples,
        vec![
            &Totals { accepted: 2, rejected: 0, errors: 0 },
            &Totals { accepted: 3, rejected: 1, errors: 0 },
            &Totals { accepted: 3, rejected: 1, errors: 1 },
        ]
    );

    let discarded = lines
        .iter()
        .filter(|l| matches!(l, JsonLine::Discarded {}))
        .count();
    assert_eq!(discarded, 2);

    let s = summary(&lines)?;
    assert_eq!(s.outcome, "ended");
    assert_eq!(s.applied, 3);
    assert_eq!(s.discarded, 2);
    assert_eq!(s.totals, Totals { accepted: 3, rejected: 1, errors: 1 });

    Ok(())
}

#[tokio::test]
async fn e2e_run_triggers_and_watches_test() -> anyhow::Result<()> {
    let server = TestServer::start_with(RunnerConfig {
        tick: Duration::from_millis(10),
        ..Default::default()
    })
    .await
    .context("start test server")?;
    let base_url = server.base_url().to_string();

    let out = tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_loadview"))
            .arg("run")
            .arg("--server")
            .arg(&base_url)
            .arg("--target")
            .arg("http://127.0.0.1:5000/test")
            .arg("--payload")
            .arg(r#"{"id":7}"#)
            .arg("--total-requests")
            .arg("10")
            .arg("--concurrency")
            .arg("5")
            .arg("--duration")
            .arg("2s")
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run loadview binary")?;

    let seen = server.stats().last_request();
    let starts = server.stats().start_requests();
    server.shutdown().await;

    anyhow::ensure!(
        out.status.success(),
        "loadview exited with {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr)
    );

    assert_eq!(starts, 1);
    assert_eq!(
        seen,
        Some(StartTestRequest {
            url: "http://127.0.0.1:5000/test".to_string(),
            payload: r#"{"id":7}"#.to_string(),
            total_requests: 10,
            concurrency: 5,
        })
    );

    let lines = parse_lines(&out.stdout)?;
    anyhow::ensure!(
        lines.iter().any(|l| matches!(l, JsonLine::Reset {})),
        "expected the session to be reset before the test started"
    );

    let (accepted, rejected, errors) = loadview_testserver::synthetic_counts(0, 10);
    let s = summary(&lines)?;
    assert_eq!(s.outcome, "shutdown");
    assert_eq!(s.applied, 2);
    assert_eq!(
        s.totals,
        Totals {
            accepted,
            rejected,
            errors
        }
    );

    Ok(())
}

#[tokio::test]
async fn e2e_start_sends_command() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();

    let out = tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_loadview"))
            .arg("start")
            .arg("--server")
            .arg(&base_url)
            .arg("--target")
            .arg("http://127.0.0.1:5000/test")
            .arg("--total-requests")
            .arg("3")
            .arg("--concurrency")
            .arg("1")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run loadview binary")?;

    let seen = server.stats().last_request();
    server.shutdown().await;

    anyhow::ensure!(
        out.status.success(),
        "loadview exited with {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr)
    );
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stdout).contains("started:"),
        "expected confirmation on stdout"
    );

    let seen = seen.context("server did not receive the start command")?;
    assert_eq!(seen.payload, "{}");
    assert_eq!(seen.total_requests, 3);
    assert_eq!(seen.concurrency, 1);
    Ok(())
}

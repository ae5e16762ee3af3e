use std::process::{Command, Output};

use anyhow::Context as _;
use loadview_testserver::TestServer;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn ensure_exit(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

fn loadview(args: &[&str]) -> anyhow::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_loadview"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .context("run loadview binary")
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = loadview(&["watch", "--duration", "10x"])?;
    ensure_exit(&out, 30)
}

#[test]
fn zero_history_size_exit_30() -> anyhow::Result<()> {
    let out = loadview(&[
        "watch",
        "--server",
        "http://127.0.0.1:1",
        "--history-size",
        "0",
    ])?;
    ensure_exit(&out, 30)?;
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("history capacity"),
        "expected capacity error on stderr"
    );
    Ok(())
}

#[test]
fn oversized_history_size_exit_30() -> anyhow::Result<()> {
    for size in ["100001", "18446744073709551615"] {
        let out = loadview(&[
            "watch",
            "--server",
            "http://127.0.0.1:1",
            "--history-size",
            size,
        ])?;
        ensure_exit(&out, 30)?;
        anyhow::ensure!(
            String::from_utf8_lossy(&out.stderr).contains("history capacity"),
            "expected capacity error on stderr for {size}"
        );
    }
    Ok(())
}

#[test]
fn unsupported_server_scheme_exit_30() -> anyhow::Result<()> {
    let out = loadview(&["watch", "--server", "https://127.0.0.1:8443"])?;
    ensure_exit(&out, 30)
}

#[test]
fn help_exits_0() -> anyhow::Result<()> {
    let out = loadview(&["--help"])?;
    ensure_exit(&out, 0)
}

#[tokio::test]
async fn unreachable_stream_exit_50() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();
    server.shutdown().await;

    let out = tokio::task::spawn_blocking(move || {
        loadview(&["watch", "--server", &base_url, "--output", "json"])
    })
    .await
    .context("spawn_blocking join")??;

    ensure_exit(&out, 50)?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    let summary = stdout
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .find(|v| v.get("kind").and_then(|k| k.as_str()) == Some("summary"))
        .context("missing summary line")?;
    anyhow::ensure!(
        summary.get("outcome").and_then(|v| v.as_str()) == Some("unavailable"),
        "unexpected summary: {summary}"
    );
    Ok(())
}

#[tokio::test]
async fn reconnect_gives_up_exit_50() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();
    server.shutdown().await;

    let out = tokio::task::spawn_blocking(move || {
        loadview(&[
            "watch",
            "--server",
            &base_url,
            "--reconnect",
            "--reconnect-max",
            "50ms",
            "--reconnect-attempts",
            "2",
            "--output",
            "json",
        ])
    })
    .await
    .context("spawn_blocking join")??;

    ensure_exit(&out, 50)?;

    let reconnects = String::from_utf8_lossy(&out.stdout)
        .lines()
        .filter(|l| l.contains(r#""state":"reconnecting""#))
        .count();
    anyhow::ensure!(reconnects == 2, "expected 2 reconnect lines, got {reconnects}");
    Ok(())
}

#[tokio::test]
async fn start_against_stopped_runner_exit_40() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();
    server.shutdown().await;

    let out = tokio::task::spawn_blocking(move || {
        loadview(&[
            "start",
            "--server",
            &base_url,
            "--target",
            "http://127.0.0.1:5000/test",
        ])
    })
    .await
    .context("spawn_blocking join")??;

    ensure_exit(&out, 40)
}

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

/// The runner forwards the payload verbatim as the request body, so it has to
/// be a JSON document already.
fn parse_payload(input: &str) -> Result<String, String> {
    serde_json::from_str::<serde_json::Value>(input)
        .map(|_| input.to_string())
        .map_err(|err| format!("payload is not valid JSON: {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Live spinner on stderr and a totals summary on stdout.
    HumanReadable,
    /// Emit JSON lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "loadview",
    author,
    version,
    about = "Live view of a remote load test's outcome stream",
    long_about = "loadview triggers a load test on a test-runner service and watches its result stream.\n\nEvery frame on the stream carries the accepted/rejected/error counts observed since the previous one; loadview keeps the cumulative totals and a sliding window of the most recent samples, and renders them on the terminal or a local dashboard.",
    after_help = "Examples:\n  loadview run --target http://127.0.0.1:5000/test --total-requests 1000 --concurrency 50\n  loadview watch --server http://runner:8080 --output json\n  loadview watch --reconnect --dashboard\n  loadview start --target http://127.0.0.1:5000/test --payload '{\"id\":1}'"
)]
pub struct Cli {
    #[command(flatten)]
    pub log: LogArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send the start command to the test runner and wait for its answer
    Start(StartArgs),

    /// Subscribe to the result stream and aggregate it until stopped
    #[command(
        long_about = "Subscribe to the result stream and aggregate it.\n\nStops on Ctrl-C, after --duration, or when the stream ends and no reconnect is configured."
    )]
    Watch(WatchArgs),

    /// Subscribe, start a test, then watch it
    #[command(
        long_about = "Subscribe to the result stream, reset the session once connected, fire the start command and watch the results.\n\nThe start command is fire-and-forget: a failure to deliver it is logged and the watch continues."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct LogArgs {
    /// Log filter (e.g. info, loadview_core=debug). Falls back to RUST_LOG, then warn.
    #[arg(long, global = true, value_name = "FILTER", env = "LOADVIEW_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log line format on stderr
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Text,
        env = "LOADVIEW_LOG_FORMAT"
    )]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// Base URL of the test-runner service
    #[arg(
        long,
        value_name = "URL",
        default_value = "http://localhost:8080",
        env = "LOADVIEW_SERVER"
    )]
    pub server: String,

    /// Result stream URL (defaults to ws://<server>/ws)
    #[arg(long, value_name = "URL", env = "LOADVIEW_STREAM_URL")]
    pub stream_url: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct TestArgs {
    /// URL the runner should load test
    #[arg(long, value_name = "URL", env = "LOADVIEW_TARGET")]
    pub target: String,

    /// JSON body sent with every request
    #[arg(long, default_value = "{}", value_parser = parse_payload, env = "LOADVIEW_PAYLOAD")]
    pub payload: String,

    /// Number of requests to send
    #[arg(
        long,
        default_value_t = 100,
        value_parser = clap::value_parser!(u64).range(1..),
        env = "LOADVIEW_TOTAL_REQUESTS"
    )]
    pub total_requests: u64,

    /// Number of requests in flight at once
    #[arg(
        long,
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..),
        env = "LOADVIEW_CONCURRENCY"
    )]
    pub concurrency: u64,

    /// Give up on the start command after this long (e.g. 10s, 500ms)
    #[arg(
        long,
        default_value = "10s",
        value_parser = parse_duration,
        env = "LOADVIEW_TRIGGER_TIMEOUT"
    )]
    pub trigger_timeout: Duration,
}

#[derive(Debug, Clone, Args)]
pub struct ViewArgs {
    /// Stop watching after this long (e.g. 30s, 5m)
    #[arg(long, value_parser = parse_duration, env = "LOADVIEW_DURATION")]
    pub duration: Option<Duration>,

    /// Re-subscribe with exponential backoff when the stream is lost
    #[arg(long, env = "LOADVIEW_RECONNECT")]
    pub reconnect: bool,

    /// Upper bound for the reconnect delay
    #[arg(
        long,
        default_value = "30s",
        value_parser = parse_duration,
        env = "LOADVIEW_RECONNECT_MAX"
    )]
    pub reconnect_max: Duration,

    /// Give up after this many consecutive failed reconnects (default: never)
    #[arg(long, env = "LOADVIEW_RECONNECT_ATTEMPTS")]
    pub reconnect_attempts: Option<u32>,

    /// Number of samples kept in the sliding window (at most 100000)
    #[arg(
        long,
        default_value_t = loadview_core::HISTORY_CAPACITY,
        env = "LOADVIEW_HISTORY_SIZE"
    )]
    pub history_size: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable, env = "LOADVIEW_OUTPUT")]
    pub output: OutputFormat,

    /// Serve a live dashboard on a loopback address
    #[arg(long, env = "LOADVIEW_DASHBOARD")]
    pub dashboard: bool,

    /// Dashboard port on 127.0.0.1 (0 picks a free one)
    #[arg(long, env = "LOADVIEW_DASHBOARD_PORT")]
    pub dashboard_port: Option<u16>,

    /// Dashboard bind address (must be loopback)
    #[arg(long, value_name = "ADDR", env = "LOADVIEW_DASHBOARD_BIND")]
    pub dashboard_bind: Option<SocketAddr>,
}

#[derive(Debug, Args)]
pub struct StartArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub test: TestArgs,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub view: ViewArgs,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub test: TestArgs,

    #[command(flatten)]
    pub view: ViewArgs,
}

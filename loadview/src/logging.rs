use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use crate::cli::{LogArgs, LogFormat};

const DEFAULT_FILTER: &str = "warn";

/// Installs the global subscriber. Logs always go to stderr; stdout belongs to
/// the selected output format.
pub fn init(args: &LogArgs) -> anyhow::Result<()> {
    let filter = match args.log_level.as_deref() {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("invalid --log-level `{level}`"))?
        }
        None => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let res = match args.log_format {
        LogFormat::Text => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().with_target(true).try_init(),
    };
    res.map_err(|err| anyhow::anyhow!("failed to initialize logging: {err}"))
}

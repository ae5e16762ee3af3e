use std::time::Duration;

use tokio_tungstenite::tungstenite;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    ChannelUnavailable,
    MalformedFrame,
    InvalidDelta,
    TriggerSendFailure,
    TriggerRejected,
    InvalidUrl,
    InvalidCapacity,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("result stream unavailable: {0}")]
    ChannelUnavailable(#[source] Box<tungstenite::Error>),

    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    #[error("invalid delta: `{field}` must be a non-negative integer (got {value})")]
    InvalidDelta {
        field: &'static str,
        value: serde_json::Number,
    },

    #[error("failed to send start command: {0}")]
    TriggerSendFailure(#[from] hyper_util::client::legacy::Error),

    #[error("start command timed out after {0:?}")]
    TriggerTimeout(Duration),

    #[error("failed to build start command: {0}")]
    TriggerBuild(#[from] http::Error),

    #[error("failed to encode start command: {0}")]
    TriggerEncode(#[source] serde_json::Error),

    #[error("test runner rejected start command with status {0}")]
    TriggerRejected(http::StatusCode),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error(
        "history capacity must be between 1 and {}",
        crate::MAX_HISTORY_CAPACITY
    )]
    InvalidCapacity,
}

impl From<tungstenite::Error> for Error {
    fn from(err: tungstenite::Error) -> Self {
        Self::ChannelUnavailable(Box::new(err))
    }
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ChannelUnavailable(_) => ErrorKind::ChannelUnavailable,
            Self::MalformedFrame(_) => ErrorKind::MalformedFrame,
            Self::InvalidDelta { .. } => ErrorKind::InvalidDelta,
            Self::TriggerSendFailure(_)
            | Self::TriggerTimeout(_)
            | Self::TriggerBuild(_)
            | Self::TriggerEncode(_) => ErrorKind::TriggerSendFailure,
            Self::TriggerRejected(_) => ErrorKind::TriggerRejected,
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::InvalidCapacity => ErrorKind::InvalidCapacity,
        }
    }

    /// Frame-level errors are recovered by discarding the frame.
    #[must_use]
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedFrame | ErrorKind::InvalidDelta
        )
    }
}

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, retry_in_ms: u64 },
    Disconnected,
    /// Torn down on request; no further frames will be applied.
    Closed,
}

impl ConnectionStatus {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting {
                attempt,
                retry_in_ms,
            } => write!(f, "reconnecting (attempt {attempt} in {retry_in_ms}ms)"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_state_tag() {
        let v = match serde_json::to_value(ConnectionStatus::Reconnecting {
            attempt: 2,
            retry_in_ms: 1000,
        }) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };
        assert_eq!(
            v,
            serde_json::json!({ "state": "reconnecting", "attempt": 2, "retry_in_ms": 1000 })
        );
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
    }
}

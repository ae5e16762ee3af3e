#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Invalid CLI/config/options (bad flags, bad URLs, zero history size, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (dashboard bind failures, rejected start command, etc.).
    RuntimeError = 40,

    /// The result stream could not be subscribed to and no reconnect was configured,
    /// or reconnecting gave up.
    StreamUnavailable = 50,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_outcome(outcome: loadview_core::StreamOutcome) -> Self {
        match outcome {
            loadview_core::StreamOutcome::Shutdown | loadview_core::StreamOutcome::Ended => {
                Self::Success
            }
            loadview_core::StreamOutcome::Unavailable => Self::StreamUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadview_core::StreamOutcome;

    #[test]
    fn outcome_maps_to_exit_code() {
        assert_eq!(ExitCode::from_outcome(StreamOutcome::Shutdown), ExitCode::Success);
        assert_eq!(ExitCode::from_outcome(StreamOutcome::Ended), ExitCode::Success);
        assert_eq!(
            ExitCode::from_outcome(StreamOutcome::Unavailable).as_i32(),
            50
        );
    }
}

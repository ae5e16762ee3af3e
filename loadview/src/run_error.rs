use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => e,
        }
    }
}

/// Core errors raised before anything runs are configuration mistakes;
/// everything else is a runtime failure.
impl From<loadview_core::Error> for RunError {
    fn from(err: loadview_core::Error) -> Self {
        use loadview_core::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidUrl | ErrorKind::InvalidCapacity => {
                Self::InvalidInput(anyhow::Error::new(err))
            }
            _ => Self::RuntimeError(anyhow::Error::new(err)),
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => {
                write!(f, "{e:#}")
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_invalid_input() {
        let err = RunError::from(loadview_core::Error::InvalidCapacity);
        assert_eq!(err.exit_code(), ExitCode::InvalidInput);

        let err = RunError::from(loadview_core::Error::InvalidUrl("ftp://x".to_string()));
        assert_eq!(err.exit_code(), ExitCode::InvalidInput);
    }

    #[test]
    fn trigger_errors_are_runtime_errors() {
        let err = RunError::from(loadview_core::Error::TriggerRejected(
            axum::http::StatusCode::BAD_REQUEST,
        ));
        assert_eq!(err.exit_code(), ExitCode::RuntimeError);
        assert!(err.to_string().contains("400"));
    }
}

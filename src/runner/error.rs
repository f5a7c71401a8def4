//! Error types for the batch runner.

use thiserror::Error;

/// One failed attempt of a task. The runner logs it and may retry; it never reaches the
/// caller of [TaskRunner::start](super::TaskRunner::start).
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl ExecutionError {
    /// Failure with a plain message and no underlying cause.
    pub fn msg(message: impl Into<String>) -> Self {
        ExecutionError::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Failure wrapping an underlying error; the message is the error's display text.
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ExecutionError::Failed {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Invalid run configuration. Raised by [RunConfigBuilder::build](super::RunConfigBuilder::build)
/// before any task executes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_workers must be at least 1, got {0}")]
    InvalidWorkers(usize),
}

/// Misuse of a [TaskRunner](super::TaskRunner).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("task runner has already been started; runners are single-use")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn from_error_keeps_source_and_message() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let e = ExecutionError::from_error(io);
        assert_eq!(e.to_string(), "timed out");
        assert!(e.source().is_some());
    }

    #[test]
    fn msg_has_no_source() {
        let e = ExecutionError::msg("boom");
        assert_eq!(e.to_string(), "boom");
        assert!(e.source().is_none());
    }

    #[test]
    fn config_error_message_names_value() {
        assert_eq!(
            ConfigError::InvalidWorkers(0).to_string(),
            "max_workers must be at least 1, got 0"
        );
    }
}

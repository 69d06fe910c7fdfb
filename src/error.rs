//! Command-level error types and their process exit codes

use thiserror::Error;

/// Exit code for invalid input detected before any remote state is created
pub const USAGE_EXIT_CODE: i32 = 2;
/// Exit code for remote and other unrecoverable failures
pub const FAILURE_EXIT_CODE: i32 = 1;
/// Exit code after an operator interrupt (Ctrl+C)
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Bad argument combination or invalid project, reported before any network call
/// that would create remote state
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UsageError {
    pub message: String,
}

impl UsageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// An error tied to a specific option or argument
    pub fn for_param(param: &str, message: impl Into<String>) -> Self {
        Self {
            message: format!("Invalid value for {}: {}", param, message.into()),
        }
    }
}

/// Failures of the deploy workflow that are not plain API errors
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Image build failed for version {version_id} of execution environment {environment_id}")]
    ImageBuildFailed {
        environment_id: String,
        version_id: String,
    },

    #[error("Application {app} has no publish history entry {by} versions back")]
    HistoryOutOfRange { app: String, by: usize },

    #[error("Application {0} has no source version to publish from")]
    MissingSourceVersion(String),
}

/// Map an error chain to the process exit code
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if error.chain().any(|cause| cause.is::<UsageError>()) {
        USAGE_EXIT_CODE
    } else {
        FAILURE_EXIT_CODE
    }
}

//! Error taxonomy shared by the configuration, permission and session layers.
//!
//! Every variant resolves to a renderable UI state; none of them is meant to
//! abort the process.

use crate::config::ConfigValidationError;
use crate::permissions::PermissionKind;
use std::time::Duration;

pub type ShellResult<T> = Result<T, ShellError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShellError {
    /// A required configuration field is missing or malformed. Blocks
    /// provider activation.
    #[error("Configuration invalid:\n{}", join_errors(.0))]
    ConfigurationInvalid(Vec<ConfigValidationError>),

    /// The runtime has no such capture capability. Not retryable.
    #[error("{0} access is not supported on this platform")]
    PermissionUnsupported(PermissionKind),

    /// The user refused access. Only a platform-level settings change helps.
    #[error("{kind} access denied: {reason}")]
    PermissionDenied { kind: PermissionKind, reason: String },

    /// Transient platform failure (device busy, etc). Retry with `refresh`.
    #[error("{kind} error: {message}")]
    PermissionTransientError { kind: PermissionKind, message: String },

    #[error("Failed to start agent session: {0}")]
    SessionStartFailure(String),

    #[error("Agent session did not respond within {0:?}")]
    SessionStartTimeout(Duration),

    #[error("Authentication token expired")]
    TokenExpired,
}

impl ShellError {
    /// Whether the user can recover from this error inside the app.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShellError::PermissionTransientError { .. }
                | ShellError::SessionStartFailure(_)
                | ShellError::SessionStartTimeout(_)
        )
    }
}

fn join_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

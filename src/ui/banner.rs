use crate::config::ENV_JWT_TOKEN;
use crate::error::ShellError;

use std::fmt;

/// A one-off warning shown above the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    pub details: Vec<String>,
}

impl Banner {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "⚠️ {}", self.message)?;
        for detail in &self.details {
            writeln!(f, "   - {detail}")?;
        }
        Ok(())
    }
}

/// Banner explaining why the agent is unavailable. `None` for errors that
/// are not about configuration.
pub fn config_banner(error: &ShellError) -> Option<Banner> {
    let ShellError::ConfigurationInvalid(errors) = error else {
        return None;
    };
    if errors.iter().any(|e| e.path == "auth.token") && errors.len() == 1 {
        return Some(Banner::new(format!(
            "{ENV_JWT_TOKEN} not found in environment variables. Sammy agent will not be available."
        )));
    }
    let mut banner = Banner::new("Sammy configuration is invalid. Sammy agent will not be available.");
    banner.details = errors.iter().map(ToString::to_string).collect();
    Some(banner)
}

/// Banner for a failed permission request at activation.
pub fn permission_banner(error: &ShellError) -> Option<Banner> {
    match error {
        ShellError::PermissionDenied { .. } => Some(Banner::new(
            "Microphone access is required for Sammy to work properly.",
        )),
        ShellError::PermissionUnsupported(kind) => Some(Banner::new(format!(
            "{kind} access is not supported in this browser."
        ))),
        ShellError::PermissionTransientError { message, .. } => {
            Some(Banner::new(format!("Microphone error: {message}")))
        }
        _ => None,
    }
}

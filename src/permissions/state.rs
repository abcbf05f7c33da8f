use async_trait::async_trait;
use serde::Serialize;

/// The capture capability a coordinator guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionKind {
    Microphone,
    ScreenCapture,
}

impl std::fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionKind::Microphone => write!(f, "Microphone"),
            PermissionKind::ScreenCapture => write!(f, "Screen capture"),
        }
    }
}

/// Grant state as last derived from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Unknown,
    Prompt,
    Granted,
    Denied,
    /// The capability is absent from the runtime. Terminal.
    Unsupported,
    /// Transient platform failure, retryable through `refresh`.
    Error(String),
}

impl PermissionState {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Granted)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, PermissionState::Denied)
    }

    /// Nothing has been decided yet; a request would show a prompt.
    pub fn needs_permission(&self) -> bool {
        matches!(self, PermissionState::Unknown | PermissionState::Prompt)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PermissionState::Unknown => "unknown",
            PermissionState::Prompt => "prompt",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Unsupported => "unsupported",
            PermissionState::Error(_) => "error",
        }
    }
}

impl From<PlatformPermission> for PermissionState {
    fn from(value: PlatformPermission) -> Self {
        match value {
            PlatformPermission::Prompt => PermissionState::Prompt,
            PlatformPermission::Granted => PermissionState::Granted,
            PlatformPermission::Denied => PermissionState::Denied,
        }
    }
}

// ============================================================================
// Platform capability
// ============================================================================

/// Answer of a non-prompting permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformPermission {
    Prompt,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("capability not available in this runtime")]
    Unsupported,
    #[error("{0}")]
    Denied(String),
    #[error("{0}")]
    Failed(String),
}

/// A device acquired only to confirm access (e.g. an audio track).
pub trait MediaProbe: Send {
    /// Release the device. Called exactly once.
    fn stop(self: Box<Self>);
}

/// Media permission primitives of the host platform.
#[async_trait]
pub trait MediaPermissionBackend: Send + Sync {
    /// Read the current grant state. Must never show a prompt.
    async fn query(&self, kind: PermissionKind) -> Result<PlatformPermission, ProbeError>;

    /// Acquire the device, prompting the user if needed.
    async fn acquire(&self, kind: PermissionKind) -> Result<Box<dyn MediaProbe>, ProbeError>;
}

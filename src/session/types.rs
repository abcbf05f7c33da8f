use crate::config::{EnvSnapshot, ENV_GUIDE_ID};
use crate::error::ShellResult;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl AgentStatus {
    /// Connected or on the way there.
    pub fn is_active(self) -> bool {
        matches!(self, AgentStatus::Connected | AgentStatus::Connecting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentMode {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    pub agent_mode: AgentMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_id: Option<String>,
}

impl StartOptions {
    pub fn for_guide(guide_id: impl Into<String>) -> Self {
        Self {
            agent_mode: AgentMode::User,
            guide_id: Some(guide_id.into()),
        }
    }

    /// User-mode options, attaching `SAMMY_GUIDE_ID` when set.
    pub fn from_env(env: &EnvSnapshot) -> Self {
        Self {
            agent_mode: AgentMode::User,
            guide_id: env.get(ENV_GUIDE_ID).map(str::to_string),
        }
    }
}

/// Reference to a session owned by the agent provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: String,
}

/// Read-only projection of the provider's observable session fields.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionTelemetry {
    pub status: AgentStatus,
    pub session_id: Option<String>,
    pub agent_volume: Option<f32>,
    pub user_volume: Option<f32>,
    pub streaming: bool,
    pub last_error: Option<String>,
}

/// The external agent session provider (the SDK).
///
/// The provider owns the session lifecycle and publishes telemetry; the
/// shell only issues commands and reads the published values.
#[async_trait]
pub trait AgentSessionProvider: Send + Sync {
    async fn start_agent(&self, options: StartOptions) -> Result<SessionRef, String>;

    async fn stop_agent(&self);

    fn telemetry(&self) -> watch::Receiver<SessionTelemetry>;
}

/// What presentation code needs from an agent session.
#[async_trait]
pub trait AgentSurface: Send + Sync {
    fn telemetry(&self) -> SessionTelemetry;

    async fn start(&self, options: StartOptions) -> ShellResult<SessionRef>;

    async fn stop(&self);
}

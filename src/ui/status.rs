use super::{Action, Intent};
use crate::session::{AgentStatus, SessionTelemetry};

use serde::Serialize;
use std::fmt;

pub const COLOR_ERROR: &str = "#ff6b6b";
pub const COLOR_CONNECTED: &str = "#51cf66";
pub const COLOR_CONNECTING: &str = "#ffd43b";
pub const COLOR_IDLE: &str = "#868e96";

const VOLUME_BAR_WIDTH: usize = 20;

/// Scale a 0..1 level to a whole percentage, capped at 100.
pub fn volume_percent(level: f32) -> u8 {
    if !level.is_finite() || level <= 0.0 {
        return 0;
    }
    (level * 100.0).min(100.0).round() as u8
}

/// The agent status panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub text: &'static str,
    pub color: &'static str,
    pub session_id: Option<String>,
    /// Only present while connected.
    pub streaming: Option<bool>,
    pub observability: Option<bool>,
    pub agent_volume: Option<u8>,
    pub user_volume: Option<u8>,
    pub error: Option<String>,
}

impl StatusView {
    pub fn new(telemetry: &SessionTelemetry, observability_enabled: bool) -> Self {
        let has_error = telemetry.status == AgentStatus::Error || telemetry.last_error.is_some();
        let connected = telemetry.status == AgentStatus::Connected;

        let (text, color) = if has_error {
            ("Error", COLOR_ERROR)
        } else {
            match telemetry.status {
                AgentStatus::Connected if telemetry.streaming => {
                    ("Active & Listening", COLOR_CONNECTED)
                }
                AgentStatus::Connected => ("Connected", COLOR_CONNECTED),
                AgentStatus::Connecting => ("Connecting...", COLOR_CONNECTING),
                _ => ("Disconnected", COLOR_IDLE),
            }
        };

        Self {
            text,
            color,
            session_id: telemetry.session_id.clone(),
            streaming: connected.then_some(telemetry.streaming),
            observability: connected.then_some(observability_enabled),
            agent_volume: telemetry.agent_volume.filter(|_| connected).map(volume_percent),
            user_volume: telemetry.user_volume.filter(|_| connected).map(volume_percent),
            error: if has_error {
                Some(
                    telemetry
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "Agent session error".to_string()),
                )
            } else {
                None
            },
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn bar(percent: u8) -> String {
    let filled = usize::from(percent) * VOLUME_BAR_WIDTH / 100;
    format!(
        "[{}{}] {percent}%",
        "#".repeat(filled),
        "-".repeat(VOLUME_BAR_WIDTH - filled)
    )
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sammy Agent Status")?;
        writeln!(f, "  Status:        {} ({})", self.text, self.color)?;
        if let Some(id) = &self.session_id {
            writeln!(f, "  Session ID:    {id}")?;
        }
        if let Some(streaming) = self.streaming {
            writeln!(f, "  Streaming:     {}", yes_no(streaming))?;
        }
        if let Some(enabled) = self.observability {
            let label = if enabled { "Enabled" } else { "Disabled" };
            writeln!(f, "  Observability: {label}")?;
        }
        if let Some(v) = self.agent_volume {
            writeln!(f, "  Agent Volume:  {}", bar(v))?;
        }
        if let Some(v) = self.user_volume {
            writeln!(f, "  User Volume:   {}", bar(v))?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "  Error:         {error}")?;
        }
        Ok(())
    }
}

/// The floating start/stop button.
pub fn toggle_button(status: AgentStatus) -> Action {
    if status.is_active() {
        Action::new("Stop Sammy Agent", Intent::StopAgent)
    } else {
        Action::new("Start Sammy Agent", Intent::StartAgent)
    }
}

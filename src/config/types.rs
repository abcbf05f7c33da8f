use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Callback
// ============================================================================

/// Invoked when the agent backend reports that the auth token has expired.
pub type TokenExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// A hook that does nothing, for callers that only deactivate the session.
pub fn noop_token_hook() -> TokenExpiredHook {
    Arc::new(|| {})
}

// ============================================================================
// Capture
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    #[default]
    Render,
    Video,
}

impl std::str::FromStr for CaptureMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "render" => Ok(Self::Render),
            "video" => Ok(Self::Video),
            _ => Err(format!("invalid capture method: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    pub frame_rate: u32,
    /// Encoder quality in `[0, 1]`.
    pub quality: f64,
}

// ============================================================================
// Context injection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContextInjectionFeatures {
    pub memory_search: bool,
    pub page_tracking: bool,
    pub click_tracking: bool,
}

/// Serialises as `false`, `true`, or a feature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextInjection {
    Toggle(bool),
    Selective(ContextInjectionFeatures),
}

impl Default for ContextInjection {
    fn default() -> Self {
        Self::Toggle(false)
    }
}

impl ContextInjection {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Toggle(on) => *on,
            Self::Selective(f) => f.memory_search || f.page_tracking || f.click_tracking,
        }
    }
}

impl std::str::FromStr for ContextInjection {
    type Err = String;

    /// Accepts `true`, `false`, or a comma list of `memory`, `page`, `click`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "true" | "full" => return Ok(Self::Toggle(true)),
            "false" | "off" | "none" => return Ok(Self::Toggle(false)),
            _ => {}
        }

        let mut features = ContextInjectionFeatures::default();
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "memory" | "memorysearch" => features.memory_search = true,
                "page" | "pagetracking" => features.page_tracking = true,
                "click" | "clicktracking" => features.click_tracking = true,
                other => return Err(format!("invalid context injection feature: {other}")),
            }
        }
        if features == ContextInjectionFeatures::default() {
            return Err(format!("invalid context injection: {s}"));
        }
        Ok(Self::Selective(features))
    }
}

// ============================================================================
// Voice
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VadSensitivity {
    #[default]
    Low,
    Medium,
    High,
    Custom,
}

impl std::str::FromStr for VadSensitivity {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("invalid VAD sensitivity: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VadConfig {
    pub sensitivity: VadSensitivity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageConfig {
    pub code: String,
    pub voice: String,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(serialize_with = "serialize_redacted")]
    pub token: String,
    pub base_url: String,
    /// `exp` claim of the token, when it is a JWT that carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub on_token_expired: TokenExpiredHook,
}

impl AuthConfig {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &redact(&self.token))
            .field("base_url", &self.base_url)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Show only enough of a secret to tell two apart.
pub fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "<empty>".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}…({} chars)", secret.chars().count())
}

fn serialize_redacted<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&redact(value))
}

// ============================================================================
// Observability
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    pub batch_size: u32,
    pub batch_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAggregationConfig {
    pub flush_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityConfig {
    pub enabled: bool,
    pub log_to_console: bool,
    pub include_system_prompt: bool,
    pub include_audio_data: bool,
    pub include_image_data: bool,
    pub use_worker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_config: Option<WorkerConfig>,
    pub disable_event_types: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_aggregation: Option<AudioAggregationConfig>,
}

// ============================================================================
// MCP
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    #[default]
    Sse,
    Http,
    WebSocket,
}

impl std::str::FromStr for McpTransport {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sse" => Ok(Self::Sse),
            "http" | "streamable-http" => Ok(Self::Http),
            "websocket" | "ws" => Ok(Self::WebSocket),
            _ => Err(format!("invalid MCP transport: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerDescriptor {
    pub name: String,
    pub transport: McpTransport,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpReconnectPolicy {
    pub delay_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
    pub reconnect: McpReconnectPolicy,
    pub servers: Vec<McpServerDescriptor>,
}

/// Default configuration constants used across the system.

/// Prefix shared by every environment variable the shell reads.
pub const ENV_PREFIX: &str = "SAMMY_";

/// Default agent API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api-dev.sammylabs.com";

/// Live model the agent session runs on.
pub const DEFAULT_MODEL: &str = "models/gemini-live-2.5-flash-preview";

/// Environment name assumed when `SAMMY_ENV` is unset. Debug logging is on
/// only in this environment.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// App version reported in observability metadata.
pub const DEFAULT_APP_VERSION: &str = "1.0.0";

/// Screen capture defaults.
pub const DEFAULT_CAPTURE_FPS: u32 = 2;
pub const DEFAULT_CAPTURE_QUALITY: f64 = 0.8;

/// Voice defaults.
pub const DEFAULT_LANGUAGE_CODE: &str = "en-US";
pub const DEFAULT_VOICE: &str = "Puck";

/// Observability worker batching.
pub const DEFAULT_WORKER_BATCH_SIZE: u32 = 50;
pub const DEFAULT_WORKER_BATCH_INTERVAL_MS: u64 = 5_000;

/// Audio aggregation flush interval (30 seconds).
pub const DEFAULT_AUDIO_FLUSH_INTERVAL_MS: u64 = 30_000;

/// Noisy event types suppressed from observability.
pub const DEFAULT_DISABLED_EVENT_TYPES: &[&str] = &["audio.send", "audio.receive"];

/// MCP connection policy.
pub const DEFAULT_MCP_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MCP_RECONNECT_DELAY_MS: u64 = 5_000;
pub const DEFAULT_MCP_RECONNECT_ATTEMPTS: u32 = 3;

/// Upper bound on waiting for the agent backend to acknowledge a start.
pub const DEFAULT_SESSION_START_TIMEOUT_MS: u64 = 30_000;

/// Development proxy.
pub const DEFAULT_PROXY_LISTEN: &str = "127.0.0.1:3001";
pub const DEFAULT_PROXY_TARGET: &str = "https://app.sammylabs.com";
pub const DEFAULT_PROXY_ALLOW_ORIGIN: &str = "http://localhost:3000";

// Environment variable names.
pub const ENV_JWT_TOKEN: &str = "SAMMY_JWT_TOKEN";
pub const ENV_API_BASE_URL: &str = "SAMMY_API_BASE_URL";
pub const ENV_ENVIRONMENT: &str = "SAMMY_ENV";
pub const ENV_APP_VERSION: &str = "SAMMY_VERSION";
pub const ENV_CAPTURE_METHOD: &str = "SAMMY_CAPTURE_METHOD";
pub const ENV_CAPTURE_FPS: &str = "SAMMY_CAPTURE_FPS";
pub const ENV_CAPTURE_QUALITY: &str = "SAMMY_CAPTURE_QUALITY";
pub const ENV_CONTEXT_INJECTION: &str = "SAMMY_CONTEXT_INJECTION";
pub const ENV_VAD_SENSITIVITY: &str = "SAMMY_VAD_SENSITIVITY";
pub const ENV_LANGUAGE: &str = "SAMMY_LANGUAGE";
pub const ENV_VOICE: &str = "SAMMY_VOICE";
pub const ENV_ENABLE_OBSERVABILITY: &str = "SAMMY_ENABLE_OBSERVABILITY";
pub const ENV_DISABLE_WORKER_MODE: &str = "SAMMY_DISABLE_WORKER_MODE";
pub const ENV_ENABLE_AUDIO_AGGREGATION: &str = "SAMMY_ENABLE_AUDIO_AGGREGATION";
pub const ENV_ENABLE_MCP: &str = "SAMMY_ENABLE_MCP";
pub const ENV_MCP_SERVERS: &str = "SAMMY_MCP_SERVERS";
pub const ENV_TARGET_ELEMENT: &str = "SAMMY_TARGET_ELEMENT";
pub const ENV_GUIDE_ID: &str = "SAMMY_GUIDE_ID";
pub const ENV_PROXY_LISTEN: &str = "SAMMY_PROXY_LISTEN";
pub const ENV_PROXY_TARGET: &str = "SAMMY_PROXY_TARGET";
pub const ENV_PROXY_ALLOW_ORIGIN: &str = "SAMMY_PROXY_ALLOW_ORIGIN";

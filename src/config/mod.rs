mod defaults;
mod env;
mod token;
mod types;
mod validation;

pub use defaults::*;
pub use env::*;
pub use token::*;
pub use types::*;
pub use validation::*;

use crate::error::ShellError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// BCP-47-like language tag: a 2-3 letter primary subtag and optional
/// alphanumeric subtags.
static LANGUAGE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{2,8})*$").expect("valid language tag regex")
});

/// Immutable configuration handed to the agent session provider.
///
/// Built once per provider activation by [`build_config`]; any change means
/// building a new record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub debug_logs: bool,
    pub model: String,
    pub auth: AuthConfig,
    pub capture_method: CaptureMethod,
    pub capture_config: CaptureConfig,
    pub context_injection: ContextInjection,
    pub vad: VadConfig,
    pub language: LanguageConfig,
    pub observability: ObservabilityConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp: Option<McpConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_element: Option<String>,
    /// Wall-clock build time. Excluded from [`ProviderConfig::fingerprint`].
    pub built_at: DateTime<Utc>,
}

impl ProviderConfig {
    /// Canonical JSON of the record with every wall-clock field removed.
    /// Two builds from the same inputs produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.remove("builtAt");
        }
        if let Some(metadata) = value
            .pointer_mut("/observability/metadata")
            .and_then(|m| m.as_object_mut())
        {
            metadata.remove("timestamp");
        }
        value.to_string()
    }
}

/// A field whose supplied value was rejected and replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigWarning {
    pub path: String,
    pub rejected: String,
    pub fallback: String,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: rejected '{}', using '{}'",
            self.path, self.rejected, self.fallback
        )
    }
}

/// Output of [`build_config`].
#[derive(Debug, Clone)]
pub struct ConfigBuild {
    pub config: Arc<ProviderConfig>,
    pub warnings: Vec<ConfigWarning>,
}

/// Named options for [`build_config`]. Every `None` falls back to the
/// environment snapshot, then to the documented default.
///
/// Enum-like fields take raw strings so that unknown values can be reported
/// and substituted instead of failing the build.
#[derive(Clone)]
pub struct ConfigOptions {
    pub token: String,
    pub on_token_expired: TokenExpiredHook,
    pub base_url: Option<String>,
    pub debug: Option<bool>,
    pub capture_method: Option<String>,
    pub capture_fps: Option<u32>,
    pub capture_quality: Option<f64>,
    pub context_injection: Option<ContextInjection>,
    pub vad_sensitivity: Option<String>,
    pub language_code: Option<String>,
    pub voice: Option<String>,
    pub enable_observability: Option<bool>,
    pub log_to_console: Option<bool>,
    pub include_system_prompt: Option<bool>,
    pub include_audio_data: Option<bool>,
    pub include_image_data: Option<bool>,
    pub enable_worker_mode: Option<bool>,
    pub worker_batch_size: Option<u32>,
    pub worker_batch_interval_ms: Option<u64>,
    /// Replaces the suppressed event-type list outright.
    pub disable_event_types: Option<Vec<String>>,
    pub enable_audio_aggregation: Option<bool>,
    pub audio_flush_interval_ms: Option<u64>,
    pub enable_mcp: Option<bool>,
    pub mcp_timeout_ms: Option<u64>,
    pub mcp_reconnect_delay_ms: Option<u64>,
    pub mcp_reconnect_attempts: Option<u32>,
    pub mcp_servers: Option<Vec<McpServerDescriptor>>,
    pub target_element: Option<String>,
    /// Extra observability metadata entries.
    pub metadata: BTreeMap<String, String>,
}

impl ConfigOptions {
    pub fn new(token: impl Into<String>, on_token_expired: TokenExpiredHook) -> Self {
        Self {
            token: token.into(),
            on_token_expired,
            base_url: None,
            debug: None,
            capture_method: None,
            capture_fps: None,
            capture_quality: None,
            context_injection: None,
            vad_sensitivity: None,
            language_code: None,
            voice: None,
            enable_observability: None,
            log_to_console: None,
            include_system_prompt: None,
            include_audio_data: None,
            include_image_data: None,
            enable_worker_mode: None,
            worker_batch_size: None,
            worker_batch_interval_ms: None,
            disable_event_types: None,
            enable_audio_aggregation: None,
            audio_flush_interval_ms: None,
            enable_mcp: None,
            mcp_timeout_ms: None,
            mcp_reconnect_delay_ms: None,
            mcp_reconnect_attempts: None,
            mcp_servers: None,
            target_element: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Options carrying the token from `SAMMY_JWT_TOKEN` (empty when unset).
    pub fn from_env(env: &EnvSnapshot, on_token_expired: TokenExpiredHook) -> Self {
        Self::new(env.get(ENV_JWT_TOKEN).unwrap_or_default(), on_token_expired)
    }
}

impl std::fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("token", &redact(&self.token))
            .field("base_url", &self.base_url)
            .field("capture_method", &self.capture_method)
            .field("vad_sensitivity", &self.vad_sensitivity)
            .field("language_code", &self.language_code)
            .field("target_element", &self.target_element)
            .finish_non_exhaustive()
    }
}

/// Build the provider configuration from explicit options and an
/// environment snapshot.
///
/// Unknown enum-like values are replaced by their defaults and reported in
/// [`ConfigBuild::warnings`]. A missing token, malformed base URL or
/// malformed target selector fails the whole build.
pub fn build_config(options: ConfigOptions, env: &EnvSnapshot) -> Result<ConfigBuild, ShellError> {
    let mut resolver = Resolver::new(env);

    let environment = env.get(ENV_ENVIRONMENT).unwrap_or(DEFAULT_ENVIRONMENT).to_string();
    let is_development = environment == DEFAULT_ENVIRONMENT;
    let debug_logs = options.debug.unwrap_or(is_development);

    let base_url = options
        .base_url
        .clone()
        .or_else(|| env.get(ENV_API_BASE_URL).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string();

    let token = options.token.trim().to_string();
    let expires_at = token_expiry(&token);

    let capture_method = resolver.parsed(
        "captureMethod",
        options.capture_method.as_deref(),
        ENV_CAPTURE_METHOD,
        CaptureMethod::default(),
        "render",
    );
    let capture_config = CaptureConfig {
        frame_rate: resolver.frame_rate(options.capture_fps),
        quality: resolver.quality(options.capture_quality),
    };
    let context_injection = match options.context_injection {
        Some(value) => value,
        None => resolver.parsed(
            "contextInjection",
            None,
            ENV_CONTEXT_INJECTION,
            ContextInjection::default(),
            "false",
        ),
    };
    let vad = VadConfig {
        sensitivity: resolver.parsed(
            "vad.sensitivity",
            options.vad_sensitivity.as_deref(),
            ENV_VAD_SENSITIVITY,
            VadSensitivity::default(),
            "low",
        ),
    };
    let language = LanguageConfig {
        code: resolver.language_code(options.language_code.as_deref()),
        voice: options
            .voice
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| env.get(ENV_VOICE))
            .unwrap_or(DEFAULT_VOICE)
            .to_string(),
    };

    let built_at = Utc::now();
    let observability = resolver.observability(&options, &environment, is_development, built_at);
    let mcp = resolver.mcp(&options);

    let target_element = options
        .target_element
        .clone()
        .or_else(|| env.get(ENV_TARGET_ELEMENT).map(str::to_string));

    let config = ProviderConfig {
        debug_logs,
        model: DEFAULT_MODEL.to_string(),
        auth: AuthConfig {
            token,
            base_url,
            expires_at,
            on_token_expired: options.on_token_expired,
        },
        capture_method,
        capture_config,
        context_injection,
        vad,
        language,
        observability,
        mcp,
        target_element,
        built_at,
    };

    validate_config_object(&config)?;

    if config.auth.is_expired_at(built_at) {
        warn!(
            expires_at = ?config.auth.expires_at,
            "Auth token is already expired; the agent backend will reject it"
        );
    }

    if config.debug_logs {
        debug!(
            language = %config.language.code,
            voice = %config.language.voice,
            token_present = !config.auth.token.is_empty(),
            worker_mode = config.observability.use_worker,
            capture_method = ?config.capture_method,
            base_url = %config.auth.base_url,
            "Resolved provider configuration"
        );
    }

    Ok(ConfigBuild {
        config: Arc::new(config),
        warnings: resolver.warnings,
    })
}

// ============================================================================
// Field resolution
// ============================================================================

struct Resolver<'a> {
    env: &'a EnvSnapshot,
    warnings: Vec<ConfigWarning>,
}

impl<'a> Resolver<'a> {
    fn new(env: &'a EnvSnapshot) -> Self {
        Self {
            env,
            warnings: Vec::new(),
        }
    }

    fn reject(&mut self, path: &str, rejected: impl Into<String>, fallback: impl Into<String>) {
        let warning = ConfigWarning {
            path: path.to_string(),
            rejected: rejected.into(),
            fallback: fallback.into(),
        };
        warn!("Invalid configuration value: {}", warning);
        self.warnings.push(warning);
    }

    /// Option first, then environment, then default. A value that does not
    /// parse falls back to the default with a warning.
    fn parsed<T: std::str::FromStr>(
        &mut self,
        path: &str,
        supplied: Option<&str>,
        env_key: &str,
        default: T,
        default_label: &str,
    ) -> T {
        let raw = supplied.map(str::to_string).or_else(|| self.env.get(env_key).map(str::to_string));
        match raw {
            None => default,
            Some(raw) => match raw.parse() {
                Ok(value) => value,
                Err(_) => {
                    self.reject(path, raw, default_label);
                    default
                }
            },
        }
    }

    fn flag(&mut self, path: &str, supplied: Option<bool>, env_key: &str, default: bool) -> bool {
        if let Some(value) = supplied {
            return value;
        }
        let env = self.env;
        match env.get(env_key) {
            None => default,
            Some(raw) => match parse_flag(raw) {
                Some(value) => value,
                None => {
                    self.reject(path, raw, default.to_string());
                    default
                }
            },
        }
    }

    /// A supplied numeric override must be positive; zero falls back to the
    /// default with a warning.
    fn positive<T>(&mut self, path: &str, supplied: Option<T>, default: T) -> T
    where
        T: Copy + Default + PartialOrd + std::fmt::Display,
    {
        match supplied {
            None => default,
            Some(value) if value > T::default() => value,
            Some(value) => {
                self.reject(path, value.to_string(), default.to_string());
                default
            }
        }
    }

    fn frame_rate(&mut self, supplied: Option<u32>) -> u32 {
        let raw = supplied
            .map(|v| v.to_string())
            .or_else(|| self.env.get(ENV_CAPTURE_FPS).map(str::to_string));
        match raw {
            None => DEFAULT_CAPTURE_FPS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(fps) if fps > 0 => fps,
                _ => {
                    self.reject("captureConfig.frameRate", raw, DEFAULT_CAPTURE_FPS.to_string());
                    DEFAULT_CAPTURE_FPS
                }
            },
        }
    }

    fn quality(&mut self, supplied: Option<f64>) -> f64 {
        let raw = supplied
            .map(|v| v.to_string())
            .or_else(|| self.env.get(ENV_CAPTURE_QUALITY).map(str::to_string));
        match raw {
            None => DEFAULT_CAPTURE_QUALITY,
            Some(raw) => match raw.parse::<f64>() {
                Ok(q) if (0.0..=1.0).contains(&q) => q,
                _ => {
                    self.reject("captureConfig.quality", raw, DEFAULT_CAPTURE_QUALITY.to_string());
                    DEFAULT_CAPTURE_QUALITY
                }
            },
        }
    }

    fn language_code(&mut self, supplied: Option<&str>) -> String {
        let raw = supplied
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| self.env.get(ENV_LANGUAGE).map(str::to_string));
        match raw {
            None => DEFAULT_LANGUAGE_CODE.to_string(),
            Some(code) if LANGUAGE_TAG.is_match(&code) => code,
            Some(code) => {
                self.reject("language.code", code, DEFAULT_LANGUAGE_CODE);
                DEFAULT_LANGUAGE_CODE.to_string()
            }
        }
    }

    fn observability(
        &mut self,
        options: &ConfigOptions,
        environment: &str,
        is_development: bool,
        built_at: DateTime<Utc>,
    ) -> ObservabilityConfig {
        let enabled = self.flag(
            "observability.enabled",
            options.enable_observability,
            ENV_ENABLE_OBSERVABILITY,
            true,
        );
        let worker_disabled = self.flag(
            "observability.useWorker",
            options.enable_worker_mode.map(|on| !on),
            ENV_DISABLE_WORKER_MODE,
            false,
        );
        let use_worker = !worker_disabled;
        let aggregate_audio = self.flag(
            "observability.audioAggregation",
            options.enable_audio_aggregation,
            ENV_ENABLE_AUDIO_AGGREGATION,
            true,
        );

        let mut metadata = BTreeMap::new();
        metadata.insert("environment".to_string(), environment.to_string());
        metadata.insert(
            "timestamp".to_string(),
            built_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        );
        metadata.insert(
            "version".to_string(),
            self.env.get(ENV_APP_VERSION).unwrap_or(DEFAULT_APP_VERSION).to_string(),
        );
        metadata.insert(
            "client".to_string(),
            format!("sammy-shell/{}", env!("CARGO_PKG_VERSION")),
        );
        for (key, value) in &options.metadata {
            metadata.insert(key.clone(), value.clone());
        }

        let worker_config = use_worker.then(|| WorkerConfig {
            batch_size: self.positive(
                "observability.workerConfig.batchSize",
                options.worker_batch_size,
                DEFAULT_WORKER_BATCH_SIZE,
            ),
            batch_interval_ms: self.positive(
                "observability.workerConfig.batchIntervalMs",
                options.worker_batch_interval_ms,
                DEFAULT_WORKER_BATCH_INTERVAL_MS,
            ),
        });
        let audio_aggregation = aggregate_audio.then(|| AudioAggregationConfig {
            flush_interval_ms: self.positive(
                "observability.audioAggregation.flushIntervalMs",
                options.audio_flush_interval_ms,
                DEFAULT_AUDIO_FLUSH_INTERVAL_MS,
            ),
        });
        let disable_event_types = match &options.disable_event_types {
            Some(types) => types
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_DISABLED_EVENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        ObservabilityConfig {
            enabled,
            log_to_console: options.log_to_console.unwrap_or(is_development),
            include_system_prompt: options.include_system_prompt.unwrap_or(true),
            include_audio_data: options.include_audio_data.unwrap_or(false),
            include_image_data: options.include_image_data.unwrap_or(true),
            use_worker,
            worker_config,
            disable_event_types,
            metadata,
            audio_aggregation,
        }
    }

    fn mcp(&mut self, options: &ConfigOptions) -> Option<McpConfig> {
        let enabled = self.flag("mcp.enabled", options.enable_mcp, ENV_ENABLE_MCP, false);
        let servers = match &options.mcp_servers {
            Some(supplied) => {
                let mut servers = Vec::with_capacity(supplied.len());
                for (index, server) in supplied.iter().enumerate() {
                    if self.server_identity(index, &server.name, &server.url) {
                        servers.push(McpServerDescriptor {
                            name: server.name.trim().to_string(),
                            url: server.url.trim().to_string(),
                            ..server.clone()
                        });
                    }
                }
                servers
            }
            None => self.env_mcp_servers(),
        };

        if !enabled && servers.is_empty() {
            return None;
        }

        Some(McpConfig {
            enabled,
            timeout_ms: self.positive("mcp.timeoutMs", options.mcp_timeout_ms, DEFAULT_MCP_TIMEOUT_MS),
            reconnect: McpReconnectPolicy {
                delay_ms: self.positive(
                    "mcp.reconnect.delayMs",
                    options.mcp_reconnect_delay_ms,
                    DEFAULT_MCP_RECONNECT_DELAY_MS,
                ),
                max_attempts: self.positive(
                    "mcp.reconnect.maxAttempts",
                    options.mcp_reconnect_attempts,
                    DEFAULT_MCP_RECONNECT_ATTEMPTS,
                ),
            },
            servers,
        })
    }

    /// A descriptor without a name or url is dropped with a warning.
    fn server_identity(&mut self, index: usize, name: &str, url: &str) -> bool {
        if name.trim().is_empty() || url.trim().is_empty() {
            self.reject(&format!("mcp.servers[{index}]"), "missing name or url", "dropped");
            return false;
        }
        true
    }

    fn env_mcp_servers(&mut self) -> Vec<McpServerDescriptor> {
        #[derive(Deserialize)]
        struct RawServer {
            #[serde(default)]
            name: String,
            transport: Option<String>,
            #[serde(default)]
            url: String,
            #[serde(default)]
            headers: BTreeMap<String, String>,
        }

        let env = self.env;
        let Some(raw) = env.get(ENV_MCP_SERVERS) else {
            return Vec::new();
        };
        let parsed: Vec<RawServer> = match serde_json::from_str(raw) {
            Ok(list) => list,
            Err(e) => {
                warn!("Ignoring malformed {}: {}", ENV_MCP_SERVERS, e);
                self.reject("mcp.servers", raw, "[]");
                return Vec::new();
            }
        };

        let mut servers = Vec::with_capacity(parsed.len());
        for (index, server) in parsed.into_iter().enumerate() {
            if !self.server_identity(index, &server.name, &server.url) {
                continue;
            }
            let name = server.name.trim().to_string();
            let transport = match server.transport.as_deref().map(str::parse::<McpTransport>) {
                None => McpTransport::default(),
                Some(Ok(transport)) => transport,
                Some(Err(_)) => {
                    let rejected = server.transport.clone().unwrap_or_default();
                    self.reject(&format!("mcp.servers[{index}].transport"), rejected, "sse");
                    McpTransport::default()
                }
            };
            servers.push(McpServerDescriptor {
                name,
                transport,
                url: server.url.trim().to_string(),
                headers: server.headers,
            });
        }
        servers
    }
}

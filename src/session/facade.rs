use super::types::*;
use crate::config::{ProviderConfig, DEFAULT_SESSION_START_TIMEOUT_MS};
use crate::error::{ShellError, ShellResult};
use crate::permissions::{PermissionCoordinator, PermissionState};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Translates UI intents into provider calls.
///
/// Provider starts and stops are serialised: a second `start` while one is
/// connecting waits for it and then returns the same session. Permission
/// prompts are awaited outside that lock, so `stop` never waits on the user.
pub struct AgentSession {
    provider: Arc<dyn AgentSessionProvider>,
    config: Arc<ProviderConfig>,
    permissions: PermissionCoordinator,
    start_timeout: Duration,
    active: Mutex<Option<SessionRef>>,
}

impl AgentSession {
    pub fn new(
        provider: Arc<dyn AgentSessionProvider>,
        config: Arc<ProviderConfig>,
        permissions: PermissionCoordinator,
    ) -> Self {
        Self {
            provider,
            config,
            permissions,
            start_timeout: Duration::from_millis(DEFAULT_SESSION_START_TIMEOUT_MS),
            active: Mutex::new(None),
        }
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn config(&self) -> &Arc<ProviderConfig> {
        &self.config
    }

    pub fn permissions(&self) -> &PermissionCoordinator {
        &self.permissions
    }

    pub fn status(&self) -> AgentStatus {
        self.provider.telemetry().borrow().status
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionTelemetry> {
        self.provider.telemetry()
    }

    /// Start a session, acquiring permission first if needed.
    ///
    /// Returns the existing session when one is already connected or
    /// connecting.
    pub async fn start(&self, options: StartOptions) -> ShellResult<SessionRef> {
        if let Some(existing) = self.current_session().await {
            return Ok(existing);
        }

        if self.config.auth.is_expired_at(chrono::Utc::now()) {
            warn!("Refusing to start agent session with an expired token");
            (self.config.auth.on_token_expired)();
            return Err(ShellError::TokenExpired);
        }

        // The prompt has no deadline, so it runs outside the session lock.
        ensure_permission(&self.permissions).await?;

        let mut active = self.active.lock().await;
        if let Some(existing) = active.as_ref() {
            if self.status().is_active() {
                info!(session_id = %existing.session_id, "Agent session already active");
                return Ok(existing.clone());
            }
            *active = None;
        }

        let attempt = Uuid::new_v4();
        info!(%attempt, guide_id = ?options.guide_id, mode = ?options.agent_mode, "Starting agent session");

        match tokio::time::timeout(self.start_timeout, self.provider.start_agent(options)).await {
            Ok(Ok(session)) => {
                info!(%attempt, session_id = %session.session_id, "Agent session started");
                *active = Some(session.clone());
                Ok(session)
            }
            Ok(Err(message)) => {
                error!(%attempt, error = %message, "Agent session failed to start");
                Err(ShellError::SessionStartFailure(message))
            }
            Err(_) => {
                error!(%attempt, timeout = ?self.start_timeout, "Agent session start timed out");
                self.provider.stop_agent().await;
                Err(ShellError::SessionStartTimeout(self.start_timeout))
            }
        }
    }

    async fn current_session(&self) -> Option<SessionRef> {
        let active = self.active.lock().await;
        let existing = active.as_ref().filter(|_| self.status().is_active())?;
        info!(session_id = %existing.session_id, "Agent session already active");
        Some(existing.clone())
    }

    /// Tear down the active session. No-op when nothing is running.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        let had_session = active.take().is_some();
        if !had_session && !self.status().is_active() {
            return;
        }
        self.provider.stop_agent().await;
        info!("Agent session stopped");
    }

    /// Stop when active, start otherwise. Returns the session when started.
    pub async fn toggle(&self, options: StartOptions) -> ShellResult<Option<SessionRef>> {
        if self.is_active() {
            self.stop().await;
            Ok(None)
        } else {
            self.start(options).await.map(Some)
        }
    }

    /// Called when the provider reports that the auth token expired.
    /// Refreshing the token is the embedding application's job.
    pub async fn handle_token_expired(&self) {
        warn!("Auth token expired; deactivating agent session");
        (self.config.auth.on_token_expired)();
        self.stop().await;
    }
}

#[async_trait]
impl AgentSurface for AgentSession {
    fn telemetry(&self) -> SessionTelemetry {
        self.provider.telemetry().borrow().clone()
    }

    async fn start(&self, options: StartOptions) -> ShellResult<SessionRef> {
        AgentSession::start(self, options).await
    }

    async fn stop(&self) {
        AgentSession::stop(self).await
    }
}

/// Make sure the capability is granted, prompting only when a
/// non-prompting check does not already say so.
pub async fn ensure_permission(permissions: &PermissionCoordinator) -> ShellResult<()> {
    let mut state = permissions.state();
    if !state.is_granted() {
        state = permissions.check_permission().await;
    }
    if matches!(state, PermissionState::Prompt | PermissionState::Unknown) {
        state = permissions.request().await;
    }

    let kind = permissions.kind();
    match state {
        PermissionState::Granted => Ok(()),
        PermissionState::Unsupported => Err(ShellError::PermissionUnsupported(kind)),
        PermissionState::Denied => Err(ShellError::PermissionDenied {
            kind,
            reason: permissions
                .last_error()
                .unwrap_or_else(|| format!("{kind} access is blocked")),
        }),
        PermissionState::Error(message) => {
            Err(ShellError::PermissionTransientError { kind, message })
        }
        PermissionState::Prompt | PermissionState::Unknown => Err(ShellError::PermissionDenied {
            kind,
            reason: format!("{kind} permission was not granted"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_config, noop_token_hook, ConfigOptions, EnvSnapshot};
    use crate::permissions::{PermissionKind, PlatformPermission};
    use crate::test_support::{FakeAgentProvider, FakeMediaBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> Arc<ProviderConfig> {
        build_config(ConfigOptions::new("tok", noop_token_hook()), &EnvSnapshot::default())
            .unwrap()
            .config
    }

    fn session(
        provider: &Arc<FakeAgentProvider>,
        backend: &Arc<FakeMediaBackend>,
    ) -> AgentSession {
        let permissions = PermissionCoordinator::new(PermissionKind::Microphone, backend.clone());
        AgentSession::new(provider.clone(), config(), permissions)
    }

    #[tokio::test]
    async fn start_requests_permission_then_connects() {
        let provider = Arc::new(FakeAgentProvider::new());
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Prompt));
        let session = session(&provider, &backend);

        let started = session.start(StartOptions::default()).await.unwrap();
        assert_eq!(backend.prompts.load(Ordering::SeqCst), 1);
        assert_eq!(session.status(), AgentStatus::Connected);
        assert_eq!(AgentSurface::telemetry(&session).session_id, Some(started.session_id));
    }

    #[tokio::test]
    async fn start_while_active_returns_existing_session() {
        let provider = Arc::new(FakeAgentProvider::new());
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Granted));
        let session = session(&provider, &backend);

        let first = session.start(StartOptions::default()).await.unwrap();
        let second = session.start(StartOptions::for_guide("g-1")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.starts.load(Ordering::SeqCst), 1);
        assert_eq!(backend.prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denied_permission_blocks_start() {
        let provider = Arc::new(FakeAgentProvider::new());
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Denied));
        let session = session(&provider, &backend);

        let err = session.start(StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, ShellError::PermissionDenied { .. }));
        assert_eq!(provider.starts.load(Ordering::SeqCst), 0);
        assert_eq!(backend.prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsupported_permission_is_reported_distinctly() {
        let provider = Arc::new(FakeAgentProvider::new());
        let backend = Arc::new(FakeMediaBackend::unsupported());
        let session = session(&provider, &backend);

        assert_eq!(
            session.start(StartOptions::default()).await.unwrap_err(),
            ShellError::PermissionUnsupported(PermissionKind::Microphone)
        );
    }

    #[tokio::test]
    async fn provider_failure_is_session_start_failure() {
        let provider = Arc::new(FakeAgentProvider::new());
        provider.fail_next_start("backend unavailable");
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Granted));
        let session = session(&provider, &backend);

        assert_eq!(
            session.start(StartOptions::default()).await.unwrap_err(),
            ShellError::SessionStartFailure("backend unavailable".into())
        );
        // The user may retry.
        assert!(session.start(StartOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = Arc::new(FakeAgentProvider::new());
        provider.delay_starts(Duration::from_millis(200));
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Granted));
        let session = session(&provider, &backend).with_start_timeout(Duration::from_millis(20));

        assert_eq!(
            session.start(StartOptions::default()).await.unwrap_err(),
            ShellError::SessionStartTimeout(Duration::from_millis(20))
        );
        assert_eq!(session.status(), AgentStatus::Disconnected);
    }

    #[tokio::test]
    async fn stop_without_session_is_noop() {
        let provider = Arc::new(FakeAgentProvider::new());
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Granted));
        let session = session(&provider, &backend);

        session.stop().await;
        assert_eq!(provider.stops.load(Ordering::SeqCst), 0);

        session.start(StartOptions::default()).await.unwrap();
        session.stop().await;
        assert_eq!(provider.stops.load(Ordering::SeqCst), 1);
        assert_eq!(session.status(), AgentStatus::Disconnected);
    }

    #[tokio::test]
    async fn stop_does_not_wait_for_a_pending_prompt() {
        let provider = Arc::new(FakeAgentProvider::new());
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Prompt));
        backend.hold_acquire();
        let session = Arc::new(session(&provider, &backend));

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.start(StartOptions::default()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.prompts.load(Ordering::SeqCst), 1);

        tokio::time::timeout(Duration::from_millis(500), session.stop())
            .await
            .expect("stop should not block on the prompt");
        assert_eq!(provider.stops.load(Ordering::SeqCst), 0);

        tokio::time::timeout(Duration::from_millis(500), session.handle_token_expired())
            .await
            .expect("token expiry should not block on the prompt");

        backend.release_acquire();
        let started = pending.await.unwrap().unwrap();
        assert_eq!(session.status(), AgentStatus::Connected);
        assert_eq!(AgentSurface::telemetry(&*session).session_id, Some(started.session_id));
    }

    #[tokio::test]
    async fn toggle_alternates_start_and_stop() {
        let provider = Arc::new(FakeAgentProvider::new());
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Granted));
        let session = session(&provider, &backend);

        assert!(session.toggle(StartOptions::default()).await.unwrap().is_some());
        assert!(session.is_active());
        assert!(session.toggle(StartOptions::default()).await.unwrap().is_none());
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn token_expiry_fires_hook_and_deactivates() {
        let fired = Arc::new(AtomicUsize::new(0));
        let hook = {
            let fired = fired.clone();
            Arc::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
        };
        let config = build_config(ConfigOptions::new("tok", hook), &EnvSnapshot::default())
            .unwrap()
            .config;
        let provider = Arc::new(FakeAgentProvider::new());
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Granted));
        let permissions = PermissionCoordinator::new(PermissionKind::Microphone, backend.clone());
        let session = AgentSession::new(provider.clone(), config, permissions);

        session.start(StartOptions::default()).await.unwrap();
        session.handle_token_expired().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn expired_jwt_refuses_to_start() {
        use jsonwebtoken::{encode, EncodingKey, Header};
        let token = encode(
            &Header::default(),
            &serde_json::json!({"exp": 1_000_000_000}),
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        let config = build_config(ConfigOptions::new(token, noop_token_hook()), &EnvSnapshot::default())
            .unwrap()
            .config;
        let provider = Arc::new(FakeAgentProvider::new());
        let backend = Arc::new(FakeMediaBackend::new(PlatformPermission::Granted));
        let permissions = PermissionCoordinator::new(PermissionKind::Microphone, backend.clone());
        let session = AgentSession::new(provider.clone(), config, permissions);

        assert_eq!(
            session.start(StartOptions::default()).await.unwrap_err(),
            ShellError::TokenExpired
        );
        assert_eq!(provider.starts.load(Ordering::SeqCst), 0);
    }
}

//! In-memory stand-ins for the platform media API and the agent SDK.

use crate::permissions::{
    MediaPermissionBackend, MediaProbe, PermissionKind, PlatformPermission, ProbeError,
};
use crate::session::{
    AgentSessionProvider, AgentStatus, SessionRef, SessionTelemetry, StartOptions,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Blocks callers while held.
struct Gate {
    held: watch::Sender<bool>,
}

impl Gate {
    fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self { held }
    }

    fn hold(&self) {
        self.held.send_replace(true);
    }

    fn release(&self) {
        self.held.send_replace(false);
    }

    async fn pass(&self) {
        let mut rx = self.held.subscribe();
        let _ = rx.wait_for(|held| !*held).await;
    }
}

// ============================================================================
// Media backend
// ============================================================================

pub(crate) struct FakeMediaBackend {
    query_result: Mutex<Result<PlatformPermission, ProbeError>>,
    acquire_error: Mutex<Option<ProbeError>>,
    query_gate: Gate,
    acquire_gate: Gate,
    pub query_calls: AtomicUsize,
    pub prompts: AtomicUsize,
    pub open_devices: Arc<AtomicUsize>,
}

impl FakeMediaBackend {
    pub fn new(initial: PlatformPermission) -> Self {
        Self {
            query_result: Mutex::new(Ok(initial)),
            acquire_error: Mutex::new(None),
            query_gate: Gate::new(),
            acquire_gate: Gate::new(),
            query_calls: AtomicUsize::new(0),
            prompts: AtomicUsize::new(0),
            open_devices: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unsupported() -> Self {
        let backend = Self::new(PlatformPermission::Prompt);
        *backend.query_result.lock() = Err(ProbeError::Unsupported);
        *backend.acquire_error.lock() = Some(ProbeError::Unsupported);
        backend
    }

    /// The user will refuse the next prompts.
    pub fn refuse_with(&self, reason: &str) {
        *self.acquire_error.lock() = Some(ProbeError::Denied(reason.to_string()));
    }

    pub fn fail_query_with(&self, message: &str) {
        *self.query_result.lock() = Err(ProbeError::Failed(message.to_string()));
    }

    /// Simulate the user changing site settings.
    pub fn set_query(&self, permission: PlatformPermission) {
        *self.query_result.lock() = Ok(permission);
        if permission == PlatformPermission::Granted {
            self.acquire_error.lock().take();
        }
    }

    pub fn hold_query(&self) {
        self.query_gate.hold();
    }

    pub fn release_query(&self) {
        self.query_gate.release();
    }

    pub fn hold_acquire(&self) {
        self.acquire_gate.hold();
    }

    pub fn release_acquire(&self) {
        self.acquire_gate.release();
    }
}

struct FakeProbe {
    open_devices: Arc<AtomicUsize>,
}

impl MediaProbe for FakeProbe {
    fn stop(self: Box<Self>) {
        self.open_devices.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaPermissionBackend for FakeMediaBackend {
    async fn query(&self, _kind: PermissionKind) -> Result<PlatformPermission, ProbeError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        // The answer reflects the platform at call time, not at return time.
        let result = self.query_result.lock().clone();
        self.query_gate.pass().await;
        result
    }

    async fn acquire(&self, _kind: PermissionKind) -> Result<Box<dyn MediaProbe>, ProbeError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.acquire_gate.pass().await;

        let failure = self.acquire_error.lock().clone();
        match failure {
            Some(ProbeError::Denied(reason)) => {
                *self.query_result.lock() = Ok(PlatformPermission::Denied);
                Err(ProbeError::Denied(reason))
            }
            Some(other) => Err(other),
            None => {
                *self.query_result.lock() = Ok(PlatformPermission::Granted);
                self.open_devices.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakeProbe {
                    open_devices: self.open_devices.clone(),
                }))
            }
        }
    }
}

// ============================================================================
// Agent provider
// ============================================================================

pub(crate) struct FakeAgentProvider {
    telemetry: watch::Sender<SessionTelemetry>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    last_options: Mutex<Option<StartOptions>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl FakeAgentProvider {
    pub fn new() -> Self {
        let (telemetry, _) = watch::channel(SessionTelemetry::default());
        Self {
            telemetry,
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            last_options: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_start(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn delay_starts(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn last_options(&self) -> Option<StartOptions> {
        self.last_options.lock().clone()
    }

    pub fn publish(&self, telemetry: SessionTelemetry) {
        self.telemetry.send_replace(telemetry);
    }
}

#[async_trait]
impl AgentSessionProvider for FakeAgentProvider {
    async fn start_agent(&self, options: StartOptions) -> Result<SessionRef, String> {
        let n = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_options.lock() = Some(options);
        self.telemetry.send_modify(|t| t.status = AgentStatus::Connecting);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().take();
        if let Some(message) = failure {
            self.telemetry.send_modify(|t| {
                t.status = AgentStatus::Error;
                t.last_error = Some(message.clone());
            });
            return Err(message);
        }

        let session_id = format!("session-{n}");
        self.telemetry.send_modify(|t| {
            t.status = AgentStatus::Connected;
            t.session_id = Some(session_id.clone());
            t.last_error = None;
        });
        Ok(SessionRef { session_id })
    }

    async fn stop_agent(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.telemetry.send_replace(SessionTelemetry::default());
    }

    fn telemetry(&self) -> watch::Receiver<SessionTelemetry> {
        self.telemetry.subscribe()
    }
}

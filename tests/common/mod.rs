//! Shared fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sammy_shell::permissions::{
    MediaPermissionBackend, MediaProbe, PermissionKind, PlatformPermission, ProbeError,
};
use sammy_shell::session::{
    AgentSessionProvider, AgentStatus, SessionRef, SessionTelemetry, StartOptions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// A browser whose microphone answers with a fixed script.
pub struct ScriptedMicrophone {
    pub permission: Mutex<PlatformPermission>,
    pub user_accepts: Mutex<bool>,
    pub prompts: AtomicUsize,
    pub open_tracks: Arc<AtomicUsize>,
}

impl ScriptedMicrophone {
    pub fn new(permission: PlatformPermission, user_accepts: bool) -> Arc<Self> {
        Arc::new(Self {
            permission: Mutex::new(permission),
            user_accepts: Mutex::new(user_accepts),
            prompts: AtomicUsize::new(0),
            open_tracks: Arc::new(AtomicUsize::new(0)),
        })
    }
}

struct Track(Arc<AtomicUsize>);

impl MediaProbe for Track {
    fn stop(self: Box<Self>) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaPermissionBackend for ScriptedMicrophone {
    async fn query(&self, _kind: PermissionKind) -> Result<PlatformPermission, ProbeError> {
        Ok(*self.permission.lock())
    }

    async fn acquire(&self, _kind: PermissionKind) -> Result<Box<dyn MediaProbe>, ProbeError> {
        let current = *self.permission.lock();
        if current == PlatformPermission::Prompt {
            self.prompts.fetch_add(1, Ordering::SeqCst);
        }
        let accepted = current == PlatformPermission::Granted
            || (current == PlatformPermission::Prompt && *self.user_accepts.lock());
        if !accepted {
            *self.permission.lock() = PlatformPermission::Denied;
            return Err(ProbeError::Denied("Permission denied".to_string()));
        }
        *self.permission.lock() = PlatformPermission::Granted;
        self.open_tracks.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Track(self.open_tracks.clone())))
    }
}

/// An agent SDK that connects immediately.
pub struct InstantAgent {
    telemetry: watch::Sender<SessionTelemetry>,
    pub starts: AtomicUsize,
    pub last_guide: Mutex<Option<String>>,
}

impl InstantAgent {
    pub fn new() -> Arc<Self> {
        let (telemetry, _) = watch::channel(SessionTelemetry::default());
        Arc::new(Self {
            telemetry,
            starts: AtomicUsize::new(0),
            last_guide: Mutex::new(None),
        })
    }

    pub fn set_streaming(&self, streaming: bool, agent_volume: f32) {
        self.telemetry.send_modify(|t| {
            t.streaming = streaming;
            t.agent_volume = Some(agent_volume);
        });
    }
}

#[async_trait]
impl AgentSessionProvider for InstantAgent {
    async fn start_agent(&self, options: StartOptions) -> Result<SessionRef, String> {
        let n = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_guide.lock() = options.guide_id;
        let session_id = format!("sess-{n}");
        self.telemetry.send_modify(|t| {
            t.status = AgentStatus::Connected;
            t.session_id = Some(session_id.clone());
        });
        Ok(SessionRef { session_id })
    }

    async fn stop_agent(&self) {
        self.telemetry.send_replace(SessionTelemetry::default());
    }

    fn telemetry(&self) -> watch::Receiver<SessionTelemetry> {
        self.telemetry.subscribe()
    }
}

use super::state::*;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

type InflightRequest = Shared<BoxFuture<'static, PermissionState>>;

/// Owns the permission state for one capability.
///
/// Clone-cheap (wraps `Arc`). Only the coordinator writes the state; every
/// other component reads it through [`PermissionCoordinator::state`] or a
/// [`PermissionCoordinator::subscribe`] receiver.
#[derive(Clone)]
pub struct PermissionCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    kind: PermissionKind,
    backend: Arc<dyn MediaPermissionBackend>,
    state_tx: watch::Sender<PermissionState>,
    next_ticket: AtomicU64,
    applied: Mutex<Applied>,
    inflight: Mutex<Option<InflightRequest>>,
}

#[derive(Default)]
struct Applied {
    ticket: u64,
    reason: Option<String>,
}

impl PermissionCoordinator {
    pub fn new(kind: PermissionKind, backend: Arc<dyn MediaPermissionBackend>) -> Self {
        let (state_tx, _) = watch::channel(PermissionState::Unknown);
        Self {
            inner: Arc::new(CoordinatorInner {
                kind,
                backend,
                state_tx,
                next_ticket: AtomicU64::new(1),
                applied: Mutex::new(Applied::default()),
                inflight: Mutex::new(None),
            }),
        }
    }

    pub fn kind(&self) -> PermissionKind {
        self.inner.kind
    }

    /// Last applied state.
    pub fn state(&self) -> PermissionState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PermissionState> {
        self.inner.state_tx.subscribe()
    }

    /// Human-readable reason attached to the last `denied` or `error` state.
    pub fn last_error(&self) -> Option<String> {
        self.inner.applied.lock().reason.clone()
    }

    pub fn is_granted(&self) -> bool {
        self.state().is_granted()
    }

    pub fn is_denied(&self) -> bool {
        self.state().is_denied()
    }

    pub fn needs_permission(&self) -> bool {
        self.state().needs_permission()
    }

    /// Query the platform without prompting the user.
    pub async fn check_permission(&self) -> PermissionState {
        let ticket = self.take_ticket();
        let outcome = self.inner.backend.query(self.inner.kind).await;
        let (state, reason) = self.map_query(outcome);
        self.apply(ticket, state, reason)
    }

    /// Re-derive the state from the platform, typically after the user
    /// changed site settings outside the app.
    pub async fn refresh(&self) -> PermissionState {
        info!(kind = %self.inner.kind, "Re-checking permission with the platform");
        self.check_permission().await
    }

    /// Acquire the capability, prompting the user if needed.
    ///
    /// Concurrent callers share one in-flight acquisition and observe the
    /// same result. The probe device is released before this returns.
    pub async fn request(&self) -> PermissionState {
        if self.state() == PermissionState::Unsupported {
            debug!(kind = %self.inner.kind, "Skipping request for unsupported capability");
            return PermissionState::Unsupported;
        }

        let request = {
            let mut inflight = self.inner.inflight.lock();
            match inflight.as_ref() {
                Some(pending) => {
                    debug!(kind = %self.inner.kind, "Joining in-flight permission request");
                    pending.clone()
                }
                None => {
                    let this = self.clone();
                    let pending = async move { this.run_request().await }.boxed().shared();
                    *inflight = Some(pending.clone());
                    pending
                }
            }
        };

        request.await
    }

    async fn run_request(self) -> PermissionState {
        let kind = self.inner.kind;
        info!(kind = %kind, "Requesting permission");

        let outcome = self.inner.backend.acquire(kind).await;
        let (state, reason) = match outcome {
            Ok(probe) => {
                probe.stop();
                info!(kind = %kind, "Permission granted");
                (PermissionState::Granted, None)
            }
            Err(ProbeError::Denied(reason)) => {
                warn!(kind = %kind, reason = %reason, "Permission denied");
                (PermissionState::Denied, Some(reason))
            }
            Err(ProbeError::Unsupported) => {
                warn!(kind = %kind, "Capability unsupported");
                (PermissionState::Unsupported, None)
            }
            Err(ProbeError::Failed(message)) => {
                warn!(kind = %kind, error = %message, "Permission request failed");
                (PermissionState::Error(message.clone()), Some(message))
            }
        };

        self.inner.inflight.lock().take();
        // A request reflects the user's latest action, so it is ordered by
        // completion: any query still in flight is older.
        let ticket = self.take_ticket();
        self.apply(ticket, state, reason)
    }

    fn map_query(
        &self,
        outcome: Result<PlatformPermission, ProbeError>,
    ) -> (PermissionState, Option<String>) {
        match outcome {
            Ok(PlatformPermission::Denied) => (
                PermissionState::Denied,
                Some(format!("{} access is blocked for this site", self.inner.kind)),
            ),
            Ok(permission) => (permission.into(), None),
            Err(ProbeError::Unsupported) => (PermissionState::Unsupported, None),
            Err(ProbeError::Denied(reason)) => (PermissionState::Denied, Some(reason)),
            Err(ProbeError::Failed(message)) => {
                (PermissionState::Error(message.clone()), Some(message))
            }
        }
    }

    fn take_ticket(&self) -> u64 {
        self.inner.next_ticket.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish `state` unless a newer operation has already been applied.
    fn apply(&self, ticket: u64, state: PermissionState, reason: Option<String>) -> PermissionState {
        let mut applied = self.inner.applied.lock();
        if ticket < applied.ticket {
            debug!(
                kind = %self.inner.kind,
                ticket,
                newest = applied.ticket,
                discarded = state.label(),
                "Discarding stale permission result"
            );
            return self.state();
        }
        applied.ticket = ticket;
        applied.reason = reason;
        self.inner.state_tx.send_replace(state.clone());
        state
    }
}

impl std::fmt::Debug for PermissionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCoordinator")
            .field("kind", &self.inner.kind)
            .field("state", &self.state())
            .finish()
    }
}

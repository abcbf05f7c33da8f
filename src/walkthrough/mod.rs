//! Walkthrough orchestration: takes a guide from "available" to a running
//! agent session, detouring through the permission flow when needed.
//!
//! ```text
//! idle -> loading guide -> guide ready -> (permission pending) -> session starting -> session active
//!                  \-> guide error          \-> permission blocked / permission error / unsupported
//! ```
//!
//! Every async step captures the activation epoch before suspending.
//! Closing the prompt bumps the epoch, so late completions are ignored.

use crate::error::ShellError;
use crate::guides::{Guide, GuideSnapshot};
use crate::permissions::{PermissionCoordinator, PermissionState};
use crate::session::{AgentSurface, StartOptions};

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "phase", content = "detail", rename_all = "camelCase")]
pub enum WalkthroughPhase {
    #[default]
    Idle,
    LoadingGuide,
    GuideReady,
    PermissionPending,
    SessionStarting,
    SessionActive,
    GuideError(String),
    PermissionBlocked,
    PermissionError(String),
    Unsupported,
}

struct Machine {
    phase: WalkthroughPhase,
    guide: Option<Guide>,
    epoch: u64,
    modal_open: bool,
    /// The user asked to begin and a permission request is out.
    start_pending: bool,
    /// A session start has been issued for the current epoch.
    start_claimed: bool,
    last_error: Option<String>,
}

pub struct WalkthroughController {
    machine: Mutex<Machine>,
    phase_tx: watch::Sender<WalkthroughPhase>,
    session: Arc<dyn AgentSurface>,
    permissions: PermissionCoordinator,
}

impl WalkthroughController {
    pub fn new(session: Arc<dyn AgentSurface>, permissions: PermissionCoordinator) -> Self {
        let (phase_tx, _) = watch::channel(WalkthroughPhase::Idle);
        Self {
            machine: Mutex::new(Machine {
                phase: WalkthroughPhase::Idle,
                guide: None,
                epoch: 0,
                modal_open: false,
                start_pending: false,
                start_claimed: false,
                last_error: None,
            }),
            phase_tx,
            session,
            permissions,
        }
    }

    pub fn phase(&self) -> WalkthroughPhase {
        self.machine.lock().phase.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalkthroughPhase> {
        self.phase_tx.subscribe()
    }

    pub fn current_guide(&self) -> Option<Guide> {
        self.machine.lock().guide.clone()
    }

    pub fn is_modal_open(&self) -> bool {
        self.machine.lock().modal_open
    }

    /// Error from the last failed session start, if any.
    pub fn last_error(&self) -> Option<String> {
        self.machine.lock().last_error.clone()
    }

    pub fn permissions(&self) -> &PermissionCoordinator {
        &self.permissions
    }

    fn set_phase(&self, machine: &mut Machine, phase: WalkthroughPhase) {
        if machine.phase != phase {
            debug!(from = ?machine.phase, to = ?phase, "Walkthrough transition");
            machine.phase = phase.clone();
            self.phase_tx.send_replace(phase);
        }
    }

    /// Apply a guide-provider update. A newly available guide opens the
    /// start prompt and pre-checks permission without prompting.
    pub async fn on_guide_update(&self, snapshot: &GuideSnapshot) {
        let new_activation = {
            let mut m = self.machine.lock();
            if matches!(
                m.phase,
                WalkthroughPhase::SessionStarting | WalkthroughPhase::SessionActive
            ) {
                return;
            }

            if let Some(message) = &snapshot.guide_error {
                m.guide = None;
                m.start_pending = false;
                m.modal_open = false;
                self.set_phase(&mut m, WalkthroughPhase::GuideError(message.clone()));
                false
            } else if snapshot.is_loading_guide {
                self.set_phase(&mut m, WalkthroughPhase::LoadingGuide);
                false
            } else {
                match &snapshot.current_guide {
                    None => {
                        m.guide = None;
                        m.start_pending = false;
                        m.modal_open = false;
                        self.set_phase(&mut m, WalkthroughPhase::Idle);
                        false
                    }
                    Some(guide) if m.guide.as_ref() == Some(guide) => {
                        if matches!(
                            m.phase,
                            WalkthroughPhase::Idle
                                | WalkthroughPhase::LoadingGuide
                                | WalkthroughPhase::GuideError(_)
                        ) {
                            self.set_phase(&mut m, WalkthroughPhase::GuideReady);
                        }
                        false
                    }
                    Some(guide) => {
                        info!(guide_id = %guide.guide_id, "Guide available");
                        m.guide = Some(guide.clone());
                        m.epoch += 1;
                        m.modal_open = true;
                        m.start_pending = false;
                        m.start_claimed = false;
                        m.last_error = None;
                        self.set_phase(&mut m, WalkthroughPhase::GuideReady);
                        true
                    }
                }
            }
        };

        if new_activation {
            self.permissions.check_permission().await;
        }
    }

    /// The user chose to start the walkthrough.
    pub async fn begin(&self) -> WalkthroughPhase {
        let epoch = {
            let mut m = self.machine.lock();
            if !matches!(
                m.phase,
                WalkthroughPhase::GuideReady | WalkthroughPhase::PermissionError(_)
            ) {
                debug!(phase = ?m.phase, "Ignoring begin outside of guide ready");
                return m.phase.clone();
            }
            m.modal_open = true;
            m.epoch
        };

        let state = self.permissions.check_permission().await;
        {
            let mut m = self.machine.lock();
            if m.epoch != epoch {
                return m.phase.clone();
            }
            match &state {
                PermissionState::Granted => {}
                PermissionState::Unsupported => {
                    self.set_phase(&mut m, WalkthroughPhase::Unsupported);
                    return m.phase.clone();
                }
                PermissionState::Denied => {
                    self.set_phase(&mut m, WalkthroughPhase::PermissionBlocked);
                    return m.phase.clone();
                }
                PermissionState::Prompt | PermissionState::Unknown | PermissionState::Error(_) => {
                    m.start_pending = true;
                    self.set_phase(&mut m, WalkthroughPhase::PermissionPending);
                }
            }
        }

        if state.is_granted() {
            return self.start_session(epoch).await;
        }

        let state = self.permissions.request().await;
        if state.is_granted() {
            return self.on_permission_changed(&state).await;
        }

        let mut m = self.machine.lock();
        if m.epoch != epoch || !m.start_pending {
            return m.phase.clone();
        }
        m.start_pending = false;
        let next = match state {
            PermissionState::Denied => WalkthroughPhase::PermissionBlocked,
            PermissionState::Unsupported => WalkthroughPhase::Unsupported,
            PermissionState::Error(message) => WalkthroughPhase::PermissionError(message),
            _ => WalkthroughPhase::GuideReady,
        };
        self.set_phase(&mut m, next);
        m.phase.clone()
    }

    /// Observe a permission state change. Starts the session the first time
    /// permission turns `granted` while a start is pending; later
    /// notifications are no-ops.
    pub async fn on_permission_changed(&self, state: &PermissionState) -> WalkthroughPhase {
        if !state.is_granted() {
            return self.phase();
        }
        let epoch = {
            let mut m = self.machine.lock();
            if !m.start_pending || m.phase != WalkthroughPhase::PermissionPending {
                return m.phase.clone();
            }
            m.start_pending = false;
            m.epoch
        };
        info!("Permission granted; starting walkthrough");
        self.start_session(epoch).await
    }

    /// "Check again" after the user changed browser settings.
    pub async fn check_again(&self) -> WalkthroughPhase {
        let epoch = {
            let m = self.machine.lock();
            if !matches!(
                m.phase,
                WalkthroughPhase::PermissionBlocked | WalkthroughPhase::PermissionError(_)
            ) {
                return m.phase.clone();
            }
            m.epoch
        };

        let state = self.permissions.refresh().await;
        {
            let mut m = self.machine.lock();
            if m.epoch != epoch {
                return m.phase.clone();
            }
            let next = match &state {
                PermissionState::Granted => None,
                PermissionState::Denied => Some(WalkthroughPhase::PermissionBlocked),
                PermissionState::Unsupported => Some(WalkthroughPhase::Unsupported),
                PermissionState::Error(message) => {
                    Some(WalkthroughPhase::PermissionError(message.clone()))
                }
                PermissionState::Prompt | PermissionState::Unknown => {
                    Some(WalkthroughPhase::GuideReady)
                }
            };
            if let Some(next) = next {
                self.set_phase(&mut m, next);
                return m.phase.clone();
            }
        }

        self.start_session(epoch).await
    }

    /// Close the prompt. Pending work may still finish but can no longer
    /// move the machine.
    pub fn close(&self) {
        let mut m = self.machine.lock();
        m.epoch += 1;
        m.modal_open = false;
        m.start_pending = false;
        m.start_claimed = false;
        if matches!(
            m.phase,
            WalkthroughPhase::PermissionPending
                | WalkthroughPhase::PermissionBlocked
                | WalkthroughPhase::PermissionError(_)
                | WalkthroughPhase::SessionStarting
        ) {
            self.set_phase(&mut m, WalkthroughPhase::GuideReady);
        }
    }

    async fn start_session(&self, epoch: u64) -> WalkthroughPhase {
        let guide_id = {
            let mut m = self.machine.lock();
            if m.epoch != epoch || m.start_claimed {
                return m.phase.clone();
            }
            let Some(guide) = m.guide.clone() else {
                return m.phase.clone();
            };
            m.start_claimed = true;
            self.set_phase(&mut m, WalkthroughPhase::SessionStarting);
            guide.guide_id
        };

        let result = self.session.start(StartOptions::for_guide(guide_id.clone())).await;

        let mut m = self.machine.lock();
        if m.epoch != epoch {
            debug!(%guide_id, "Walkthrough closed while the session was starting");
            return m.phase.clone();
        }
        match result {
            Ok(session) => {
                info!(%guide_id, session_id = %session.session_id, "Walkthrough session active");
                m.modal_open = false;
                m.last_error = None;
                self.set_phase(&mut m, WalkthroughPhase::SessionActive);
            }
            Err(err) => {
                error!(%guide_id, error = %err, "Error starting walkthrough");
                m.start_claimed = false;
                m.last_error = Some(err.to_string());
                let next = match err {
                    ShellError::PermissionDenied { .. } => WalkthroughPhase::PermissionBlocked,
                    ShellError::PermissionUnsupported(_) => WalkthroughPhase::Unsupported,
                    ShellError::PermissionTransientError { message, .. } => {
                        WalkthroughPhase::PermissionError(message)
                    }
                    _ => WalkthroughPhase::GuideReady,
                };
                self.set_phase(&mut m, next);
            }
        }
        m.phase.clone()
    }

    /// Feed guide and permission updates into the machine until either
    /// source closes.
    pub async fn drive(
        &self,
        mut guides: watch::Receiver<GuideSnapshot>,
        mut permissions: watch::Receiver<PermissionState>,
    ) {
        let initial = guides.borrow_and_update().clone();
        self.on_guide_update(&initial).await;

        loop {
            tokio::select! {
                changed = guides.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = guides.borrow_and_update().clone();
                    self.on_guide_update(&snapshot).await;
                }
                changed = permissions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = permissions.borrow_and_update().clone();
                    self.on_permission_changed(&state).await;
                }
            }
        }
        debug!("Walkthrough driver stopped");
    }
}

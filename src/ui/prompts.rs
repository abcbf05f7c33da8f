use super::{Action, Intent, Panel};
use crate::guides::Guide;
use crate::permissions::PermissionState;
use crate::walkthrough::WalkthroughPhase;

const START_NOW: &str = "Start Now";

// ============================================================================
// Microphone permission dialog
// ============================================================================

/// The standalone microphone permission dialog. `None` once granted.
pub fn permission_dialog(
    state: &PermissionState,
    reason: Option<&str>,
    requesting: bool,
) -> Option<Panel> {
    let body = match state {
        PermissionState::Granted => return None,
        PermissionState::Unsupported => Panel::new("Browser Not Supported").line(
            "Your browser doesn't support microphone access. Please use Chrome, Firefox, or Safari on HTTPS.",
        ),
        PermissionState::Error(message) => Panel::new("Microphone Error").line(message.clone()),
        PermissionState::Denied => Panel::new("Microphone Access Blocked")
            .line(reason.unwrap_or(
                "Sammy needs microphone access to work. The browser has blocked microphone access for this site.",
            ))
            .line("To enable microphone access:")
            .steps([
                "Click the lock icon in your browser's address bar",
                "Find \"Microphone\" in the site settings",
                "Change it from \"Block\" to \"Allow\"",
                "Refresh this page",
            ])
            .action(Action::new("Check Again", Intent::CheckAgain)),
        PermissionState::Prompt | PermissionState::Unknown => {
            let enable = if requesting {
                Action::new("Loading...", Intent::RequestPermission).disabled()
            } else {
                Action::new("Enable Microphone & Start Sammy", Intent::RequestPermission)
            };
            Panel::new("Microphone Permission Required")
                .line("Sammy needs access to your microphone to provide voice assistance.")
                .line("Click \"Enable Microphone\" to get started.")
                .action(enable)
        }
    };
    Some(body.action(Action::new("Cancel", Intent::Close)))
}

// ============================================================================
// Walkthrough modal
// ============================================================================

/// The "start walkthrough" modal for the current phase. `None` when the
/// modal is closed or the phase has nothing to show.
pub fn walkthrough_modal(
    phase: &WalkthroughPhase,
    permission: &PermissionState,
    open: bool,
) -> Option<Panel> {
    if !open {
        return None;
    }
    let panel = match phase {
        WalkthroughPhase::SessionStarting => Panel::new("Starting Voice Assistant...")
            .line("Preparing your guided experience"),
        WalkthroughPhase::PermissionBlocked => Panel::new("Microphone Access Blocked")
            .line("To use the voice-guided walkthrough, you need to grant microphone access:")
            .steps([
                "Click the lock/info icon in your browser's address bar",
                "Find \"Microphone\" in the site settings",
                "Change from \"Block\" to \"Allow\"",
                "Click \"Check Again\" below",
            ])
            .action(Action::new("Cancel", Intent::Close))
            .action(Action::new("Check Again", Intent::CheckAgain)),
        WalkthroughPhase::PermissionError(message) => Panel::new("Microphone Error")
            .line(message.clone())
            .action(Action::new("Cancel", Intent::Close))
            .action(Action::new("Try Again", Intent::CheckAgain)),
        WalkthroughPhase::Unsupported => Panel::new("Browser Not Supported")
            .line("Your browser doesn't support microphone access. Please use Chrome, Firefox, or Safari.")
            .action(Action::new("OK", Intent::Close)),
        WalkthroughPhase::GuideReady | WalkthroughPhase::PermissionPending => {
            let pending = *phase == WalkthroughPhase::PermissionPending;
            let mut panel = Panel::new("Start AI Walkthrough Now?")
                .line(
                    "Our AI assistant will walk you through the platform in real time, answering your questions and guiding you step by step based on what's on your screen.",
                )
                .line("- Real-time guidance through the platform")
                .line("- Interactive Q&A as you navigate")
                .line("- Natural voice interaction");
            if permission.needs_permission() || pending {
                panel = panel.line("Clicking \"Start Now\" will request microphone access");
            }
            let start = if pending {
                Action::new("Starting...", Intent::BeginWalkthrough).disabled()
            } else {
                Action::new(START_NOW, Intent::BeginWalkthrough)
            };
            panel.action(Action::new("Not Now", Intent::Close)).action(start)
        }
        WalkthroughPhase::Idle
        | WalkthroughPhase::LoadingGuide
        | WalkthroughPhase::GuideError(_)
        | WalkthroughPhase::SessionActive => return None,
    };
    Some(panel)
}

// ============================================================================
// Guide bubble
// ============================================================================

/// The guide bubble. Hidden without a guide, on guide errors, and once the
/// walkthrough has started.
pub fn guide_bubble(phase: &WalkthroughPhase, guide: Option<&Guide>) -> Option<Panel> {
    match phase {
        WalkthroughPhase::LoadingGuide => Some(Panel::new("Loading walkthrough...")),
        WalkthroughPhase::GuideReady
        | WalkthroughPhase::PermissionPending
        | WalkthroughPhase::PermissionBlocked
        | WalkthroughPhase::PermissionError(_)
        | WalkthroughPhase::Unsupported => {
            let guide = guide?;
            Some(
                Panel::new(guide.display_title())
                    .line(
                        "Make sure to enable microphone access. I'll guide you through this and feel free to ask me any back and forth questions!",
                    )
                    .action(Action::new("Begin SAMMY Walkthrough", Intent::BeginWalkthrough)),
            )
        }
        WalkthroughPhase::Idle
        | WalkthroughPhase::GuideError(_)
        | WalkthroughPhase::SessionStarting
        | WalkthroughPhase::SessionActive => None,
    }
}

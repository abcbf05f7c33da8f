//! Guide-content provider interface.
//!
//! Guides are fetched and owned by the agent SDK; the shell only observes
//! what is currently loaded.

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guide {
    pub guide_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Guide {
    pub fn new(guide_id: impl Into<String>) -> Self {
        Self {
            guide_id: guide_id.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Interactive Walkthrough")
    }
}

/// What the guide provider exposes at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideSnapshot {
    pub current_guide: Option<Guide>,
    pub is_loading_guide: bool,
    pub guide_error: Option<String>,
}

impl GuideSnapshot {
    pub fn loading() -> Self {
        Self {
            is_loading_guide: true,
            ..Self::default()
        }
    }

    pub fn ready(guide: Guide) -> Self {
        Self {
            current_guide: Some(guide),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            guide_error: Some(message.into()),
            ..Self::default()
        }
    }
}

pub trait GuideProvider: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<GuideSnapshot>;
}

/// A guide provider fed by the embedding application.
pub struct GuideFeed {
    tx: watch::Sender<GuideSnapshot>,
}

impl GuideFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(GuideSnapshot::default());
        Self { tx }
    }

    pub fn publish(&self, snapshot: GuideSnapshot) {
        self.tx.send_replace(snapshot);
    }

    pub fn current(&self) -> GuideSnapshot {
        self.tx.borrow().clone()
    }
}

impl Default for GuideFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl GuideProvider for GuideFeed {
    fn subscribe(&self) -> watch::Receiver<GuideSnapshot> {
        self.tx.subscribe()
    }
}

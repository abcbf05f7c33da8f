//! Plain-text presentation of session, permission and walkthrough state.
//!
//! Views are pure functions of snapshots. They carry the user-facing
//! wording and the intent behind each action, and render through
//! `Display` for terminal output.

mod banner;
mod prompts;
mod status;

pub use banner::*;
pub use prompts::*;
pub use status::*;

use serde::Serialize;
use std::fmt;

/// What activating a control asks the shell to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Intent {
    StartAgent,
    StopAgent,
    BeginWalkthrough,
    RequestPermission,
    CheckAgain,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub label: String,
    pub intent: Intent,
    pub enabled: bool,
}

impl Action {
    pub fn new(label: impl Into<String>, intent: Intent) -> Self {
        Self {
            label: label.into(),
            intent,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A titled block of text with optional numbered steps and actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Panel {
    pub heading: String,
    pub body: Vec<String>,
    pub steps: Vec<String>,
    pub actions: Vec<Action>,
}

impl Panel {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: Vec::new(),
            steps: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.body.push(text.into());
        self
    }

    pub fn steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps.extend(steps.into_iter().map(Into::into));
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn find_action(&self, intent: Intent) -> Option<&Action> {
        self.actions.iter().find(|a| a.intent == intent)
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.heading)?;
        for line in &self.body {
            writeln!(f, "{line}")?;
        }
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {}. {step}", i + 1)?;
        }
        if !self.actions.is_empty() {
            let buttons: Vec<String> = self
                .actions
                .iter()
                .map(|a| {
                    if a.enabled {
                        format!("[ {} ]", a.label)
                    } else {
                        format!("( {} )", a.label)
                    }
                })
                .collect();
            writeln!(f, "{}", buttons.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn panel_renders_steps_and_buttons() {
        let panel = Panel::new("Heading")
            .line("Body")
            .steps(["one", "two"])
            .action(Action::new("Cancel", Intent::Close))
            .action(Action::new("Go", Intent::BeginWalkthrough).disabled());

        assert_eq!(
            panel.to_string(),
            "== Heading ==\nBody\n  1. one\n  2. two\n[ Cancel ] ( Go )\n"
        );
    }
}

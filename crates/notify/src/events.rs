//! Prompt types exchanged with a notification surface.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Severity levels for prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - confirmation of a completed action
    Info,
    /// Warning - an action did not complete
    Warning,
    /// Critical - suspicious activity needs a decision
    Critical,
}

impl Severity {
    /// Get display name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

/// One activatable button on a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptButton {
    pub label: String,
}

/// A prompt as handed to the surface: `{title, body, buttons}`.
///
/// Button order is significant; activations report the index into `buttons`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub title: String,
    pub body: String,
    pub buttons: Vec<PromptButton>,
    pub severity: Severity,
}

impl Prompt {
    /// Create a prompt with no buttons.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            buttons: Vec::new(),
            severity,
        }
    }

    /// Append a button.
    #[must_use]
    pub fn button(mut self, label: impl Into<String>) -> Self {
        self.buttons.push(PromptButton {
            label: label.into(),
        });
        self
    }

    /// Labels in activation-index order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.buttons.iter().map(|b| b.label.as_str()).collect()
    }
}

/// Opaque handle identifying a prompt on its surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptHandle(String);

impl PromptHandle {
    /// Fresh, unique handle.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user activated `button_index` on the prompt identified by `handle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub handle: PromptHandle,
    pub button_index: usize,
}

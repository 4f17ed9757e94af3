//! Notification surface for escalation prompts.
//!
//! A prompt is `{title, body, buttons}`. The surface renders it, reports
//! which button index the user activated, and can clear it by handle.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use notify::{activation_channel, Notifier, Prompt, Severity, TerminalSurface};
//!
//! # async fn run() {
//! let (tx, mut rx) = activation_channel();
//! let notifier = Notifier::from_env(Arc::new(TerminalSurface::new(tx)));
//!
//! let prompt = Prompt::new("Suspicious DNS activity", "evil.example (0.90)", Severity::Critical)
//!     .button("Escalate")
//!     .button("Dismiss");
//! if let Some(handle) = notifier.show(prompt).await {
//!     let activation = rx.recv().await;
//!     notifier.clear(&handle).await;
//! }
//! # }
//! ```
//!
//! # Configuration
//!
//! - `NOTIFY_DISABLED`: Set to "true" to suppress every prompt
//!
//! # Architecture
//!
//! - [`NotificationSurface`] trait defines the rendering interface
//! - [`TerminalSurface`] renders prompts with an interactive picker
//! - [`MemorySurface`] records prompts for headless runs and tests
//! - [`Notifier`] fronts one surface, applying the disable switch and logging

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod events;
pub mod surfaces;

pub use error::SurfaceError;
pub use events::{Activation, Prompt, PromptButton, PromptHandle, Severity};
pub use surfaces::memory::MemorySurface;
pub use surfaces::terminal::TerminalSurface;
pub use surfaces::{
    activation_channel, ActivationReceiver, ActivationSender, NotificationSurface,
};

use std::sync::Arc;
use tracing::{debug, error, info};

/// Environment variable to disable all prompts.
const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Front for a single notification surface.
///
/// Surface failures are logged and reported as `None`/ignored so a broken
/// surface never takes down the caller's context.
#[derive(Clone)]
pub struct Notifier {
    surface: Arc<dyn NotificationSurface>,
    disabled: bool,
}

impl Notifier {
    /// Create a notifier over `surface`, honouring `NOTIFY_DISABLED`.
    #[must_use]
    pub fn from_env(surface: Arc<dyn NotificationSurface>) -> Self {
        let disabled = std::env::var(ENV_NOTIFY_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if disabled {
            info!("Prompts disabled via NOTIFY_DISABLED");
        } else {
            info!(surface = surface.name(), "Notification surface initialized");
        }

        Self { surface, disabled }
    }

    /// Create a notifier that always renders on `surface`.
    #[must_use]
    pub fn with_surface(surface: Arc<dyn NotificationSurface>) -> Self {
        Self {
            surface,
            disabled: false,
        }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[must_use]
    pub fn surface_name(&self) -> &'static str {
        self.surface.name()
    }

    /// Show a prompt, returning its handle when it was rendered.
    pub async fn show(&self, prompt: Prompt) -> Option<PromptHandle> {
        if self.disabled {
            debug!(title = %prompt.title, "Prompts disabled, skipping");
            return None;
        }

        match self.surface.show(prompt).await {
            Ok(handle) => {
                debug!(surface = self.surface.name(), %handle, "Prompt shown");
                Some(handle)
            }
            Err(e) => {
                error!(surface = self.surface.name(), error = %e, "Failed to show prompt");
                None
            }
        }
    }

    /// Clear a prompt by handle.
    pub async fn clear(&self, handle: &PromptHandle) {
        if self.disabled {
            return;
        }
        if let Err(e) = self.surface.clear(handle).await {
            error!(surface = self.surface.name(), %handle, error = %e, "Failed to clear prompt");
        }
    }
}

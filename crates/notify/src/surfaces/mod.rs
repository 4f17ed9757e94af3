//! Notification surface implementations.

pub mod memory;
pub mod terminal;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SurfaceError;
use crate::events::{Activation, Prompt, PromptHandle};

/// Where a surface reports which button the user activated.
pub type ActivationSender = mpsc::UnboundedSender<Activation>;

/// Receiving side of [`ActivationSender`].
pub type ActivationReceiver = mpsc::UnboundedReceiver<Activation>;

/// Create a connected activation channel.
#[must_use]
pub fn activation_channel() -> (ActivationSender, ActivationReceiver) {
    mpsc::unbounded_channel()
}

/// Trait for notification surfaces (terminal, in-memory, browser, etc.).
///
/// A surface renders a prompt, later reports button activations through the
/// [`ActivationSender`] it was built with, and can be told to clear a prompt
/// by handle. A cleared prompt must not report further activations.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Get the name of this surface.
    fn name(&self) -> &'static str;

    /// Render a prompt and return its handle.
    async fn show(&self, prompt: Prompt) -> Result<PromptHandle, SurfaceError>;

    /// Remove a prompt. Clearing an unknown handle is not an error.
    async fn clear(&self, handle: &PromptHandle) -> Result<(), SurfaceError>;
}

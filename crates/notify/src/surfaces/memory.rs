//! In-memory notification surface.
//!
//! Keeps every prompt it is asked to show and lets the embedder (or a test)
//! activate buttons programmatically. Used for headless runs and tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{ActivationSender, NotificationSurface};
use crate::error::SurfaceError;
use crate::events::{Activation, Prompt, PromptHandle};

#[derive(Default)]
struct Ledger {
    /// Prompts currently on screen, oldest first
    active: Vec<(PromptHandle, Prompt)>,
    /// Every prompt ever shown, in order
    history: Vec<(PromptHandle, Prompt)>,
    /// Handles cleared explicitly
    cleared: Vec<PromptHandle>,
}

/// Surface that records prompts instead of rendering them.
pub struct MemorySurface {
    ledger: Mutex<Ledger>,
    activations: ActivationSender,
}

impl MemorySurface {
    #[must_use]
    pub fn new(activations: ActivationSender) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            activations,
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prompts still on screen.
    #[must_use]
    pub fn active(&self) -> Vec<(PromptHandle, Prompt)> {
        self.ledger().active.clone()
    }

    /// Every prompt shown so far.
    #[must_use]
    pub fn history(&self) -> Vec<(PromptHandle, Prompt)> {
        self.ledger().history.clone()
    }

    /// Handles that were cleared explicitly.
    #[must_use]
    pub fn cleared(&self) -> Vec<PromptHandle> {
        self.ledger().cleared.clone()
    }

    /// Most recently shown prompt that is still active.
    #[must_use]
    pub fn latest(&self) -> Option<(PromptHandle, Prompt)> {
        self.ledger().active.last().cloned()
    }

    /// Simulate the user pressing `button_index` on `handle`.
    ///
    /// Returns false when the prompt is not active (never shown or cleared).
    pub fn activate(&self, handle: &PromptHandle, button_index: usize) -> bool {
        let live = self.ledger().active.iter().any(|(h, _)| h == handle);
        if !live {
            debug!(%handle, "Ignoring activation of inactive prompt");
            return false;
        }
        self.activations
            .send(Activation {
                handle: handle.clone(),
                button_index,
            })
            .is_ok()
    }
}

#[async_trait]
impl NotificationSurface for MemorySurface {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn show(&self, prompt: Prompt) -> Result<PromptHandle, SurfaceError> {
        if self.activations.is_closed() {
            return Err(SurfaceError::Closed("activation receiver dropped".to_string()));
        }
        let handle = PromptHandle::generate();
        let mut ledger = self.ledger();
        ledger.active.push((handle.clone(), prompt.clone()));
        ledger.history.push((handle.clone(), prompt));
        Ok(handle)
    }

    async fn clear(&self, handle: &PromptHandle) -> Result<(), SurfaceError> {
        let mut ledger = self.ledger();
        ledger.active.retain(|(h, _)| h != handle);
        ledger.cleared.push(handle.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Severity;
    use crate::surfaces::activation_channel;

    fn prompt() -> Prompt {
        Prompt::new("Suspicious DNS activity", "evil.example", Severity::Critical)
            .button("Escalate")
            .button("Dismiss")
    }

    #[tokio::test]
    async fn test_show_and_activate() {
        let (tx, mut rx) = activation_channel();
        let surface = MemorySurface::new(tx);

        let handle = surface.show(prompt()).await.unwrap();
        assert_eq!(surface.active().len(), 1);
        assert!(surface.activate(&handle, 1));

        let activation = rx.recv().await.unwrap();
        assert_eq!(activation.handle, handle);
        assert_eq!(activation.button_index, 1);
    }

    #[tokio::test]
    async fn test_cleared_prompt_does_not_activate() {
        let (tx, mut rx) = activation_channel();
        let surface = MemorySurface::new(tx);

        let handle = surface.show(prompt()).await.unwrap();
        surface.clear(&handle).await.unwrap();

        assert!(surface.active().is_empty());
        assert_eq!(surface.cleared(), vec![handle.clone()]);
        assert!(!surface.activate(&handle, 0));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_show_fails_when_receiver_dropped() {
        let (tx, rx) = activation_channel();
        drop(rx);
        let surface = MemorySurface::new(tx);
        assert!(matches!(
            surface.show(prompt()).await,
            Err(SurfaceError::Closed(_))
        ));
    }
}

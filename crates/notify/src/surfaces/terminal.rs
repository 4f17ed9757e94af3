//! Interactive terminal notification surface.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use tracing::{debug, warn};

use super::{ActivationSender, NotificationSurface};
use crate::error::SurfaceError;
use crate::events::{Activation, Prompt, PromptHandle, Severity};

/// Renders prompts on the controlling terminal with a button picker.
///
/// Only one prompt is on screen at a time; prompts queue behind the terminal
/// lock in the order they were shown. A prompt cleared while still queued is
/// never rendered, and a prompt cleared while on screen does not report its
/// activation.
pub struct TerminalSurface {
    live: Arc<Mutex<HashSet<PromptHandle>>>,
    terminal: Arc<tokio::sync::Mutex<()>>,
    activations: ActivationSender,
}

impl TerminalSurface {
    #[must_use]
    pub fn new(activations: ActivationSender) -> Self {
        Self {
            live: Arc::new(Mutex::new(HashSet::new())),
            terminal: Arc::new(tokio::sync::Mutex::new(())),
            activations,
        }
    }

    fn is_live(live: &Mutex<HashSet<PromptHandle>>, handle: &PromptHandle) -> bool {
        live.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(handle)
    }

    fn headline(prompt: &Prompt) -> String {
        let title = format!("[{}] {}", prompt.severity.as_str(), prompt.title);
        match prompt.severity {
            Severity::Info => title.blue().bold().to_string(),
            Severity::Warning => title.yellow().bold().to_string(),
            Severity::Critical => title.red().bold().to_string(),
        }
    }
}

#[async_trait]
impl NotificationSurface for TerminalSurface {
    fn name(&self) -> &'static str {
        "terminal"
    }

    async fn show(&self, prompt: Prompt) -> Result<PromptHandle, SurfaceError> {
        if prompt.buttons.is_empty() {
            return Err(SurfaceError::InvalidPrompt("prompt has no buttons".to_string()));
        }
        if self.activations.is_closed() {
            return Err(SurfaceError::Closed("activation receiver dropped".to_string()));
        }

        let handle = PromptHandle::generate();
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.clone());

        let live = Arc::clone(&self.live);
        let terminal = Arc::clone(&self.terminal);
        let activations = self.activations.clone();
        let task_handle = handle.clone();

        tokio::spawn(async move {
            let _screen = terminal.lock().await;
            if !Self::is_live(&live, &task_handle) {
                debug!(handle = %task_handle, "Prompt cleared before it was rendered");
                return;
            }

            let headline = Self::headline(&prompt);
            let labels: Vec<String> = prompt.buttons.iter().map(|b| b.label.clone()).collect();
            let body = prompt.body.clone();

            let picked = tokio::task::spawn_blocking(move || {
                println!();
                println!("{headline}");
                println!("{body}");
                Select::with_theme(&ColorfulTheme::default())
                    .items(&labels)
                    .default(0)
                    .interact_opt()
            })
            .await;

            let index = match picked {
                Ok(Ok(Some(index))) => index,
                Ok(Ok(None)) => {
                    debug!(handle = %task_handle, "Prompt closed without a choice");
                    return;
                }
                Ok(Err(e)) => {
                    warn!(handle = %task_handle, error = %e, "Terminal prompt failed");
                    return;
                }
                Err(e) => {
                    warn!(handle = %task_handle, error = %e, "Terminal prompt task panicked");
                    return;
                }
            };

            if !Self::is_live(&live, &task_handle) {
                debug!(handle = %task_handle, "Dropping activation of cleared prompt");
                return;
            }
            live.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&task_handle);

            let _ = activations.send(Activation {
                handle: task_handle,
                button_index: index,
            });
        });

        Ok(handle)
    }

    async fn clear(&self, handle: &PromptHandle) -> Result<(), SurfaceError> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
        Ok(())
    }
}

//! Error types for the notification surface.

use thiserror::Error;

/// Errors that can occur when showing or clearing a prompt.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// Surface has shut down and can no longer render prompts
    #[error("surface closed: {0}")]
    Closed(String),

    /// Prompt is not renderable (e.g. no buttons)
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),
}

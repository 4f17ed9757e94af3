//! Error types for detection service calls.

use thiserror::Error;

/// Errors that can occur when talking to the detection service.
///
/// `Transport` and `MalformedResponse` are never fatal: callers log them and
/// wait for the next cycle. `Status` and `Service` may carry a message the
/// service produced, which escalation surfaces to the user.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// Network failure or timeout
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("service returned HTTP {status}")]
    Status {
        status: u16,
        /// `error` field from a JSON error body, when one was present
        message: Option<String>,
    },

    /// Body had the wrong content type or shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Well-formed response reporting an explicit error
    #[error("service error: {0}")]
    Service(String),

    /// Client could not be constructed
    #[error("client configuration: {0}")]
    Config(String),
}

impl DetectionError {
    /// Message the service itself produced, if any.
    #[must_use]
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            Self::Service(message) => Some(message.as_str()),
            _ => None,
        }
    }

    /// Whether this failure should be retried on the next fixed tick.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { .. } | Self::MalformedResponse(_)
        )
    }
}

impl From<serde_json::Error> for DetectionError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_message() {
        let err = DetectionError::Status {
            status: 500,
            message: Some("db locked".to_string()),
        };
        assert_eq!(err.service_message(), Some("db locked"));
        assert!(err.is_transient());

        let err = DetectionError::Service("unknown domain".to_string());
        assert_eq!(err.service_message(), Some("unknown domain"));
        assert!(!err.is_transient());

        let err = DetectionError::MalformedResponse("expected object".to_string());
        assert_eq!(err.service_message(), None);
    }
}

//! Configuration for the guard engine.
//!
//! Every value has a default and can be overridden through a `MAILGUARD_*`
//! environment variable. Unparseable values fall back to the default.

use std::env;
use std::time::Duration;

use detection::DEFAULT_SERVICE_URL;
use thiserror::Error;

use crate::alerts::escalation::{DEFAULT_DISMISS_WINDOW_MS, DEFAULT_ESCALATION_REASON};
use crate::alerts::poller::DEFAULT_ALERT_THRESHOLD;
use crate::content::context::ContentTimings;

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("alert threshold must be within [0, 1], got {0}")]
    Threshold(f64),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("service URL must start with http:// or https://, got {0}")]
    ServiceUrl(String),
}

/// Guard engine configuration.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Detection service base URL.
    pub service_url: String,
    /// Optional bearer token for the detection service.
    pub api_key: Option<String>,
    /// Per-request timeout (default: 10 seconds).
    pub request_timeout_ms: u64,
    /// Alert poll period (default: 15 seconds).
    pub poll_interval_ms: u64,
    /// Global dismiss window (default: 25 seconds).
    pub dismiss_window_ms: u64,
    /// Minimum alert score to qualify.
    pub alert_threshold: f64,
    /// Justification sent with every resolve call.
    pub escalation_reason: String,
    /// Debounce after user interaction (default: 800ms).
    pub interaction_debounce_ms: u64,
    /// Debounce after a structural change (default: 260ms).
    pub structure_debounce_ms: u64,
    /// Structural observer lifetime per scan cycle (default: 30 seconds).
    pub observer_window_ms: u64,
    /// Banner re-insertion window (default: 10 seconds).
    pub reconcile_window_ms: u64,
    /// Banner reconciliation period (default: 500ms).
    pub reconcile_period_ms: u64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            service_url: env::var("MAILGUARD_SERVICE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string()),
            api_key: env::var("MAILGUARD_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: env_parse("MAILGUARD_REQUEST_TIMEOUT_MS", 10_000),
            poll_interval_ms: env_parse("MAILGUARD_POLL_INTERVAL_MS", 15_000),
            dismiss_window_ms: env_parse(
                "MAILGUARD_DISMISS_WINDOW_MS",
                DEFAULT_DISMISS_WINDOW_MS.unsigned_abs(),
            ),
            alert_threshold: env_parse("MAILGUARD_ALERT_THRESHOLD", DEFAULT_ALERT_THRESHOLD),
            escalation_reason: env::var("MAILGUARD_ESCALATION_REASON")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ESCALATION_REASON.to_string()),
            interaction_debounce_ms: env_parse("MAILGUARD_INTERACTION_DEBOUNCE_MS", 800),
            structure_debounce_ms: env_parse("MAILGUARD_STRUCTURE_DEBOUNCE_MS", 260),
            observer_window_ms: env_parse("MAILGUARD_OBSERVER_WINDOW_MS", 30_000),
            reconcile_window_ms: env_parse("MAILGUARD_RECONCILE_WINDOW_MS", 10_000),
            reconcile_period_ms: env_parse("MAILGUARD_RECONCILE_PERIOD_MS", 500),
        }
    }
}

impl GuardConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.service_url.starts_with("http://") && !self.service_url.starts_with("https://") {
            return Err(ConfigError::ServiceUrl(self.service_url.clone()));
        }
        if !(0.0..=1.0).contains(&self.alert_threshold) {
            return Err(ConfigError::Threshold(self.alert_threshold));
        }
        for (name, value) in [
            ("request timeout", self.request_timeout_ms),
            ("poll interval", self.poll_interval_ms),
            ("dismiss window", self.dismiss_window_ms),
            ("interaction debounce", self.interaction_debounce_ms),
            ("structure debounce", self.structure_debounce_ms),
            ("observer window", self.observer_window_ms),
            ("reconcile window", self.reconcile_window_ms),
            ("reconcile period", self.reconcile_period_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn dismiss_window(&self) -> chrono::Duration {
        to_chrono(self.dismiss_window_ms)
    }

    #[must_use]
    pub fn content_timings(&self) -> ContentTimings {
        ContentTimings {
            interaction_debounce: Duration::from_millis(self.interaction_debounce_ms),
            structure_debounce: Duration::from_millis(self.structure_debounce_ms),
            observer_window: Duration::from_millis(self.observer_window_ms),
            reconcile_window: Duration::from_millis(self.reconcile_window_ms),
            reconcile_period: Duration::from_millis(self.reconcile_period_ms),
        }
    }
}

fn to_chrono(ms: u64) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

//! One poll cycle against the detection service.

use detection::{DetectionError, DetectionService, DomainAlert};
use tracing::{debug, info, warn};

use super::suppression::SuppressionState;
use crate::clock::Clock;

/// Default minimum score for a domain alert to qualify
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.6;

/// What a poll cycle produced.
#[derive(Debug)]
pub enum PollOutcome {
    /// Transport, status, or shape failure; nothing was mutated
    Skipped(DetectionError),
    /// Batch fetched but nothing qualified
    Quiet { fetched: usize },
    /// Non-empty qualifying batch, in arrival order
    Qualified(Vec<DomainAlert>),
}

impl PollOutcome {
    #[must_use]
    pub fn qualifying(&self) -> &[DomainAlert] {
        match self {
            Self::Qualified(batch) => batch,
            _ => &[],
        }
    }
}

/// Fetches alert batches and filters them through the suppression state.
#[derive(Debug, Clone)]
pub struct AlertPoller {
    threshold: f64,
}

impl Default for AlertPoller {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLD)
    }
}

impl AlertPoller {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run one cycle. Never mutates `state`.
    pub async fn poll_once(
        &self,
        service: &dyn DetectionService,
        state: &SuppressionState,
        clock: &dyn Clock,
    ) -> PollOutcome {
        let fetched = service.list_alerts().await;
        self.classify(fetched, state, clock)
    }

    /// Filter a fetched batch, or turn a fetch failure into a skipped cycle.
    ///
    /// The dismiss gate and resolved set are read at classification time, so
    /// a fetch that completes after a dismiss is still suppressed.
    pub fn classify(
        &self,
        fetched: Result<Vec<DomainAlert>, DetectionError>,
        state: &SuppressionState,
        clock: &dyn Clock,
    ) -> PollOutcome {
        let batch = match fetched {
            Ok(batch) => batch,
            Err(e) => {
                warn!(
                    error = %e,
                    transient = e.is_transient(),
                    "Alert poll failed, skipping cycle"
                );
                return PollOutcome::Skipped(e);
            }
        };

        let now = clock.now();
        if state.is_dismissed(now) {
            debug!(fetched = batch.len(), "Alerts dismissed, suppressing batch");
            return PollOutcome::Quiet {
                fetched: batch.len(),
            };
        }

        let qualifying = state.qualifying(&batch, now, self.threshold);
        if qualifying.is_empty() {
            debug!(fetched = batch.len(), "No qualifying alerts");
            PollOutcome::Quiet {
                fetched: batch.len(),
            }
        } else {
            info!(
                fetched = batch.len(),
                qualifying = qualifying.len(),
                "Qualifying DNS alerts"
            );
            PollOutcome::Qualified(qualifying)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::mocks::MockService;
    use crate::clock::ManualClock;
    use chrono::Duration;

    fn service_with(batch: Vec<DomainAlert>) -> MockService {
        let mut service = MockService::new();
        service
            .expect_list_alerts()
            .returning(move || Ok(batch.clone()));
        service
    }

    #[tokio::test]
    async fn test_qualifying_batch() {
        let service = service_with(vec![
            DomainAlert::new("evil.example", 0.9),
            DomainAlert::new("meh.example", 0.3),
        ]);
        let outcome = AlertPoller::default()
            .poll_once(&service, &SuppressionState::new(), &ManualClock::default())
            .await;

        let domains: Vec<_> = outcome.qualifying().iter().map(|a| a.domain.as_str()).collect();
        assert_eq!(domains, vec!["evil.example"]);
    }

    #[tokio::test]
    async fn test_dismissed_batch_is_quiet() {
        let clock = ManualClock::default();
        let mut state = SuppressionState::new();
        state.dismiss(clock.now(), Duration::seconds(25));
        clock.advance(Duration::seconds(1));

        let service = service_with(vec![DomainAlert::new("evil.example", 0.9)]);
        let outcome = AlertPoller::default().poll_once(&service, &state, &clock).await;
        assert!(matches!(outcome, PollOutcome::Quiet { fetched: 1 }));
    }

    #[tokio::test]
    async fn test_failure_skips_cycle() {
        let mut service = MockService::new();
        service
            .expect_list_alerts()
            .times(1)
            .returning(|| Err(DetectionError::MalformedResponse("expected object".to_string())));

        let state = SuppressionState::new();
        let outcome = AlertPoller::default()
            .poll_once(&service, &state, &ManualClock::default())
            .await;
        assert!(matches!(
            outcome,
            PollOutcome::Skipped(DetectionError::MalformedResponse(_))
        ));
        assert!(outcome.qualifying().is_empty());
        assert!(state.dismissed_until().is_none());
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let service = service_with(vec![DomainAlert::new("borderline.example", 0.55)]);
        let outcome = AlertPoller::new(0.5)
            .poll_once(&service, &SuppressionState::new(), &ManualClock::default())
            .await;
        assert_eq!(outcome.qualifying().len(), 1);
    }

    #[test]
    fn test_classify_after_dismiss_is_quiet() {
        let clock = ManualClock::default();
        let mut state = SuppressionState::new();
        let fetched = Ok(vec![DomainAlert::new("evil.example", 0.9)]);
        state.dismiss(clock.now(), Duration::seconds(25));

        let outcome = AlertPoller::default().classify(fetched, &state, &clock);
        assert!(matches!(outcome, PollOutcome::Quiet { fetched: 1 }));
    }
}

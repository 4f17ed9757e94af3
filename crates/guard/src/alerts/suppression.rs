//! Session-scoped suppression state.
//!
//! Owned by the escalation coordinator and passed explicitly; there is no
//! process-global instance, so every test and every session starts fresh.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use detection::DomainAlert;
use serde::Serialize;

/// Global dismiss window plus the monotonically growing resolved-domain set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuppressionState {
    dismissed_until: Option<DateTime<Utc>>,
    resolved: BTreeSet<String>,
}

impl SuppressionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dismissed_until(&self) -> Option<DateTime<Utc>> {
        self.dismissed_until
    }

    /// True while the dismiss window covers `now`.
    #[must_use]
    pub fn is_dismissed(&self, now: DateTime<Utc>) -> bool {
        self.dismissed_until.is_some_and(|until| now < until)
    }

    /// Pause all alert surfacing until `now + window`.
    pub fn dismiss(&mut self, now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
        let until = now + window;
        self.dismissed_until = Some(until);
        until
    }

    /// Record a resolved domain. Returns false if it was already resolved.
    pub fn mark_resolved(&mut self, domain: &str) -> bool {
        self.resolved.insert(normalize(domain))
    }

    #[must_use]
    pub fn is_resolved(&self, domain: &str) -> bool {
        self.resolved.contains(&normalize(domain))
    }

    /// Resolved domains in sorted order.
    pub fn resolved_domains(&self) -> impl Iterator<Item = &str> {
        self.resolved.iter().map(String::as_str)
    }

    /// Alerts that should be surfaced from `batch`.
    ///
    /// Empty while dismissed. Otherwise drops resolved domains and anything
    /// scoring under `threshold`, keeping batch order and the first entry
    /// for a domain that appears twice.
    #[must_use]
    pub fn qualifying(
        &self,
        batch: &[DomainAlert],
        now: DateTime<Utc>,
        threshold: f64,
    ) -> Vec<DomainAlert> {
        if self.is_dismissed(now) {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        batch
            .iter()
            .filter(|alert| !self.resolved.contains(&alert.key()))
            .filter(|alert| alert.score >= threshold)
            .filter(|alert| seen.insert(alert.key()))
            .cloned()
            .collect()
    }
}

fn normalize(domain: &str) -> String {
    domain.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const THRESHOLD: f64 = 0.6;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn domains(alerts: &[DomainAlert]) -> Vec<&str> {
        alerts.iter().map(|a| a.domain.as_str()).collect()
    }

    #[test]
    fn test_threshold_and_order() {
        let state = SuppressionState::new();
        let batch = vec![
            DomainAlert::new("c.example", 0.61),
            DomainAlert::new("low.example", 0.59),
            DomainAlert::new("a.example", 0.6),
        ];
        let out = state.qualifying(&batch, t0(), THRESHOLD);
        assert_eq!(domains(&out), vec!["c.example", "a.example"]);
    }

    #[test]
    fn test_resolved_domains_never_qualify() {
        let mut state = SuppressionState::new();
        assert!(state.mark_resolved("Evil.Example"));
        assert!(!state.mark_resolved("evil.example"));

        let batch = vec![
            DomainAlert::new("evil.example", 0.99),
            DomainAlert::new("other.example", 0.9),
        ];
        let out = state.qualifying(&batch, t0(), THRESHOLD);
        assert_eq!(domains(&out), vec!["other.example"]);
        assert_eq!(state.resolved_domains().collect::<Vec<_>>(), vec!["evil.example"]);
    }

    #[test]
    fn test_dismiss_window_is_exactly_25_seconds() {
        let mut state = SuppressionState::new();
        let batch = vec![DomainAlert::new("evil.example", 0.9)];

        let until = state.dismiss(t0(), Duration::milliseconds(25_000));
        assert_eq!(until, t0() + Duration::seconds(25));

        let just_before = t0() + Duration::milliseconds(24_900);
        let just_after = t0() + Duration::milliseconds(25_100);
        assert!(state.qualifying(&batch, just_before, THRESHOLD).is_empty());
        assert_eq!(
            domains(&state.qualifying(&batch, just_after, THRESHOLD)),
            vec!["evil.example"]
        );
        // the boundary itself is no longer dismissed
        assert!(!state.is_dismissed(until));
    }

    #[test]
    fn test_dismiss_gates_every_domain() {
        let mut state = SuppressionState::new();
        state.dismiss(t0(), Duration::seconds(25));
        let batch = vec![
            DomainAlert::new("never-seen.example", 1.0),
            DomainAlert::new("another.example", 0.95),
        ];
        assert!(state
            .qualifying(&batch, t0() + Duration::seconds(1), THRESHOLD)
            .is_empty());
    }

    #[test]
    fn test_duplicate_domains_collapse() {
        let state = SuppressionState::new();
        let batch = vec![
            DomainAlert::new("dup.example", 0.7),
            DomainAlert::new("DUP.example", 0.9),
        ];
        let out = state.qualifying(&batch, t0(), THRESHOLD);
        assert_eq!(out.len(), 1);
        assert!((out[0].score - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_output_is_subset_of_input_minus_resolved() {
        let mut state = SuppressionState::new();
        state.mark_resolved("r1.example");
        let batch: Vec<_> = (0..20)
            .map(|i| {
                let name = if i % 3 == 0 {
                    "r1.example".to_string()
                } else {
                    format!("d{i}.example")
                };
                DomainAlert::new(name, f64::from(i) / 20.0)
            })
            .collect();

        for alert in state.qualifying(&batch, t0(), THRESHOLD) {
            assert!(batch.contains(&alert));
            assert!(!state.is_resolved(&alert.domain));
            assert!(alert.score >= THRESHOLD);
        }
    }
}

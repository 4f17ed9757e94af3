//! Page-local presentation of pushed DNS alerts.
//!
//! The "already shown" set here is scoped to the bound content unit and is
//! unrelated to the session-wide resolved-domain set kept by the coordinator.

use std::collections::HashSet;

use detection::DomainAlert;
use tracing::debug;

use super::page::{DnsAlertView, PageSurface, View, ViewId};

#[derive(Debug, Default)]
pub struct DnsAlertPresenter {
    shown: HashSet<String>,
    views: Vec<ViewId>,
}

impl DnsAlertPresenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount one persistent view per domain not yet shown. Returns how many
    /// views were mounted.
    pub fn present(&mut self, page: &mut dyn PageSurface, alerts: &[DomainAlert]) -> usize {
        let mut mounted = 0;
        for alert in alerts {
            if !self.shown.insert(alert.key()) {
                continue;
            }
            let id = page.mount(View::DnsAlert(DnsAlertView {
                domain: alert.domain.clone(),
                score: alert.score,
                reasons: alert.reasons.clone(),
            }));
            self.views.push(id);
            mounted += 1;
        }
        if mounted > 0 {
            debug!(mounted, total = self.shown.len(), "DNS alert views mounted");
        }
        mounted
    }

    /// Forget shown domains and remove their views.
    pub fn reset(&mut self, page: &mut dyn PageSurface) {
        for id in self.views.drain(..) {
            page.remove(id);
        }
        self.shown.clear();
    }

    #[must_use]
    pub fn has_shown(&self, domain: &str) -> bool {
        self.shown.contains(&domain.trim().to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::page::MemoryPage;

    #[test]
    fn test_each_domain_shown_once() {
        let mut page = MemoryPage::new();
        let mut presenter = DnsAlertPresenter::new();

        let batch = vec![
            DomainAlert::new("evil.example", 0.9),
            DomainAlert::new("tunnel.example", 0.7),
        ];
        assert_eq!(presenter.present(&mut page, &batch), 2);
        assert_eq!(presenter.present(&mut page, &batch), 0);
        assert_eq!(
            presenter.present(&mut page, &[DomainAlert::new("EVIL.example", 0.95)]),
            0
        );
        assert_eq!(page.attached_of("dns_alert").len(), 2);
    }

    #[test]
    fn test_reset_allows_reshow() {
        let mut page = MemoryPage::new();
        let mut presenter = DnsAlertPresenter::new();
        let batch = vec![DomainAlert::new("evil.example", 0.9)];

        presenter.present(&mut page, &batch);
        presenter.reset(&mut page);
        assert!(!presenter.has_shown("evil.example"));
        assert!(page.attached_of("dns_alert").is_empty());

        assert_eq!(presenter.present(&mut page, &batch), 1);
    }
}

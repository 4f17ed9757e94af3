//! Presentation of the latest scan verdict.
//!
//! The banner owns the page for the bound content unit. Every verdict is
//! presented with remove-then-mount, never by diffing, so a verdict racing a
//! content change or a poll update always leaves exactly one banner behind.

use std::time::Duration;

use detection::{ScanVerdict, VerdictLabel};
use serde::Serialize;
use tracing::{debug, info};

use super::fingerprint::Fingerprint;
use super::page::{BannerView, DetailView, PageSurface, View, ViewId};

/// Banner severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// High at 0.8 and above, medium from 0.5, low otherwise.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Result of one reconciliation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Banner still attached, keep watching
    Watching,
    /// Host removed the banner; it was mounted again
    Reinserted,
    /// Window elapsed or nothing to watch
    Stopped,
}

#[derive(Debug)]
struct Presented {
    fingerprint: Fingerprint,
    verdict: ScanVerdict,
    banner: ViewId,
}

/// Banner and detail overlay for the bound content unit.
///
/// The re-insertion watcher is bounded in reconcile ticks, not wall time:
/// `window / period` ticks after a verdict is presented the watcher stops.
#[derive(Debug)]
pub struct BannerLifecycle {
    current: Option<Presented>,
    detail: Option<ViewId>,
    ticks_left: Option<u32>,
    window_ticks: u32,
}

fn headline(label: VerdictLabel) -> &'static str {
    match label {
        VerdictLabel::Phishing => "Phishing detected",
        VerdictLabel::Suspicious => "Suspicious message",
        VerdictLabel::Benign => "Likely safe",
    }
}

fn banner_view(fingerprint: &Fingerprint, verdict: &ScanVerdict) -> View {
    View::Banner(BannerView {
        fingerprint: fingerprint.clone(),
        severity: Severity::from_score(verdict.score),
        label: verdict.label,
        score: verdict.score,
        headline: headline(verdict.label).to_string(),
        reason_count: verdict.reasons.len(),
    })
}

impl BannerLifecycle {
    #[must_use]
    pub fn new(reconcile_window: Duration, reconcile_period: Duration) -> Self {
        let ticks = reconcile_window.as_millis() / reconcile_period.as_millis().max(1);
        Self {
            current: None,
            detail: None,
            ticks_left: None,
            window_ticks: u32::try_from(ticks).unwrap_or(u32::MAX).max(1),
        }
    }

    #[must_use]
    pub fn banner_id(&self) -> Option<ViewId> {
        self.current.as_ref().map(|p| p.banner)
    }

    #[must_use]
    pub fn detail_id(&self) -> Option<ViewId> {
        self.detail
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.ticks_left.is_some()
    }

    /// Replace whatever is shown with a fresh banner for `verdict`.
    pub fn present_verdict(
        &mut self,
        page: &mut dyn PageSurface,
        fingerprint: Fingerprint,
        verdict: ScanVerdict,
    ) -> ViewId {
        self.remove_all(page);

        let severity = Severity::from_score(verdict.score);
        let banner = page.mount(banner_view(&fingerprint, &verdict));
        info!(
            fingerprint = %fingerprint,
            label = verdict.label.as_str(),
            score = verdict.score,
            severity = severity.as_str(),
            "Banner mounted"
        );

        self.current = Some(Presented {
            fingerprint,
            verdict,
            banner,
        });
        self.ticks_left = Some(self.window_ticks);
        banner
    }

    /// One reconcile tick: re-insert the banner if the host page dropped it.
    ///
    /// The tick that exhausts the window stops the watcher without checking.
    pub fn reconcile(&mut self, page: &mut dyn PageSurface) -> Reconcile {
        let (Some(remaining), Some(current)) = (self.ticks_left, self.current.as_mut()) else {
            self.ticks_left = None;
            return Reconcile::Stopped;
        };

        if remaining <= 1 {
            debug!(fingerprint = %current.fingerprint, "Reconciliation window closed");
            self.ticks_left = None;
            return Reconcile::Stopped;
        }
        self.ticks_left = Some(remaining - 1);

        if page.is_attached(current.banner) {
            return Reconcile::Watching;
        }

        current.banner = page.mount(banner_view(&current.fingerprint, &current.verdict));
        debug!(fingerprint = %current.fingerprint, "Banner re-inserted after host re-render");
        Reconcile::Reinserted
    }

    /// Open the detail overlay, replacing any existing one.
    pub fn open_detail(&mut self, page: &mut dyn PageSurface) -> Option<ViewId> {
        let current = self.current.as_ref()?;
        if let Some(existing) = self.detail.take() {
            page.remove(existing);
        }

        let view = View::Detail(DetailView {
            label: current.verdict.label,
            score: current.verdict.score,
            reasons: current.verdict.reasons.clone(),
            matched_domains: current
                .verdict
                .dns_alerts
                .iter()
                .map(|a| a.domain.clone())
                .collect(),
        });
        let id = page.mount(view);
        self.detail = Some(id);
        Some(id)
    }

    /// Close the detail overlay. Returns false when none was open.
    pub fn close_detail(&mut self, page: &mut dyn PageSurface) -> bool {
        match self.detail.take() {
            Some(id) => {
                page.remove(id);
                true
            }
            None => false,
        }
    }

    /// A click landed on the page; outside the overlay's content it closes.
    pub fn click(&mut self, page: &mut dyn PageSurface, inside_detail: bool) -> bool {
        if inside_detail {
            return false;
        }
        self.close_detail(page)
    }

    /// Remove banner and overlay and stop watching.
    pub fn remove_all(&mut self, page: &mut dyn PageSurface) {
        if let Some(previous) = self.current.take() {
            page.remove(previous.banner);
        }
        self.close_detail(page);
        self.ticks_left = None;
    }
}

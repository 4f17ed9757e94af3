//! Redundant-scan suppression.

use detection::ContentUnit;
use tracing::debug;

use super::fingerprint::Fingerprint;

/// A scan the deduper decided to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTicket {
    pub fingerprint: Fingerprint,
    pub unit: ContentUnit,
    /// Whether the bound fingerprint changed (as opposed to a forced rescan)
    pub rebound: bool,
}

/// Tracks the fingerprint currently bound to the page.
#[derive(Debug, Default)]
pub struct ContentDeduper {
    bound: Option<Fingerprint>,
}

impl ContentDeduper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bound(&self) -> Option<&Fingerprint> {
        self.bound.as_ref()
    }

    /// Decide whether `unit` needs a scan, binding its fingerprint if so.
    pub fn on_change(&mut self, unit: ContentUnit, force: bool) -> Option<ScanTicket> {
        if unit.is_empty() {
            debug!("Empty content unit, nothing to scan");
            return None;
        }

        let fingerprint = Fingerprint::of(&unit);
        let unchanged = self.bound.as_ref() == Some(&fingerprint);
        if unchanged && !force {
            debug!(fingerprint = %fingerprint, "Content unchanged, skipping scan");
            return None;
        }

        self.bound = Some(fingerprint.clone());
        Some(ScanTicket {
            fingerprint,
            unit,
            rebound: !unchanged,
        })
    }

    /// Whether a verdict requested for `fingerprint` may still be presented.
    #[must_use]
    pub fn accepts(&self, fingerprint: &Fingerprint) -> bool {
        self.bound.as_ref() == Some(fingerprint)
    }

    /// Forget the binding so the next extraction always scans.
    pub fn unbind(&mut self) {
        self.bound = None;
    }
}

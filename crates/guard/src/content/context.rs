//! Per-page content context.
//!
//! Owns the page surface and every piece of per-unit state: the deduper,
//! banner lifecycle, DNS alert presenter, debouncers and the structural
//! observation window. Events are handled strictly in arrival order from a
//! single mailbox; timers and scan replies post back into that mailbox.

use std::time::Duration;

use detection::{DomainAlert, ScanVerdict};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::banner::{BannerLifecycle, Reconcile};
use super::deduper::ContentDeduper;
use super::dns::DnsAlertPresenter;
use super::fingerprint::Fingerprint;
use super::page::PageSurface;
use crate::alerts::context::BackgroundHandle;
use crate::schedule::{Debouncer, ObservationWindow, TaskSlot};

/// Timer settings for a content context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentTimings {
    /// Quiet period after user interaction before scanning
    pub interaction_debounce: Duration,
    /// Quiet period after a structural change before scanning
    pub structure_debounce: Duration,
    /// How long the structural observer stays attached per scan cycle
    pub observer_window: Duration,
    /// How long the banner is re-inserted after host re-renders
    pub reconcile_window: Duration,
    /// Gap between reconciliation checks
    pub reconcile_period: Duration,
}

impl Default for ContentTimings {
    fn default() -> Self {
        Self {
            interaction_debounce: Duration::from_millis(800),
            structure_debounce: Duration::from_millis(260),
            observer_window: Duration::from_secs(30),
            reconcile_window: Duration::from_secs(10),
            reconcile_period: Duration::from_millis(500),
        }
    }
}

/// Everything a content context reacts to.
#[derive(Debug)]
pub enum ContentEvent {
    /// Click or key press on the host page
    UserInteraction,
    /// Structural change under the content root
    StructuralChange,
    /// Scan immediately; `force` bypasses the unchanged-content check
    Rescan { force: bool },
    InteractionSettled(u64),
    StructureSettled(u64),
    ObserverExpired(u64),
    ReconcileTick(u64),
    /// Scan reply for the fingerprint it was requested for
    VerdictReady {
        fingerprint: Fingerprint,
        result: Result<ScanVerdict, String>,
    },
    /// Qualifying batch pushed by the background context
    AlertsPushed(Vec<DomainAlert>),
    OpenDetail,
    CloseDetail,
    Click { inside_detail: bool },
    Shutdown,
}

/// Cheap clonable sender into a content context.
#[derive(Debug, Clone)]
pub struct ContentHandle {
    tx: mpsc::UnboundedSender<ContentEvent>,
}

impl ContentHandle {
    /// Post an event. False once the context has stopped.
    pub fn send(&self, event: ContentEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn user_interaction(&self) -> bool {
        self.send(ContentEvent::UserInteraction)
    }

    pub fn structural_change(&self) -> bool {
        self.send(ContentEvent::StructuralChange)
    }

    pub fn rescan(&self, force: bool) -> bool {
        self.send(ContentEvent::Rescan { force })
    }

    pub fn push_alerts(&self, batch: Vec<DomainAlert>) -> bool {
        self.send(ContentEvent::AlertsPushed(batch))
    }

    pub fn open_detail(&self) -> bool {
        self.send(ContentEvent::OpenDetail)
    }

    pub fn close_detail(&self) -> bool {
        self.send(ContentEvent::CloseDetail)
    }

    pub fn click(&self, inside_detail: bool) -> bool {
        self.send(ContentEvent::Click { inside_detail })
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(ContentEvent::Shutdown);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Content context state. Built and started by [`ContentContext::spawn`].
pub struct ContentContext {
    page: Box<dyn PageSurface>,
    background: BackgroundHandle,
    tx: mpsc::UnboundedSender<ContentEvent>,
    deduper: ContentDeduper,
    banner: BannerLifecycle,
    dns: DnsAlertPresenter,
    interaction: Debouncer,
    structure: Debouncer,
    observer: ObservationWindow,
    reconcile: TaskSlot,
    reconcile_period: Duration,
}

impl ContentContext {
    /// Start a content context for `page` and subscribe it to pushed alerts.
    ///
    /// The first scan runs once the interaction debounce elapses, giving the
    /// host page time to render. The context runs until it receives
    /// [`ContentEvent::Shutdown`]; on exit every mounted view is removed.
    pub fn spawn(
        page: Box<dyn PageSurface>,
        background: BackgroundHandle,
        timings: ContentTimings,
    ) -> (ContentHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ContentHandle { tx: tx.clone() };
        if !background.subscribe(handle.clone()) {
            warn!("Background context unavailable, DNS alerts will not be pushed");
        }

        let context = Self {
            page,
            background,
            tx,
            deduper: ContentDeduper::new(),
            banner: BannerLifecycle::new(timings.reconcile_window, timings.reconcile_period),
            dns: DnsAlertPresenter::new(),
            interaction: Debouncer::new(timings.interaction_debounce),
            structure: Debouncer::new(timings.structure_debounce),
            observer: ObservationWindow::new(timings.observer_window),
            reconcile: TaskSlot::new(),
            reconcile_period: timings.reconcile_period,
        };
        let task = tokio::spawn(context.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ContentEvent>) {
        debug!("Content context started");
        self.interaction
            .trigger(&self.tx, ContentEvent::InteractionSettled);

        while let Some(event) = rx.recv().await {
            if matches!(event, ContentEvent::Shutdown) {
                break;
            }
            self.handle(event);
        }

        self.teardown();
        debug!("Content context stopped");
    }

    fn handle(&mut self, event: ContentEvent) {
        match event {
            ContentEvent::UserInteraction => {
                self.interaction
                    .trigger(&self.tx, ContentEvent::InteractionSettled);
            }
            ContentEvent::StructuralChange => {
                if self.observer.is_armed() {
                    self.structure
                        .trigger(&self.tx, ContentEvent::StructureSettled);
                } else {
                    trace!("Structural change with observer detached, ignoring");
                }
            }
            ContentEvent::Rescan { force } => self.scan_cycle(force),
            ContentEvent::InteractionSettled(generation) => {
                if self.interaction.fire(generation) {
                    self.scan_cycle(false);
                }
            }
            ContentEvent::StructureSettled(generation) => {
                if self.structure.fire(generation) {
                    self.scan_cycle(false);
                }
            }
            ContentEvent::ObserverExpired(generation) => {
                if self.observer.expire(generation) {
                    self.page.observe_structure(false);
                    self.structure.cancel();
                    debug!("Structural observer detached");
                }
            }
            ContentEvent::ReconcileTick(generation) => {
                if self.reconcile.complete(generation) {
                    self.reconcile_tick();
                }
            }
            ContentEvent::VerdictReady {
                fingerprint,
                result,
            } => self.on_verdict(fingerprint, result),
            ContentEvent::AlertsPushed(batch) => {
                self.dns.present(self.page.as_mut(), &batch);
            }
            ContentEvent::OpenDetail => {
                if self.banner.open_detail(self.page.as_mut()).is_none() {
                    debug!("No verdict to detail yet");
                }
            }
            ContentEvent::CloseDetail => {
                self.banner.close_detail(self.page.as_mut());
            }
            ContentEvent::Click { inside_detail } => {
                self.banner.click(self.page.as_mut(), inside_detail);
            }
            ContentEvent::Shutdown => {}
        }
    }

    fn scan_cycle(&mut self, force: bool) {
        let unit = self.page.extract();
        self.arm_observer();

        let Some(ticket) = self.deduper.on_change(unit, force) else {
            return;
        };
        if ticket.rebound {
            self.dns.reset(self.page.as_mut());
        }

        let fingerprint = ticket.fingerprint;
        let Some(reply) = self.background.request_scan(ticket.unit) else {
            warn!(fingerprint = %fingerprint, "Background context unavailable, scan dropped");
            self.deduper.unbind();
            return;
        };
        debug!(fingerprint = %fingerprint, force, "Scan requested");

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match reply.await {
                Ok(Ok(verdict)) => Ok(verdict),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("scan relay dropped the request".to_string()),
            };
            let _ = tx.send(ContentEvent::VerdictReady {
                fingerprint,
                result,
            });
        });
    }

    fn arm_observer(&mut self) {
        if !self.observer.is_armed() {
            self.page.observe_structure(true);
            trace!("Structural observer attached");
        }
        self.observer.arm(&self.tx, ContentEvent::ObserverExpired);
    }

    fn on_verdict(&mut self, fingerprint: Fingerprint, result: Result<ScanVerdict, String>) {
        if !self.deduper.accepts(&fingerprint) {
            debug!(fingerprint = %fingerprint, "Discarding verdict for stale content");
            return;
        }

        match result {
            Ok(verdict) => {
                info!(
                    fingerprint = %fingerprint,
                    label = verdict.label.as_str(),
                    score = verdict.score,
                    "Verdict received"
                );
                self.banner
                    .present_verdict(self.page.as_mut(), fingerprint, verdict);
                self.schedule_reconcile();
            }
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Scan failed, will rescan on next change");
                self.deduper.unbind();
            }
        }
    }

    fn schedule_reconcile(&mut self) {
        self.reconcile
            .schedule(self.reconcile_period, &self.tx, ContentEvent::ReconcileTick);
    }

    fn reconcile_tick(&mut self) {
        match self.banner.reconcile(self.page.as_mut()) {
            Reconcile::Stopped => trace!("Reconciliation stopped"),
            Reconcile::Watching | Reconcile::Reinserted => self.schedule_reconcile(),
        }
    }

    fn teardown(&mut self) {
        self.interaction.cancel();
        self.structure.cancel();
        self.observer.disarm();
        self.reconcile.cancel();
        self.page.observe_structure(false);
        self.banner.remove_all(self.page.as_mut());
        self.dns.reset(self.page.as_mut());
    }
}

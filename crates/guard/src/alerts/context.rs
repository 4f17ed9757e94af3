//! Background context: alert polling, escalation and the scan relay.
//!
//! One tokio task owns the [`EscalationCoordinator`]. It waits on four
//! sources at once: the fixed poll interval, button activations from the
//! notification surface, requests from content contexts, and completions of
//! its own service calls. Alert fetches and resolve calls run in spawned
//! tasks and post their results back, so a slow service never stalls the
//! scan relay. At most one alert fetch is in flight.

use std::sync::Arc;
use std::time::Duration;

use detection::{
    ContentUnit, DetectionError, DetectionService, DomainAlert, ResolveOutcome, ScanVerdict,
};
use notify::{Activation, ActivationReceiver};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::escalation::{ActivationStep, EscalationCoordinator, PendingEscalation};
use super::poller::{AlertPoller, PollOutcome};
use super::suppression::SuppressionState;
use crate::content::context::ContentHandle;

/// Default alert poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Reply channel for a relayed scan.
pub type ScanReply = oneshot::Receiver<Result<ScanVerdict, DetectionError>>;

/// Requests accepted by the background context.
#[derive(Debug)]
pub enum BackgroundRequest {
    /// Relay a scan to the detection service
    Scan {
        unit: ContentUnit,
        reply: oneshot::Sender<Result<ScanVerdict, DetectionError>>,
    },
    /// Push future qualifying batches to a content context
    Subscribe(ContentHandle),
    /// Poll now instead of waiting for the next tick
    PollNow,
    /// Report suppression and pending state
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Service calls finishing outside the context's task.
#[derive(Debug)]
enum Completion {
    PollFinished(Result<Vec<DomainAlert>, DetectionError>),
    ResolveFinished {
        domain: String,
        result: Result<ResolveOutcome, DetectionError>,
    },
}

/// Point-in-time view of the session's alert state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub suppression: SuppressionState,
    pub pending: Option<PendingEscalation>,
}

/// Cheap clonable sender into the background context.
#[derive(Debug, Clone)]
pub struct BackgroundHandle {
    tx: mpsc::UnboundedSender<BackgroundRequest>,
}

impl BackgroundHandle {
    /// Relay a scan. `None` when the context has shut down.
    pub fn request_scan(&self, unit: ContentUnit) -> Option<ScanReply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BackgroundRequest::Scan { unit, reply })
            .ok()
            .map(|()| rx)
    }

    pub fn subscribe(&self, content: ContentHandle) -> bool {
        self.tx.send(BackgroundRequest::Subscribe(content)).is_ok()
    }

    pub fn poll_now(&self) -> bool {
        self.tx.send(BackgroundRequest::PollNow).is_ok()
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(BackgroundRequest::Snapshot(reply)).ok()?;
        rx.await.ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(BackgroundRequest::Shutdown);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Poller/coordinator context.
pub struct BackgroundContext {
    coordinator: EscalationCoordinator,
    poller: AlertPoller,
    service: Arc<dyn DetectionService>,
    poll_interval: Duration,
    subscribers: Vec<ContentHandle>,
    poll_in_flight: bool,
}

impl BackgroundContext {
    #[must_use]
    pub fn new(
        coordinator: EscalationCoordinator,
        poller: AlertPoller,
        poll_interval: Duration,
    ) -> Self {
        Self {
            service: coordinator.service(),
            coordinator,
            poller,
            poll_interval,
            subscribers: Vec::new(),
            poll_in_flight: false,
        }
    }

    /// Start the context. The first poll happens immediately.
    pub fn spawn(self, activations: ActivationReceiver) -> (BackgroundHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx, activations));
        (BackgroundHandle { tx }, task)
    }

    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<BackgroundRequest>,
        mut activations: ActivationReceiver,
    ) {
        let (done, mut completions) = mpsc::unbounded_channel();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut activations_open = true;

        info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            threshold = self.poller.threshold(),
            "Background context started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.start_poll(&done),
                activation = activations.recv(), if activations_open => match activation {
                    Some(activation) => self.on_activation(activation, &done).await,
                    None => {
                        debug!("Activation channel closed");
                        activations_open = false;
                    }
                },
                request = requests.recv() => match request {
                    Some(BackgroundRequest::Shutdown) | None => break,
                    Some(request) => self.handle_request(request, &done),
                },
                Some(completion) = completions.recv() => self.on_completion(completion).await,
            }
        }

        info!("Background context stopped");
    }

    fn handle_request(
        &mut self,
        request: BackgroundRequest,
        done: &mpsc::UnboundedSender<Completion>,
    ) {
        match request {
            BackgroundRequest::Scan { unit, reply } => {
                let service = Arc::clone(&self.service);
                tokio::spawn(async move {
                    let result = service.scan(&unit).await;
                    if let Err(e) = &result {
                        warn!(error = %e, "Scan relay failed");
                    }
                    let _ = reply.send(result);
                });
            }
            BackgroundRequest::Subscribe(content) => {
                self.subscribers.push(content);
                debug!(subscribers = self.subscribers.len(), "Content context subscribed");
            }
            BackgroundRequest::PollNow => self.start_poll(done),
            BackgroundRequest::Snapshot(reply) => {
                let _ = reply.send(SessionSnapshot {
                    suppression: self.coordinator.state().clone(),
                    pending: self.coordinator.pending().cloned(),
                });
            }
            BackgroundRequest::Shutdown => {}
        }
    }

    fn start_poll(&mut self, done: &mpsc::UnboundedSender<Completion>) {
        if self.poll_in_flight {
            debug!("Alert poll still in flight, skipping");
            return;
        }
        self.poll_in_flight = true;

        let service = Arc::clone(&self.service);
        let done = done.clone();
        tokio::spawn(async move {
            let fetched = service.list_alerts().await;
            let _ = done.send(Completion::PollFinished(fetched));
        });
    }

    async fn on_activation(
        &mut self,
        activation: Activation,
        done: &mpsc::UnboundedSender<Completion>,
    ) {
        match self.coordinator.begin_activation(activation).await {
            ActivationStep::Done(outcome) => debug!(?outcome, "Activation handled"),
            ActivationStep::Resolve { domain } => {
                let service = Arc::clone(&self.service);
                let reason = self.coordinator.reason().to_string();
                let done = done.clone();
                tokio::spawn(async move {
                    let result = service.resolve(&domain, &reason).await;
                    let _ = done.send(Completion::ResolveFinished { domain, result });
                });
            }
        }
    }

    async fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::PollFinished(fetched) => {
                self.poll_in_flight = false;
                let outcome = self.coordinator.apply_poll(&self.poller, fetched).await;
                if let PollOutcome::Qualified(batch) = outcome {
                    self.subscribers
                        .retain(|content| content.push_alerts(batch.clone()));
                }
            }
            Completion::ResolveFinished { domain, result } => {
                let outcome = self.coordinator.finish_escalation(domain, result).await;
                debug!(?outcome, "Escalation finished");
            }
        }
    }
}

//! Human escalation of qualifying DNS alerts.
//!
//! The coordinator owns the session's [`SuppressionState`] and the single
//! [`PendingEscalation`]. It raises one prompt per qualifying batch and
//! turns the user's choice into either a resolve call or a dismiss window:
//! - Escalate resolves the first domain in the batch and, on success, marks
//!   it resolved for the rest of the session
//! - Dismiss pauses all alert surfacing for the dismiss window

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use detection::{DetectionError, DetectionService, DomainAlert, ResolveOutcome};
use notify::{Activation, Notifier, Prompt, PromptHandle, Severity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::poller::{AlertPoller, PollOutcome};
use super::suppression::SuppressionState;
use crate::clock::Clock;

/// Button index that escalates the pending batch
pub const ESCALATE_BUTTON: usize = 0;

/// Button index that dismisses the pending batch
pub const DISMISS_BUTTON: usize = 1;

/// Default justification sent with every resolve call
pub const DEFAULT_ESCALATION_REASON: &str = "Escalated by user from mail client";

/// Default length of the global dismiss window
pub const DEFAULT_DISMISS_WINDOW_MS: i64 = 25_000;

const PROMPT_TITLE: &str = "Suspicious DNS activity";
const FAILURE_TITLE: &str = "Escalation failed";
const FAILURE_FALLBACK: &str = "The detection service could not resolve this alert.";

/// The batch behind the live prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEscalation {
    #[serde(rename = "lastAlertBatch")]
    pub batch: Vec<DomainAlert>,
    #[serde(rename = "lastPromptHandle")]
    pub handle: PromptHandle,
}

/// What handling an activation did.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The service resolved `domain`
    Escalated { domain: String },
    /// The resolve call failed; `domain` stays eligible
    EscalationFailed { domain: String, message: String },
    /// Alert surfacing paused until `until`
    Dismissed { until: DateTime<Utc> },
    /// A confirmation or failure notice was acknowledged
    NoticeAcknowledged,
    /// Stale handle or unknown button
    Ignored,
}

/// First half of handling an activation.
///
/// Everything except the resolve call happens synchronously with the
/// activation; a caller that must not wait on the service runs the call
/// itself and hands the result to [`EscalationCoordinator::finish_escalation`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationStep {
    Done(ActionOutcome),
    /// The prompt was cleared; `domain` must now be resolved
    Resolve { domain: String },
}

/// Drives prompts, resolve calls and suppression updates for one session.
pub struct EscalationCoordinator {
    state: SuppressionState,
    pending: Option<PendingEscalation>,
    notice: Option<PromptHandle>,
    notifier: Notifier,
    service: Arc<dyn DetectionService>,
    clock: Arc<dyn Clock>,
    dismiss_window: Duration,
    reason: String,
}

impl EscalationCoordinator {
    #[must_use]
    pub fn new(
        service: Arc<dyn DetectionService>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: SuppressionState::new(),
            pending: None,
            notice: None,
            notifier,
            service,
            clock,
            dismiss_window: Duration::milliseconds(DEFAULT_DISMISS_WINDOW_MS),
            reason: DEFAULT_ESCALATION_REASON.to_string(),
        }
    }

    #[must_use]
    pub fn with_dismiss_window(mut self, window: Duration) -> Self {
        self.dismiss_window = window;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    #[must_use]
    pub fn state(&self) -> &SuppressionState {
        &self.state
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingEscalation> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[must_use]
    pub fn service(&self) -> Arc<dyn DetectionService> {
        Arc::clone(&self.service)
    }

    /// Run one poll cycle and raise a prompt when something qualifies.
    pub async fn poll(&mut self, poller: &AlertPoller) -> PollOutcome {
        let fetched = self.service.list_alerts().await;
        self.apply_poll(poller, fetched).await
    }

    /// Classify a batch fetched elsewhere against the current state and
    /// raise a prompt when something qualifies.
    pub async fn apply_poll(
        &mut self,
        poller: &AlertPoller,
        fetched: Result<Vec<DomainAlert>, DetectionError>,
    ) -> PollOutcome {
        let outcome = poller.classify(fetched, &self.state, self.clock.as_ref());
        if let PollOutcome::Qualified(batch) = &outcome {
            self.raise(batch.clone()).await;
        }
        outcome
    }

    /// Raise a prompt for `batch`, replacing any outstanding one.
    ///
    /// The previous prompt (and any unacknowledged notice) is cleared before
    /// the new one is shown, so the surface never holds two escalation
    /// prompts. Returns the new handle when the surface rendered it.
    pub async fn raise(&mut self, batch: Vec<DomainAlert>) -> Option<PromptHandle> {
        if batch.is_empty() {
            return None;
        }

        if let Some(previous) = self.pending.take() {
            debug!(handle = %previous.handle, "Replacing outstanding escalation prompt");
            self.notifier.clear(&previous.handle).await;
        }
        self.clear_notice().await;

        let prompt = Prompt::new(PROMPT_TITLE, prompt_body(&batch), Severity::Critical)
            .button("Escalate")
            .button("Dismiss");
        let handle = self.notifier.show(prompt).await?;

        info!(
            %handle,
            domains = batch.len(),
            first = %batch[0].domain,
            "Escalation prompt raised"
        );
        self.pending = Some(PendingEscalation {
            batch,
            handle: handle.clone(),
        });
        Some(handle)
    }

    /// Apply a button activation reported by the surface, including the
    /// resolve call an escalation needs.
    pub async fn handle_activation(&mut self, activation: Activation) -> ActionOutcome {
        match self.begin_activation(activation).await {
            ActivationStep::Done(outcome) => outcome,
            ActivationStep::Resolve { domain } => {
                let result = self.service.resolve(&domain, &self.reason).await;
                self.finish_escalation(domain, result).await
            }
        }
    }

    /// Apply an activation up to, but not including, the resolve call.
    pub async fn begin_activation(&mut self, activation: Activation) -> ActivationStep {
        if self.notice.as_ref() == Some(&activation.handle) {
            self.clear_notice().await;
            return ActivationStep::Done(ActionOutcome::NoticeAcknowledged);
        }

        let is_pending = self
            .pending
            .as_ref()
            .is_some_and(|p| p.handle == activation.handle);
        if !is_pending {
            debug!(handle = %activation.handle, "Ignoring activation of stale prompt");
            return ActivationStep::Done(ActionOutcome::Ignored);
        }

        match activation.button_index {
            ESCALATE_BUTTON => self.begin_escalation().await,
            DISMISS_BUTTON => ActivationStep::Done(self.dismiss().await),
            other => {
                debug!(button_index = other, "Ignoring unknown button");
                ActivationStep::Done(ActionOutcome::Ignored)
            }
        }
    }

    async fn begin_escalation(&mut self) -> ActivationStep {
        let Some(pending) = self.pending.take() else {
            return ActivationStep::Done(ActionOutcome::Ignored);
        };
        self.notifier.clear(&pending.handle).await;

        match pending.batch.into_iter().next() {
            Some(first) => ActivationStep::Resolve {
                domain: first.domain,
            },
            None => ActivationStep::Done(ActionOutcome::Ignored),
        }
    }

    /// Apply the result of resolving `domain`.
    #[instrument(skip(self, result))]
    pub async fn finish_escalation(
        &mut self,
        domain: String,
        result: Result<ResolveOutcome, DetectionError>,
    ) -> ActionOutcome {
        let failure = match result {
            Ok(ResolveOutcome::Resolved) => {
                self.state.mark_resolved(&domain);
                info!(domain = %domain, "Alert escalated and resolved");
                self.show_notice(Prompt::new(
                    format!("Escalated {domain}"),
                    "The detection service accepted the escalation.",
                    Severity::Info,
                ))
                .await;
                return ActionOutcome::Escalated { domain };
            }
            Ok(ResolveOutcome::Rejected(message)) => {
                warn!(domain = %domain, message = ?message, "Escalation rejected by service");
                message
            }
            Err(e) => {
                warn!(domain = %domain, error = %e, "Escalation request failed");
                e.service_message().map(str::to_string)
            }
        };

        let message = failure.unwrap_or_else(|| FAILURE_FALLBACK.to_string());
        self.show_notice(Prompt::new(FAILURE_TITLE, message.clone(), Severity::Warning))
            .await;
        ActionOutcome::EscalationFailed { domain, message }
    }

    async fn dismiss(&mut self) -> ActionOutcome {
        if let Some(pending) = self.pending.take() {
            self.notifier.clear(&pending.handle).await;
        }
        let until = self.state.dismiss(self.clock.now(), self.dismiss_window);
        info!(until = %until, "DNS alerts dismissed");
        ActionOutcome::Dismissed { until }
    }

    async fn show_notice(&mut self, notice: Prompt) {
        self.clear_notice().await;
        self.notice = self.notifier.show(notice.button("OK")).await;
    }

    async fn clear_notice(&mut self) {
        if let Some(handle) = self.notice.take() {
            self.notifier.clear(&handle).await;
        }
    }
}

fn prompt_body(batch: &[DomainAlert]) -> String {
    let mut body = String::new();
    for alert in batch {
        let _ = writeln!(body, "{} ({:.2})", alert.domain, alert.score);
    }
    body.trim_end().to_string()
}

//! Alert polling, suppression and escalation.

pub mod context;
pub mod escalation;
pub mod poller;
pub mod suppression;

pub use context::{BackgroundContext, BackgroundHandle, BackgroundRequest, SessionSnapshot};
pub use escalation::{ActionOutcome, ActivationStep, EscalationCoordinator, PendingEscalation};
pub use poller::{AlertPoller, PollOutcome};
pub use suppression::SuppressionState;

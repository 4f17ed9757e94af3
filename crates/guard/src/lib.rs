//! Alert lifecycle, deduplication and escalation for webmail phishing warnings.
//!
//! Two execution contexts cooperate through message passing:
//!
//! - The **content context** ([`content::ContentContext`]) owns one page. It
//!   extracts the displayed message, skips scans of unchanged content,
//!   presents the latest verdict as a banner and shows pushed DNS alerts.
//! - The **background context** ([`alerts::BackgroundContext`]) polls the
//!   detection service for DNS alerts, filters them through the session's
//!   suppression state, raises escalation prompts and relays scans.
//!
//! The dismiss window reads an injected [`clock::Clock`]; timers are
//! explicit [`schedule::TaskSlot`] handles that post generation-tagged
//! messages back into the owning context, and the windows they bound are
//! measured on the same tokio time base.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alerts;
pub mod clock;
pub mod config;
pub mod content;
pub mod schedule;

pub use alerts::{
    ActionOutcome, AlertPoller, BackgroundContext, BackgroundHandle, EscalationCoordinator,
    PendingEscalation, PollOutcome, SessionSnapshot, SuppressionState,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, GuardConfig};
pub use content::{
    BannerLifecycle, ContentContext, ContentDeduper, ContentHandle, ContentTimings,
    DnsAlertPresenter, Fingerprint, MemoryPage, PageSurface,
};

//! Detection service client.
//!
//! The detection service classifies message content (`scan`), publishes the
//! domains its DNS tunneling detector has flagged (`list_alerts`), and accepts
//! human escalations for those domains (`resolve`).
//!
//! # Usage
//!
//! ```no_run
//! use detection::{ContentUnit, DetectionService, HttpDetectionClient};
//!
//! # async fn run() -> Result<(), detection::DetectionError> {
//! let client = HttpDetectionClient::with_url("http://127.0.0.1:5000")?;
//! let verdict = client
//!     .scan(&ContentUnit::new("Password expiry", "Click here to keep your account"))
//!     .await?;
//! println!("{} ({:.2})", verdict.label.as_str(), verdict.score);
//! # Ok(())
//! # }
//! ```
//!
//! # Failure model
//!
//! Any non-2xx status, a content type other than `application/json`, or a
//! body of the wrong shape is reported as an error; callers skip the current
//! cycle and try again on the next tick.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod types;

pub use client::{DetectionService, HttpDetectionClient, DEFAULT_SERVICE_URL, DEFAULT_TIMEOUT};
pub use error::DetectionError;
pub use types::{
    ContentUnit, DomainAlert, HealthStatus, MatchedDnsAlert, ResolveOutcome, ScanVerdict,
    UrlFinding, VerdictLabel,
};

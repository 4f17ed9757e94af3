//! Wire types exchanged with the detection service.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DetectionError;

/// Subject and body extracted from the currently open message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentUnit {
    pub subject: String,
    pub body: String,
}

impl ContentUnit {
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// True when there is nothing worth scanning.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subject.is_empty() && self.body.is_empty()
    }
}

/// Classifier label attached to a scan verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictLabel {
    Benign,
    Suspicious,
    Phishing,
}

impl VerdictLabel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Benign => "benign",
            Self::Suspicious => "suspicious",
            Self::Phishing => "phishing",
        }
    }
}

/// Per-URL finding reported alongside a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlFinding {
    pub url: String,
    pub score: f64,
    pub label: VerdictLabel,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// A known DNS alert that matched a URL in the scanned content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedDnsAlert {
    pub url: String,
    pub domain: String,
    pub alert_score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Result of scanning one content unit.
///
/// Accepts both `label`/`score` and the service's `final_label`/`final_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanVerdict {
    #[serde(alias = "final_label")]
    pub label: VerdictLabel,
    #[serde(alias = "final_score")]
    pub score: f64,
    /// Ordered as supplied by the service.
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub urls: Vec<UrlFinding>,
    #[serde(default)]
    pub dns_alerts: Vec<MatchedDnsAlert>,
}

impl ScanVerdict {
    #[must_use]
    pub fn new(label: VerdictLabel, score: f64, reasons: Vec<String>) -> Self {
        Self {
            label,
            score,
            reasons,
            urls: Vec::new(),
            dns_alerts: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        check_score("score", self.score)?;
        for finding in &self.urls {
            check_score("urls[].score", finding.score)?;
        }
        Ok(())
    }
}

/// One domain flagged by the DNS tunneling detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAlert {
    pub domain: String,
    pub score: f64,
    #[serde(
        default,
        alias = "observed_at",
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub report_count: Option<u32>,
}

impl DomainAlert {
    #[must_use]
    pub fn new(domain: impl Into<String>, score: f64) -> Self {
        Self {
            domain: domain.into(),
            score,
            timestamp: None,
            reasons: Vec::new(),
            expires_at: None,
            report_count: None,
        }
    }

    /// Lowercased domain used for every membership test.
    #[must_use]
    pub fn key(&self) -> String {
        self.domain.trim().to_ascii_lowercase()
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.domain.trim().is_empty() {
            return Err(DetectionError::MalformedResponse(
                "alert with empty domain".to_string(),
            ));
        }
        check_score("alerts[].score", self.score)
    }
}

/// Envelope returned by the alert listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AlertList {
    pub alerts: Vec<DomainAlert>,
}

/// Body sent to the resolve endpoint.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResolveRequest<'a> {
    pub domain: &'a str,
    pub reason: &'a str,
}

/// Status field of a resolve response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ResolveStatus {
    Ok,
    Error,
}

/// Raw resolve response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResolveResponse {
    pub status: ResolveStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// What the service reported for a resolve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved,
    /// The service refused; carries its message when it sent one
    Rejected(Option<String>),
}

impl From<ResolveResponse> for ResolveOutcome {
    fn from(resp: ResolveResponse) -> Self {
        match resp.status {
            ResolveStatus::Ok => Self::Resolved,
            ResolveStatus::Error => Self::Rejected(resp.error.filter(|m| !m.is_empty())),
        }
    }
}

/// Health endpoint payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ok: bool,
    #[serde(default)]
    pub active_dns_alerts: Option<u64>,
    #[serde(default)]
    pub model_loaded: Option<bool>,
}

fn check_score(field: &str, score: f64) -> Result<(), DetectionError> {
    if (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(DetectionError::MalformedResponse(format!(
            "{field} out of range: {score}"
        )))
    }
}

/// Accepts RFC 3339 or a naive ISO-8601 timestamp (treated as UTC); null is `None`.
fn deserialize_lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_verdict_accepts_service_field_names() {
        let json = r#"{
            "final_score": 0.85,
            "final_label": "phishing",
            "reasons": ["urgent language", "dns alert for evil.example (+0.14)"],
            "urls": [{"url": "http://evil.example/login", "score": 0.7, "label": "phishing", "reasons": []}],
            "dns_alerts": []
        }"#;
        let verdict: ScanVerdict = serde_json::from_str(json).unwrap();
        assert_eq!(verdict.label, VerdictLabel::Phishing);
        assert!((verdict.score - 0.85).abs() < f64::EPSILON);
        assert_eq!(
            verdict.reasons,
            vec!["urgent language", "dns alert for evil.example (+0.14)"]
        );
        assert_eq!(verdict.urls.len(), 1);
        assert!(verdict.validate().is_ok());
    }

    #[test]
    fn test_verdict_out_of_range_score_is_malformed() {
        let verdict = ScanVerdict::new(VerdictLabel::Benign, 1.5, vec![]);
        assert!(matches!(
            verdict.validate(),
            Err(DetectionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_unknown_label_rejected() {
        let json = r#"{"label": "spam", "score": 0.2}"#;
        assert!(serde_json::from_str::<ScanVerdict>(json).is_err());
    }

    #[test]
    fn test_alert_timestamps() {
        let json = r#"{
            "domain": "evil.example",
            "score": 0.9,
            "reasons": ["ml_model"],
            "observed_at": "2025-03-01T12:30:00.250000",
            "expires_at": "2025-03-02T12:30:00Z",
            "report_count": 3
        }"#;
        let alert: DomainAlert = serde_json::from_str(json).unwrap();
        assert_eq!(alert.domain, "evil.example");
        assert_eq!(
            alert.timestamp.map(|t| t.date_naive()),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap().date_naive())
        );
        assert_eq!(
            alert.expires_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 2, 12, 30, 0).unwrap())
        );
        assert_eq!(alert.report_count, Some(3));
    }

    #[test]
    fn test_alert_null_timestamp() {
        let json = r#"{"domain": "a.example", "score": 0.1, "observed_at": null}"#;
        let alert: DomainAlert = serde_json::from_str(json).unwrap();
        assert!(alert.timestamp.is_none());
    }

    #[test]
    fn test_alert_key_is_lowercase() {
        assert_eq!(DomainAlert::new(" Evil.Example ", 0.9).key(), "evil.example");
    }

    #[test]
    fn test_alert_validation() {
        assert!(DomainAlert::new("", 0.5).validate().is_err());
        assert!(DomainAlert::new("x.example", -0.1).validate().is_err());
        assert!(DomainAlert::new("x.example", 0.6).validate().is_ok());
    }

    #[test]
    fn test_resolve_outcome() {
        let resp: ResolveResponse = serde_json::from_str(r#"{"status": "ok"}"#).unwrap();
        assert_eq!(ResolveOutcome::from(resp), ResolveOutcome::Resolved);

        let resp: ResolveResponse =
            serde_json::from_str(r#"{"status": "error", "error": "not found"}"#).unwrap();
        assert_eq!(
            ResolveOutcome::from(resp),
            ResolveOutcome::Rejected(Some("not found".to_string()))
        );

        let resp: ResolveResponse =
            serde_json::from_str(r#"{"status": "error", "error": ""}"#).unwrap();
        assert_eq!(ResolveOutcome::from(resp), ResolveOutcome::Rejected(None));
    }

    #[test]
    fn test_content_unit_is_empty() {
        assert!(ContentUnit::default().is_empty());
        assert!(!ContentUnit::new("Invoice", "").is_empty());
        assert!(!ContentUnit::new("", "body").is_empty());
    }
}

//! HTTP client for the detection service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::DetectionError;
use crate::types::{
    AlertList, ContentUnit, DomainAlert, HealthStatus, ResolveOutcome, ResolveRequest,
    ResolveResponse, ScanVerdict,
};

/// Default detection service endpoint
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SCAN_PATH: &str = "/api/scan_text";
const ALERTS_PATH: &str = "/api/phishing_alerts";
const RESOLVE_PATH: &str = "/api/resolve_alert";
const HEALTH_PATH: &str = "/health";

/// Operations the engine needs from the detection service.
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Classify one content unit.
    async fn scan(&self, unit: &ContentUnit) -> Result<ScanVerdict, DetectionError>;

    /// Fetch the current batch of domain alerts, in service order.
    async fn list_alerts(&self) -> Result<Vec<DomainAlert>, DetectionError>;

    /// Ask the service to resolve an alert for `domain`.
    async fn resolve(&self, domain: &str, reason: &str) -> Result<ResolveOutcome, DetectionError>;
}

/// Detection service client
#[derive(Debug, Clone)]
pub struct HttpDetectionClient {
    client: reqwest::Client,
    base_url: String,
}

/// Shape of an error body (`{"error": "..."}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl HttpDetectionClient {
    /// Create a client for `base_url`.
    ///
    /// # Arguments
    /// * `api_key` - sent as `Authorization: Bearer <key>` when present
    /// * `timeout` - applied to every request
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, DetectionError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| DetectionError::Config(format!("invalid api key: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| DetectionError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Client with no API key and the default timeout.
    pub fn with_url(base_url: &str) -> Result<Self, DetectionError> {
        Self::new(base_url, None, DEFAULT_TIMEOUT)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Check the health endpoint.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthStatus, DetectionError> {
        let response = self.client.get(self.url(HEALTH_PATH)).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl DetectionService for HttpDetectionClient {
    #[instrument(skip(self, unit), fields(subject_len = unit.subject.len(), body_len = unit.body.len()))]
    async fn scan(&self, unit: &ContentUnit) -> Result<ScanVerdict, DetectionError> {
        let response = self.client.post(self.url(SCAN_PATH)).json(unit).send().await?;
        let verdict: ScanVerdict = read_json(response).await?;
        verdict.validate()?;
        debug!(label = verdict.label.as_str(), score = verdict.score, "Scan verdict received");
        Ok(verdict)
    }

    #[instrument(skip(self))]
    async fn list_alerts(&self) -> Result<Vec<DomainAlert>, DetectionError> {
        let response = self.client.get(self.url(ALERTS_PATH)).send().await?;
        let list: AlertList = read_json(response).await?;
        for alert in &list.alerts {
            alert.validate()?;
        }
        debug!(count = list.alerts.len(), "Alert batch received");
        Ok(list.alerts)
    }

    #[instrument(skip(self, reason))]
    async fn resolve(&self, domain: &str, reason: &str) -> Result<ResolveOutcome, DetectionError> {
        let response = self
            .client
            .post(self.url(RESOLVE_PATH))
            .json(&ResolveRequest { domain, reason })
            .send()
            .await?;
        let body: ResolveResponse = read_json(response).await?;
        Ok(body.into())
    }
}

/// Check status and content type, then decode the JSON body.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, DetectionError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"));

    if !status.is_success() {
        let message = if is_json {
            response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .filter(|m| !m.is_empty())
        } else {
            None
        };
        return Err(DetectionError::Status {
            status: status.as_u16(),
            message,
        });
    }

    if !is_json {
        return Err(DetectionError::MalformedResponse(
            "expected application/json content type".to_string(),
        ));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| {
        // a 200 carrying only `{"error": ...}` is the service reporting failure
        match serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty())
        {
            Some(message) => DetectionError::Service(message),
            None => err.into(),
        }
    })
}

//! Integration tests for the detection service HTTP client.
//!
//! Each test stands up a mock detection service and checks how the client
//! maps responses onto verdicts, alert batches, and errors.

use std::time::Duration;

use detection::{
    ContentUnit, DetectionError, DetectionService, HttpDetectionClient, ResolveOutcome,
    VerdictLabel,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Scan
// =============================================================================

#[tokio::test]
async fn test_scan_posts_subject_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan_text"))
        .and(body_json(json!({"subject": "Account locked", "body": "verify now"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "final_score": 0.85,
            "final_label": "phishing",
            "reasons": ["credential request", "urgency"],
            "urls": [],
            "dns_alerts": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpDetectionClient::with_url(&server.uri()).unwrap();
    let verdict = client
        .scan(&ContentUnit::new("Account locked", "verify now"))
        .await
        .unwrap();

    assert_eq!(verdict.label, VerdictLabel::Phishing);
    assert_eq!(verdict.reasons, vec!["credential request", "urgency"]);
}

#[tokio::test]
async fn test_scan_error_envelope_is_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan_text"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "model not loaded"})),
        )
        .mount(&server)
        .await;

    let client = HttpDetectionClient::with_url(&server.uri()).unwrap();
    let err = client.scan(&ContentUnit::new("s", "b")).await.unwrap_err();
    assert!(matches!(err, DetectionError::Service(ref m) if m == "model not loaded"));
    assert_eq!(err.service_message(), Some("model not loaded"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_scan_rejects_non_json_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan_text"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html"))
        .mount(&server)
        .await;

    let client = HttpDetectionClient::with_url(&server.uri()).unwrap();
    let err = client.scan(&ContentUnit::new("s", "b")).await.unwrap_err();
    assert!(matches!(err, DetectionError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_scan_rejects_out_of_range_score() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan_text"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"label": "phishing", "score": 4.0, "reasons": []})),
        )
        .mount(&server)
        .await;

    let client = HttpDetectionClient::with_url(&server.uri()).unwrap();
    let err = client.scan(&ContentUnit::new("s", "b")).await.unwrap_err();
    assert!(matches!(err, DetectionError::MalformedResponse(_)));
}

// =============================================================================
// Alerts
// =============================================================================

#[tokio::test]
async fn test_list_alerts_preserves_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/phishing_alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alerts": [
                {"domain": "b.example", "score": 0.7, "observed_at": "2025-01-01T00:00:00", "reasons": ["heuristic_fallback"]},
                {"domain": "a.example", "score": 0.9, "observed_at": null}
            ]
        })))
        .mount(&server)
        .await;

    let client = HttpDetectionClient::with_url(&server.uri()).unwrap();
    let alerts = client.list_alerts().await.unwrap();
    let domains: Vec<_> = alerts.iter().map(|a| a.domain.as_str()).collect();
    assert_eq!(domains, vec!["b.example", "a.example"]);
    assert!(alerts[0].timestamp.is_some());
    assert!(alerts[1].timestamp.is_none());
}

#[tokio::test]
async fn test_list_alerts_wrong_shape_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/phishing_alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"domain": "x", "score": 0.9}])))
        .mount(&server)
        .await;

    let client = HttpDetectionClient::with_url(&server.uri()).unwrap();
    let err = client.list_alerts().await.unwrap_err();
    assert!(matches!(err, DetectionError::MalformedResponse(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_list_alerts_server_error_carries_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/phishing_alerts"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "db unavailable"})))
        .mount(&server)
        .await;

    let client = HttpDetectionClient::with_url(&server.uri()).unwrap();
    let err = client.list_alerts().await.unwrap_err();
    match err {
        DetectionError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message.as_deref(), Some("db unavailable"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/phishing_alerts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"alerts": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client =
        HttpDetectionClient::new(&server.uri(), None, Duration::from_millis(50)).unwrap();
    let err = client.list_alerts().await.unwrap_err();
    assert!(matches!(err, DetectionError::Transport(_)));
}

// =============================================================================
// Resolve
// =============================================================================

#[tokio::test]
async fn test_resolve_sends_domain_and_reason_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resolve_alert"))
        .and(header("authorization", "Bearer secret-key"))
        .and(body_json(json!({"domain": "evil.example", "reason": "user escalation"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        HttpDetectionClient::new(&server.uri(), Some("secret-key"), Duration::from_secs(5))
            .unwrap();
    let outcome = client
        .resolve("evil.example", "user escalation")
        .await
        .unwrap();
    assert_eq!(outcome, ResolveOutcome::Resolved);
}

#[tokio::test]
async fn test_resolve_reported_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resolve_alert"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "error", "error": "alert already expired"})),
        )
        .mount(&server)
        .await;

    let client = HttpDetectionClient::with_url(&server.uri()).unwrap();
    let outcome = client.resolve("evil.example", "r").await.unwrap();
    assert_eq!(
        outcome,
        ResolveOutcome::Rejected(Some("alert already expired".to_string()))
    );
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "active_dns_alerts": 2})),
        )
        .mount(&server)
        .await;

    let client = HttpDetectionClient::with_url(&format!("{}/", server.uri())).unwrap();
    let health = client.health().await.unwrap();
    assert!(health.ok);
    assert_eq!(health.active_dns_alerts, Some(2));
}

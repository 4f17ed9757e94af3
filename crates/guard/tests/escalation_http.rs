//! Escalation flow against a mock detection service over HTTP.

use std::sync::Arc;

use detection::HttpDetectionClient;
use guard::alerts::{ActionOutcome, AlertPoller, EscalationCoordinator, PollOutcome};
use guard::clock::ManualClock;
use notify::{activation_channel, ActivationReceiver, MemorySurface, Notifier};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Session {
    coordinator: EscalationCoordinator,
    surface: Arc<MemorySurface>,
    activations: ActivationReceiver,
}

fn session(server: &MockServer) -> Session {
    let client = HttpDetectionClient::with_url(&server.uri()).unwrap();
    let (tx, activations) = activation_channel();
    let surface = Arc::new(MemorySurface::new(tx));
    let coordinator = EscalationCoordinator::new(
        Arc::new(client),
        Notifier::with_surface(surface.clone()),
        Arc::new(ManualClock::default()),
    );
    Session {
        coordinator,
        surface,
        activations,
    }
}

async fn mount_alerts(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/phishing_alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alerts": [
                {"domain": "evil.example", "score": 0.9, "observed_at": "2025-06-01T09:00:00"},
                {"domain": "quiet.example", "score": 0.2, "observed_at": "2025-06-01T09:00:05"}
            ]
        })))
        .mount(server)
        .await;
}

async fn press(session: &mut Session, button: usize) -> ActionOutcome {
    let (handle, _) = session.surface.latest().unwrap();
    assert!(session.surface.activate(&handle, button));
    let activation = session.activations.recv().await.unwrap();
    session.coordinator.handle_activation(activation).await
}

#[tokio::test]
async fn test_escalate_then_next_poll_is_quiet() {
    let server = MockServer::start().await;
    mount_alerts(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/resolve_alert"))
        .and(body_json(json!({
            "domain": "evil.example",
            "reason": "Escalated by user from mail client"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session(&server);
    let poller = AlertPoller::default();

    let first = session.coordinator.poll(&poller).await;
    let domains: Vec<_> = first.qualifying().iter().map(|a| a.domain.clone()).collect();
    assert_eq!(domains, vec!["evil.example"]);

    let outcome = press(&mut session, 0).await;
    assert_eq!(
        outcome,
        ActionOutcome::Escalated {
            domain: "evil.example".to_string()
        }
    );

    let second = session.coordinator.poll(&poller).await;
    assert!(matches!(second, PollOutcome::Quiet { fetched: 2 }));
}

#[tokio::test]
async fn test_service_error_shown_in_failure_notice() {
    let server = MockServer::start().await;
    mount_alerts(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/resolve_alert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "error": "domain not found"
        })))
        .mount(&server)
        .await;

    let mut session = session(&server);
    let poller = AlertPoller::default();
    session.coordinator.poll(&poller).await;

    let outcome = press(&mut session, 0).await;
    assert!(matches!(outcome, ActionOutcome::EscalationFailed { .. }));
    let (_, notice) = session.surface.latest().unwrap();
    assert_eq!(notice.title, "Escalation failed");
    assert_eq!(notice.body, "domain not found");

    // not resolved, so it qualifies again
    let again = session.coordinator.poll(&poller).await;
    assert_eq!(again.qualifying().len(), 1);
}

#[tokio::test]
async fn test_unavailable_service_skips_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/phishing_alerts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut session = session(&server);
    let outcome = session.coordinator.poll(&AlertPoller::default()).await;

    assert!(matches!(outcome, PollOutcome::Skipped(_)));
    assert!(session.surface.history().is_empty());
    assert!(session.coordinator.pending().is_none());
}

use mockall::Sequence;
use serial_test::serial;

use webwatch_core::dispatch::{run, RoutingMode, RunResponse, WatchRequest};
use webwatch_core::error::{EngineError, NotifyError};
use webwatch_core::notify::MockNotifier;
use webwatch_core::reconcile::WritePolicy;
use webwatch_core::repository::{MockRepository, Row};
use webwatch_core::sources::SourceRegistry;

fn request(source_id: &str, raw_text: &str) -> WatchRequest {
    WatchRequest {
        source_id: source_id.into(),
        display_name: "Organisations".into(),
        origin_uri: "https://example.org/orgs.html".into(),
        raw_text: raw_text.into(),
        captured_at: "2026-02-01T06:30:00Z".into(),
        destination_address: "watch@example.org".into(),
        target_collection: "orgs".into(),
        routing_mode: RoutingMode::Direct,
    }
}

#[tokio::test]
#[serial]
async fn unknown_source_id_aborts_immediately() {
    let registry = SourceRegistry::with_default_sources();
    let repo = MockRepository::new();
    let notifier = MockNotifier::new();

    let result = run(
        &registry,
        &repo,
        &notifier,
        &WritePolicy::no_delay(),
        &request("no-such-source", "[]"),
    )
    .await;

    assert!(matches!(result, Err(EngineError::UnknownSource(_))));
}

#[tokio::test]
#[serial]
async fn malformed_payload_aborts_before_any_storage_access() {
    let registry = SourceRegistry::with_default_sources();
    // Any repository or notifier call would panic the mocks.
    let repo = MockRepository::new();
    let notifier = MockNotifier::new();

    let result = run(
        &registry,
        &repo,
        &notifier,
        &WritePolicy::no_delay(),
        &request("organisations", "this is not json"),
    )
    .await;

    assert!(matches!(result, Err(EngineError::MalformedPayload(_))));
}

#[tokio::test]
#[serial]
async fn notification_precedes_reconciliation() {
    let registry = SourceRegistry::with_default_sources();
    let mut repo = MockRepository::new();
    let mut notifier = MockNotifier::new();
    let mut seq = Sequence::new();

    repo.expect_list()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(vec![]));
    notifier
        .expect_deliver()
        .withf(|report| {
            report.to == "watch@example.org" && report.subject == "Organisations change report"
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    repo.expect_create()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, fields| {
            Ok(Row {
                id: "doc-1".to_string(),
                fields,
            })
        });

    let outcome = run(
        &registry,
        &repo,
        &notifier,
        &WritePolicy::no_delay(),
        &request(
            "organisations",
            r#"[{"code": "1", "name": "Alpha", "authorities": ["x"]}]"#,
        ),
    )
    .await
    .unwrap();

    assert_eq!(outcome.added.len(), 1);
    assert!(outcome.removed.is_empty() && outcome.changed.is_empty());
    assert_eq!(outcome.reconcile.created, 1);
    assert_eq!(outcome.metadata.captured_at, "01.02.2026 09:30");
}

#[tokio::test]
#[serial]
async fn pooled_routing_redirects_the_report() {
    let registry = SourceRegistry::with_default_sources();
    let mut repo = MockRepository::new();
    let mut notifier = MockNotifier::new();

    repo.expect_list().times(1).returning(|_, _, _| Ok(vec![]));
    // deliver is never expected; pool takes the report instead.
    notifier.expect_pool().times(1).returning(|_| Ok(()));
    repo.expect_create().times(1).returning(|_, fields| {
        Ok(Row {
            id: "doc-1".to_string(),
            fields,
        })
    });

    let mut req = request(
        "organisations",
        r#"[{"code": "1", "name": "Alpha", "authorities": []}]"#,
    );
    req.routing_mode = RoutingMode::Pooled;

    let outcome = run(&registry, &repo, &notifier, &WritePolicy::no_delay(), &req)
        .await
        .unwrap();
    assert_eq!(outcome.reconcile.created, 1);
}

#[tokio::test]
#[serial]
async fn failed_notification_aborts_before_reconcile() {
    let registry = SourceRegistry::with_default_sources();
    let mut repo = MockRepository::new();
    let mut notifier = MockNotifier::new();

    repo.expect_list().times(1).returning(|_, _, _| Ok(vec![]));
    notifier
        .expect_deliver()
        .times(1)
        .returning(|_| Err(NotifyError::with_status("mail endpoint rejected", 502)));
    // No create expectation: reconciliation must never start.

    let result = run(
        &registry,
        &repo,
        &notifier,
        &WritePolicy::no_delay(),
        &request(
            "organisations",
            r#"[{"code": "1", "name": "Alpha", "authorities": []}]"#,
        ),
    )
    .await;

    assert!(matches!(result, Err(EngineError::NotificationDelivery(_))));
}

#[tokio::test]
#[serial]
async fn response_envelope_reports_success_and_failure() {
    let registry = SourceRegistry::with_default_sources();
    let mut repo = MockRepository::new();
    let mut notifier = MockNotifier::new();

    repo.expect_list().times(1).returning(|_, _, _| Ok(vec![]));
    notifier.expect_deliver().times(1).returning(|_| Ok(()));
    repo.expect_create().times(1).returning(|_, fields| {
        Ok(Row {
            id: "doc-1".to_string(),
            fields,
        })
    });

    let ok = run(
        &registry,
        &repo,
        &notifier,
        &WritePolicy::no_delay(),
        &request(
            "organisations",
            r#"[{"code": "1", "name": "Alpha", "authorities": []}]"#,
        ),
    )
    .await;
    let body = serde_json::to_value(RunResponse::from(ok)).unwrap();
    assert_eq!(body["success"], serde_json::json!(true));
    assert_eq!(body["added"][0]["code"], serde_json::json!("1"));

    let err: Result<webwatch_core::dispatch::RunOutcome, EngineError> =
        Err(EngineError::UnknownSource("nope".into()));
    let body = serde_json::to_value(RunResponse::from(err)).unwrap();
    assert_eq!(body["success"], serde_json::json!(false));
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use webwatch_core::error::StorageError;
use webwatch_core::reconcile::{reconcile, WritePolicy};
use webwatch_core::record::{CanonicalRecord, FieldValue, PersistedRecord};
use webwatch_core::repository::{MockRepository, Row};
use webwatch_core::sources::organisations::SCHEMA;

fn org(code: &str, name: &str, authorities: &[&str]) -> CanonicalRecord {
    CanonicalRecord::new()
        .with("code", FieldValue::text(code))
        .with("name", FieldValue::text(name))
        .with("authorities", FieldValue::list(authorities.iter().copied()))
}

fn persisted(id: &str, record: CanonicalRecord) -> PersistedRecord {
    PersistedRecord::new(id, record)
}

#[tokio::test]
async fn removed_record_is_deleted_by_its_persisted_id() {
    let old = vec![persisted("doc-1", org("1", "Alpha", &[]))];
    let removed = old.clone();

    let mut repo = MockRepository::new();
    repo.expect_delete()
        .withf(|collection, id| collection == "orgs" && id == "doc-1")
        .times(1)
        .returning(|_, _| Ok(()));

    let report = reconcile(&repo, &WritePolicy::no_delay(), &SCHEMA, "orgs", &old, &[], &removed).await;

    assert_eq!(report.deleted, 1);
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn existing_key_updates_and_new_key_creates() {
    let old = vec![persisted("doc-1", org("1", "Alpha", &["x"]))];
    let new = vec![org("1", "Alpha", &["x", "y"]), org("2", "Beta", &[])];

    let mut repo = MockRepository::new();
    repo.expect_update()
        .withf(|collection, id, fields| {
            collection == "orgs"
                && id == "doc-1"
                && fields.get("authorities") == Some(&FieldValue::list(["x", "y"]))
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    repo.expect_create()
        .withf(|collection, fields| {
            collection == "orgs" && fields.get("code") == Some(&FieldValue::text("2"))
        })
        .times(1)
        .returning(|_, fields| {
            Ok(Row {
                id: "doc-2".to_string(),
                fields,
            })
        });

    let report = reconcile(&repo, &WritePolicy::no_delay(), &SCHEMA, "orgs", &old, &new, &[]).await;

    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn transient_failures_are_retried_without_duplicate_creates() {
    let new = vec![org("1", "Alpha", &[])];
    let calls = Arc::new(AtomicU32::new(0));

    let mut repo = MockRepository::new();
    let counter = calls.clone();
    repo.expect_create()
        .times(3)
        .returning(move |_, fields| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(StorageError::with_code("service unavailable", 503))
            } else {
                Ok(Row {
                    id: "doc-1".to_string(),
                    fields,
                })
            }
        });

    let report = reconcile(&repo, &WritePolicy::no_delay(), &SCHEMA, "orgs", &[], &new, &[]).await;

    // Three attempts, exactly one logical create.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn permanent_failure_on_one_item_does_not_abort_the_batch() {
    let old = vec![persisted("doc-1", org("1", "Alpha", &[]))];
    let new = vec![org("1", "Alpha renamed", &[]), org("2", "Beta", &[])];

    let mut repo = MockRepository::new();
    repo.expect_update()
        .times(1)
        .returning(|_, _, _| Err(StorageError::with_code("bad request", 400)));
    repo.expect_create()
        .withf(|_, fields| fields.get("code") == Some(&FieldValue::text("2")))
        .times(1)
        .returning(|_, fields| {
            Ok(Row {
                id: "doc-2".to_string(),
                fields,
            })
        });

    let report = reconcile(&repo, &WritePolicy::no_delay(), &SCHEMA, "orgs", &old, &new, &[]).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 0);
}

#[tokio::test]
async fn second_run_with_same_snapshot_converges_without_creates_or_deletes() {
    let new = vec![org("1", "Alpha", &["x"]), org("2", "Beta", &[])];
    let old: Vec<PersistedRecord> = new
        .iter()
        .enumerate()
        .map(|(i, r)| persisted(&format!("doc-{}", i + 1), r.clone()))
        .collect();

    let mut repo = MockRepository::new();
    let expected = new.clone();
    repo.expect_update()
        .withf(move |_, id, fields| {
            // Updates rewrite exactly the already-persisted field values.
            expected.iter().zip(["doc-1", "doc-2"]).any(|(record, doc)| {
                id == doc && *fields == record.clone().into_fields()
            })
        })
        .times(2)
        .returning(|_, _, _| Ok(()));

    let report = reconcile(&repo, &WritePolicy::no_delay(), &SCHEMA, "orgs", &old, &new, &[]).await;

    assert_eq!(report.updated, 2);
    assert_eq!(report.created, 0);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn duplicate_keys_in_new_snapshot_write_once_last_value_wins() {
    let new = vec![org("1", "first", &[]), org("1", "last", &[])];

    let mut repo = MockRepository::new();
    repo.expect_create()
        .withf(|_, fields| fields.get("name") == Some(&FieldValue::text("last")))
        .times(1)
        .returning(|_, fields| {
            Ok(Row {
                id: "doc-1".to_string(),
                fields,
            })
        });

    let report = reconcile(&repo, &WritePolicy::no_delay(), &SCHEMA, "orgs", &[], &new, &[]).await;
    assert_eq!(report.created, 1);
}

#[tokio::test]
async fn removed_record_without_identifier_is_skipped_silently() {
    let removed = vec![persisted("", org("1", "Alpha", &[]))];

    // No delete expectation: any call would panic the mock.
    let repo = MockRepository::new();
    let report = reconcile(&repo, &WritePolicy::no_delay(), &SCHEMA, "orgs", &[], &[], &removed).await;

    assert_eq!(report.deleted, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn failed_delete_is_tolerated_and_writes_continue() {
    let old = vec![persisted("doc-1", org("1", "Alpha", &[]))];
    let removed = old.clone();
    let new = vec![org("2", "Beta", &[])];

    let mut repo = MockRepository::new();
    repo.expect_delete()
        .times(1)
        .returning(|_, _| Err(StorageError::with_code("already gone", 404)));
    repo.expect_create()
        .times(1)
        .returning(|_, fields| {
            Ok(Row {
                id: "doc-2".to_string(),
                fields,
            })
        });

    let report = reconcile(&repo, &WritePolicy::no_delay(), &SCHEMA, "orgs", &old, &new, &removed).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 1);
}

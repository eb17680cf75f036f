//! Macro-generated test suite for `RecordStoreClient` contract validation.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod sync_harness;
//!
//! use sync_harness::*;
//! use jobsync::storage::InMemoryRecordStore;
//!
//! record_store_client_tests!(InMemoryRecordStore::new());
//! ```
//!
//! # Generated Tests
//!
//! ## Listing
//! - `test_list_empty`: nothing seeded, empty result
//! - `test_list_newest_first`: default sort is `-created`
//! - `test_list_scoped_by_owner_and_status`: predicate narrows the result
//! - `test_list_archived_only`: archived subset for the archive ledger seed
//!
//! ## Updates
//! - `test_update_archive_round_trip`: set then clear `archived`
//! - `test_update_nonexistent`: unknown id is `NotFound`
//!
//! ## Subscriptions
//! - `test_subscription_delivers_in_order`: create, update, delete in publish order
//! - `test_subscription_respects_predicate`: other owners' events are not delivered
//! - `test_unsubscribe_ends_stream`: stream closes once released
//! - `test_independent_subscribers`: two channels both see the same event

/// Generate a `RecordStoreClient` conformance test suite.
///
/// `$factory` must evaluate to a fresh client implementing both
/// `RecordStoreClient` and [`ServerSide`](super::ServerSide). It is
/// re-evaluated for each test.
#[macro_export]
macro_rules! record_store_client_tests {
    ($factory:expr) => {
        mod record_store_client_contract_tests {
            use super::*;
            use chrono::Utc;
            use jobsync::core::error::ClientError;
            use jobsync::core::events::{ChangeEvent, EventAction};
            use jobsync::core::query::{ListQuery, RecordPredicate, Sort};
            use jobsync::core::record::{JobPatch, JobStatus};
            use jobsync::core::service::RecordStoreClient;

            // ==================================================================
            // Listing
            // ==================================================================

            #[tokio::test]
            async fn test_list_empty() {
                let client = $factory;
                let jobs = client.list(&ListQuery::default()).await.unwrap();
                assert!(jobs.is_empty());
            }

            #[tokio::test]
            async fn test_list_newest_first() {
                let client = $factory;
                client.seed_records(vec![
                    job("old", "Old", 60),
                    job("new", "New", 1),
                    job("mid", "Mid", 30),
                ]);

                let jobs = client.list(&ListQuery::default()).await.unwrap();
                assert_eq!(ids(&jobs), vec!["new", "mid", "old"]);

                let oldest_first = ListQuery::new(RecordPredicate::all(), Sort::CreatedAsc);
                let jobs = client.list(&oldest_first).await.unwrap();
                assert_eq!(ids(&jobs), vec!["old", "mid", "new"]);
            }

            #[tokio::test]
            async fn test_list_scoped_by_owner_and_status() {
                let client = $factory;
                let mut raw = job("raw", "Raw", 1);
                raw.status = JobStatus::Raw;
                client.seed_records(vec![
                    job("mine", "Mine", 2),
                    owned_by(job("theirs", "Theirs", 3), OTHER_USER),
                    raw,
                ]);

                let query = ListQuery::new(
                    RecordPredicate::with_status(JobStatus::Processed).owned_by(USER),
                    Sort::default(),
                );
                let jobs = client.list(&query).await.unwrap();
                assert_eq!(ids(&jobs), vec!["mine"]);
            }

            #[tokio::test]
            async fn test_list_archived_only() {
                let client = $factory;
                client.seed_records(vec![job("active", "A", 1), archived(job("gone", "G", 2))]);

                let query = ListQuery::new(RecordPredicate::all().archived_only(), Sort::default());
                let jobs = client.list(&query).await.unwrap();
                assert_eq!(ids(&jobs), vec!["gone"]);
            }

            // ==================================================================
            // Updates
            // ==================================================================

            #[tokio::test]
            async fn test_update_archive_round_trip() {
                let client = $factory;
                client.seed_records(vec![job("a", "A", 1)]);

                let archived = client
                    .update("a", &JobPatch::archived(Some(Utc::now())))
                    .await
                    .unwrap();
                assert!(archived.is_archived());

                let restored = client.update("a", &JobPatch::archived(None)).await.unwrap();
                assert!(!restored.is_archived());
                assert_eq!(restored.title, "A");
            }

            #[tokio::test]
            async fn test_update_nonexistent() {
                let client = $factory;
                let err = client
                    .update("missing", &JobPatch::archived(None))
                    .await
                    .unwrap_err();
                assert!(matches!(err, ClientError::NotFound { ref id, .. } if id == "missing"));
                assert_eq!(err.error_code(), "CLIENT_NOT_FOUND");
            }

            // ==================================================================
            // Subscriptions
            // ==================================================================

            #[tokio::test]
            async fn test_subscription_delivers_in_order() {
                let client = $factory;
                let mut sub = client.subscribe("*", &RecordPredicate::all()).await.unwrap();

                let record = job("x", "X", 0);
                client.emit(ChangeEvent::create(record.clone()));
                client.emit(ChangeEvent::update(record.clone()));
                client.emit(ChangeEvent::delete(record));

                let mut actions = Vec::new();
                for _ in 0..3 {
                    actions.push(sub.events.recv().await.unwrap().unwrap().action);
                }
                assert_eq!(
                    actions,
                    vec![EventAction::Create, EventAction::Update, EventAction::Delete]
                );
            }

            #[tokio::test]
            async fn test_subscription_respects_predicate() {
                let client = $factory;
                let mut sub = client
                    .subscribe("*", &RecordPredicate::all().owned_by(USER))
                    .await
                    .unwrap();

                client.emit(ChangeEvent::create(owned_by(job("theirs", "T", 0), OTHER_USER)));
                client.emit(ChangeEvent::create(job("mine", "M", 0)));

                let event = sub.events.recv().await.unwrap().unwrap();
                assert_eq!(event.record_id(), "mine");
            }

            #[tokio::test]
            async fn test_unsubscribe_ends_stream() {
                let client = $factory;
                let mut sub = client.subscribe("*", &RecordPredicate::all()).await.unwrap();

                client.unsubscribe(&sub.id).await.unwrap();
                client.emit(ChangeEvent::create(job("late", "L", 0)));

                assert!(sub.events.recv().await.is_none());
            }

            #[tokio::test]
            async fn test_independent_subscribers() {
                let client = $factory;
                let mut first = client.subscribe("*", &RecordPredicate::all()).await.unwrap();
                let mut second = client.subscribe("*", &RecordPredicate::all()).await.unwrap();
                assert_ne!(first.id, second.id);

                client.emit(ChangeEvent::create(job("shared", "S", 0)));

                let a = first.events.recv().await.unwrap().unwrap();
                let b = second.events.recv().await.unwrap().unwrap();
                assert_eq!(a.record_id(), "shared");
                assert_eq!(b.record_id(), "shared");
            }
        }
    };
}

//! In-memory implementation of RecordStoreClient for testing and development
//!
//! Behaves like the remote store as seen through its client: predicate
//! filtered listing, partial updates, and one ordered push channel per
//! subscription fed from an [`EventBus`]. Every mutation made through it,
//! whether by the client or by the server-side helpers, publishes an event.

use crate::config::StoreConfig;
use crate::core::error::{ClientError, DeliveryError};
use crate::core::events::{ChangeEvent, EventBus, EventEnvelope};
use crate::core::query::{ListQuery, RecordPredicate};
use crate::core::record::{JobPatch, JobRecord};
use crate::core::service::{RecordStoreClient, RemoteSubscription};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

struct Inner {
    collection: String,
    records: RwLock<HashMap<String, JobRecord>>,
    bus: EventBus,
    forwarders: Mutex<HashMap<String, JoinHandle<()>>>,
    offline: AtomicBool,
    list_calls: AtomicUsize,
    update_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
}

/// In-memory record store
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Inner>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::with_event_buffer(1024)
    }

    /// Create a store whose subscribers may lag by at most `capacity` events
    pub fn with_event_buffer(capacity: usize) -> Self {
        Self::build("jobs", capacity)
    }

    /// Create a store named and buffered after `config`
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::build(&config.collection, config.event_buffer)
    }

    fn build(collection: &str, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                collection: collection.to_string(),
                records: RwLock::new(HashMap::new()),
                bus: EventBus::new(capacity),
                forwarders: Mutex::new(HashMap::new()),
                offline: AtomicBool::new(false),
                list_calls: AtomicUsize::new(0),
                update_calls: AtomicUsize::new(0),
                subscribe_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Insert records without publishing events
    pub fn seed(&self, records: impl IntoIterator<Item = JobRecord>) {
        let mut map = self.write_records();
        for record in records {
            map.insert(record.id.clone(), record);
        }
    }

    /// Server-side create; publishes a `create` event
    pub fn create(&self, record: JobRecord) -> JobRecord {
        self.write_records().insert(record.id.clone(), record.clone());
        self.inner
            .bus
            .publish(ChangeEvent::create(record.clone()).to_payload());
        record
    }

    /// Server-side overwrite; publishes an `update` event
    pub fn put(&self, record: JobRecord) -> JobRecord {
        self.write_records().insert(record.id.clone(), record.clone());
        self.inner
            .bus
            .publish(ChangeEvent::update(record.clone()).to_payload());
        record
    }

    /// Server-side delete; publishes a `delete` event when the record existed
    pub fn delete(&self, id: &str) -> Option<JobRecord> {
        let removed = self.write_records().remove(id);
        if let Some(record) = &removed {
            self.inner
                .bus
                .publish(ChangeEvent::delete(record.clone()).to_payload());
        }
        removed
    }

    /// Push an arbitrary payload to every subscriber, bypassing the records
    pub fn publish_raw(&self, payload: Value) -> usize {
        self.inner.bus.publish(payload)
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Make every client call fail with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.inner.update_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.inner.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of open push channels
    pub fn active_subscriptions(&self) -> usize {
        self.inner
            .forwarders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        self.inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<(), ClientError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Transport {
                message: "record store unreachable".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn topic_matches(topic: &str, record: &JobRecord) -> bool {
    topic == "*" || topic == record.id
}

/// Decode, filter and forward bus payloads into one subscription's stream
async fn forward(
    subscription_id: String,
    topic: String,
    predicate: RecordPredicate,
    mut rx: broadcast::Receiver<EventEnvelope>,
    tx: mpsc::UnboundedSender<Result<ChangeEvent, DeliveryError>>,
) {
    loop {
        match rx.recv().await {
            Ok(envelope) => {
                let item = ChangeEvent::from_payload(envelope.payload);
                let wanted = match &item {
                    Ok(event) => {
                        topic_matches(&topic, &event.record) && predicate.matches(&event.record)
                    }
                    // Undecodable payloads can't be filtered; let the consumer decide
                    Err(_) => true,
                };
                if wanted && tx.send(item).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(count)) => {
                tracing::warn!(
                    subscription_id = %subscription_id,
                    count = count,
                    "Subscription forwarder lagged, {} events skipped",
                    count
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[async_trait]
impl RecordStoreClient for InMemoryRecordStore {
    async fn list(&self, query: &ListQuery) -> Result<Vec<JobRecord>, ClientError> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let records = self
            .inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<JobRecord> = records
            .values()
            .filter(|r| query.predicate.matches(r))
            .cloned()
            .collect();
        result.sort_by(|a, b| query.sort.compare(a, b).then_with(|| a.id.cmp(&b.id)));

        Ok(result)
    }

    async fn update(&self, id: &str, patch: &JobPatch) -> Result<JobRecord, ClientError> {
        self.inner.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if patch.is_empty() {
            return Err(ClientError::Rejected {
                status: 400,
                message: "update requires at least one field".to_string(),
            });
        }

        let updated = {
            let mut records = self.write_records();
            let record = records.get_mut(id).ok_or_else(|| ClientError::NotFound {
                collection: self.inner.collection.clone(),
                id: id.to_string(),
            })?;
            record.apply_patch(patch);
            record.updated = Utc::now();
            record.clone()
        };

        self.inner
            .bus
            .publish(ChangeEvent::update(updated.clone()).to_payload());
        Ok(updated)
    }

    async fn subscribe(
        &self,
        topic: &str,
        predicate: &RecordPredicate,
    ) -> Result<RemoteSubscription, ClientError> {
        self.inner.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let id = format!("sub_{}", Uuid::new_v4().simple());
        // Subscribe to the bus before returning so nothing published afterwards is missed
        let rx = self.inner.bus.subscribe();
        let (tx, events) = mpsc::unbounded_channel();

        let task = tokio::spawn(forward(
            id.clone(),
            topic.to_string(),
            predicate.clone(),
            rx,
            tx,
        ));
        self.inner
            .forwarders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), task);

        tracing::debug!(subscription_id = %id, topic = %topic, "Remote subscription opened");

        Ok(RemoteSubscription {
            id,
            topic: topic.to_string(),
            events,
        })
    }

    async fn unsubscribe(&self, subscription_id: &str) -> Result<(), ClientError> {
        let task = self
            .inner
            .forwarders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subscription_id);
        if let Some(task) = task {
            task.abort();
            tracing::debug!(subscription_id = %subscription_id, "Remote subscription closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventAction;
    use crate::core::record::JobStatus;
    use chrono::Duration;
    use serde_json::json;

    fn job(id: &str, minutes_ago: i64) -> JobRecord {
        JobRecord::new(id, format!("Job {}", id), Utc::now() - Duration::minutes(minutes_ago))
    }

    #[tokio::test]
    async fn test_list_sorts_newest_first() {
        let store = InMemoryRecordStore::new();
        store.seed(vec![job("old", 30), job("new", 1), job("mid", 10)]);

        let jobs = store.list(&ListQuery::default()).await.unwrap();
        let ids: Vec<_> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_list_applies_predicate() {
        let store = InMemoryRecordStore::new();
        let mut raw = job("raw", 1);
        raw.status = JobStatus::Raw;
        store.seed(vec![raw, job("done", 2)]);

        let query = ListQuery::new(
            RecordPredicate::with_status(JobStatus::Processed),
            Default::default(),
        );
        let jobs = store.list(&query).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "done");
    }

    #[tokio::test]
    async fn test_offline_fails_calls() {
        let store = InMemoryRecordStore::new();
        store.set_offline(true);

        let err = store.list(&ListQuery::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert!(store.update("x", &JobPatch::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = InMemoryRecordStore::new();
        let err = store
            .update("missing", &JobPatch::archived(None))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_rejects_empty_patch() {
        let store = InMemoryRecordStore::new();
        store.seed(vec![job("a", 1)]);
        let before = store.get("a").unwrap();

        let err = store.update("a", &JobPatch::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 400, .. }));
        assert_eq!(err.error_code(), "CLIENT_REJECTED");
        assert_eq!(store.get("a").unwrap().updated, before.updated);
        assert_eq!(store.update_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_publishes_event() {
        let store = InMemoryRecordStore::new();
        store.seed(vec![job("a", 1)]);
        let mut sub = store.subscribe("*", &RecordPredicate::all()).await.unwrap();

        let updated = store
            .update("a", &JobPatch::archived(Some(Utc::now())))
            .await
            .unwrap();
        assert!(updated.is_archived());

        let event = sub.events.recv().await.unwrap().unwrap();
        assert_eq!(event.action, EventAction::Update);
        assert!(event.record.is_archived());
    }

    #[tokio::test]
    async fn test_subscription_filters_by_predicate() {
        let store = InMemoryRecordStore::new();
        let mut sub = store
            .subscribe("*", &RecordPredicate::all().owned_by("u1"))
            .await
            .unwrap();

        let mut other = job("theirs", 1);
        other.user = Some("u2".to_string());
        store.create(other);
        let mut mine = job("mine", 1);
        mine.user = Some("u1".to_string());
        store.create(mine);

        let event = sub.events.recv().await.unwrap().unwrap();
        assert_eq!(event.record_id(), "mine");
    }

    #[tokio::test]
    async fn test_malformed_payload_forwarded_as_error() {
        let store = InMemoryRecordStore::new();
        let mut sub = store.subscribe("*", &RecordPredicate::all()).await.unwrap();

        store.publish_raw(json!({ "action": "update", "record": 42 }));
        assert!(sub.events.recv().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_stream() {
        let store = InMemoryRecordStore::new();
        let mut sub = store.subscribe("*", &RecordPredicate::all()).await.unwrap();
        assert_eq!(store.active_subscriptions(), 1);

        store.unsubscribe(&sub.id).await.unwrap();
        assert_eq!(store.active_subscriptions(), 0);
        assert!(sub.events.recv().await.is_none());

        // Unknown ids are fine
        store.unsubscribe("sub_unknown").await.unwrap();
    }
}

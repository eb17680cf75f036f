//! Shared test harness for job store integration testing
//!
//! Provides job fixtures, a call-recording client wrapper and dependent
//! source for checking subscription ordering, and polling helpers for
//! assertions on state fed by background event pumps.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod sync_harness;
//! use sync_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod client_tests;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use jobsync::config::StoreConfig;
use jobsync::core::auth::{AuthStore, Identity};
use jobsync::core::error::{ClientError, SyncError, SyncResult};
use jobsync::core::events::ChangeEvent;
use jobsync::core::query::{ListQuery, RecordPredicate};
use jobsync::core::record::{JobPatch, JobRecord};
use jobsync::core::service::{RecordStoreClient, RemoteSubscription};
use jobsync::storage::InMemoryRecordStore;
use jobsync::store::{ArchiveLedger, DependentSource, JobsStore};

pub const USER: &str = "u1";
pub const OTHER_USER: &str = "u2";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A processed job owned by [`USER`], created `minutes_ago` minutes ago
pub fn job(id: &str, title: &str, minutes_ago: i64) -> JobRecord {
    let mut record = JobRecord::new(id, title, Utc::now() - Duration::minutes(minutes_ago));
    record.user = Some(USER.to_string());
    record
}

pub fn owned_by(mut record: JobRecord, user: &str) -> JobRecord {
    record.user = Some(user.to_string());
    record
}

pub fn archived(mut record: JobRecord) -> JobRecord {
    record.archived = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    record
}

pub fn remote(mut record: JobRecord, is_remote: bool) -> JobRecord {
    record.is_remote = Some(is_remote);
    record
}

pub fn graded(mut record: JobRecord, grade: &str) -> JobRecord {
    record.grade = Some(grade.to_string());
    record
}

pub fn signed_in(user: &str) -> Arc<AuthStore> {
    let auth = AuthStore::new();
    auth.save("test-token", Identity::user(user), None);
    Arc::new(auth)
}

pub fn signed_out() -> Arc<AuthStore> {
    Arc::new(AuthStore::new())
}

pub fn ids(records: &[JobRecord]) -> Vec<String> {
    records.iter().map(|r| r.id.clone()).collect()
}

/// Store over `client` for a signed-in [`USER`], no dependent source
pub fn build_store(client: &InMemoryRecordStore) -> JobsStore {
    JobsStore::builder(Arc::new(client.clone()), signed_in(USER))
        .build()
        .unwrap()
}

/// Store over `client` with an [`ArchiveLedger`] attached
pub fn build_store_with_ledger(client: &InMemoryRecordStore) -> (JobsStore, Arc<ArchiveLedger>) {
    let ledger = Arc::new(ArchiveLedger::new(
        Arc::new(client.clone()),
        StoreConfig::default(),
    ));
    let store = JobsStore::builder(Arc::new(client.clone()), signed_in(USER))
        .with_dependent(ledger.clone())
        .build()
        .unwrap();
    (store, ledger)
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Poll `check` until it holds or about two seconds have passed
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    check()
}

/// Async flavour of [`eventually`]
pub async fn eventually_async<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    check().await
}

/// Give background pumps time to run before asserting that nothing happened
pub async fn settle() {
    tokio::time::sleep(StdDuration::from_millis(100)).await;
}

// ---------------------------------------------------------------------------
// Call recording
// ---------------------------------------------------------------------------

/// Ordered log of subscription lifecycle calls across collaborators
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

/// Client wrapper logging `jobs.subscribe` and `jobs.unsubscribe`
pub struct RecordingClient {
    inner: InMemoryRecordStore,
    log: CallLog,
}

impl RecordingClient {
    pub fn new(inner: InMemoryRecordStore, log: CallLog) -> Self {
        Self { inner, log }
    }
}

#[async_trait]
impl RecordStoreClient for RecordingClient {
    async fn list(&self, query: &ListQuery) -> Result<Vec<JobRecord>, ClientError> {
        self.inner.list(query).await
    }

    async fn update(&self, id: &str, patch: &JobPatch) -> Result<JobRecord, ClientError> {
        self.inner.update(id, patch).await
    }

    async fn subscribe(
        &self,
        topic: &str,
        predicate: &RecordPredicate,
    ) -> Result<RemoteSubscription, ClientError> {
        self.log.push("jobs.subscribe");
        self.inner.subscribe(topic, predicate).await
    }

    async fn unsubscribe(&self, subscription_id: &str) -> Result<(), ClientError> {
        self.log.push("jobs.unsubscribe");
        self.inner.unsubscribe(subscription_id).await
    }
}

/// Dependent source logging `dependent.*` calls, optionally failing subscribe
#[derive(Default)]
pub struct RecordingDependent {
    log: CallLog,
    fail_subscribe: AtomicBool,
    cleared: AtomicBool,
}

impl RecordingDependent {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn fail_next_subscribe(&self) {
        self.fail_subscribe.store(true, Ordering::SeqCst);
    }

    pub fn was_cleared(&self) -> bool {
        self.cleared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DependentSource for RecordingDependent {
    fn name(&self) -> &str {
        "recording"
    }

    async fn subscribe(&self, _owner: &Identity) -> SyncResult<()> {
        self.log.push("dependent.subscribe");
        if self.fail_subscribe.swap(false, Ordering::SeqCst) {
            return Err(SyncError::Remote(ClientError::Transport {
                message: "dependent channel refused".to_string(),
            }));
        }
        Ok(())
    }

    async fn unsubscribe(&self) {
        self.log.push("dependent.unsubscribe");
    }

    fn clear(&self) {
        self.cleared.store(true, Ordering::SeqCst);
    }
}

/// Store wired to a [`RecordingClient`] and [`RecordingDependent`] sharing one log
pub fn build_recording_store(
    client: &InMemoryRecordStore,
) -> (JobsStore, Arc<RecordingDependent>, CallLog) {
    let log = CallLog::default();
    let dependent = Arc::new(RecordingDependent::new(log.clone()));
    let recording = Arc::new(RecordingClient::new(client.clone(), log.clone()));
    let store = JobsStore::builder(recording, signed_in(USER))
        .with_dependent(dependent.clone())
        .build()
        .unwrap();
    (store, dependent, log)
}

// ---------------------------------------------------------------------------
// Client contract support
// ---------------------------------------------------------------------------

/// Server-side access a client contract test needs beyond [`RecordStoreClient`]
pub trait ServerSide {
    fn seed_records(&self, records: Vec<JobRecord>);
    fn emit(&self, event: ChangeEvent);
}

impl ServerSide for InMemoryRecordStore {
    fn seed_records(&self, records: Vec<JobRecord>) {
        self.seed(records);
    }

    fn emit(&self, event: ChangeEvent) {
        self.publish_raw(event.to_payload());
    }
}

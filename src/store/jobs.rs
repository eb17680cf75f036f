//! The job store: collection cache, filter state and derived views behind one handle
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = Arc::new(InMemoryRecordStore::new());
//! let ledger = Arc::new(ArchiveLedger::new(client.clone(), StoreConfig::default()));
//! let store = JobsStore::builder(client, auth)
//!     .with_dependent(ledger)
//!     .build()?;
//!
//! store.load().await?;        // establish order: load, then subscribe
//! store.subscribe().await?;
//!
//! store.set_search("rust");
//! let page = store.page();
//!
//! store.unsubscribe().await;  // before clear on teardown
//! store.clear();
//! ```

use crate::config::StoreConfig;
use crate::core::auth::{Identity, IdentityProvider};
use crate::core::error::{LoadError, SyncError, SyncResult};
use crate::core::events::{ChangeEvent, EventAction};
use crate::core::query::Page;
use crate::core::record::{JobPatch, JobRecord};
use crate::core::service::RecordStoreClient;
use crate::store::collection::{Applied, JobCollection};
use crate::store::filters::FilterState;
use crate::store::subscription::{
    DependentSource, EventSink, Gate, SubscribeOutcome, SubscriptionCoordinator,
};
use crate::store::view::{self, ViewMemo};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Result of bootstrapping a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionLoad {
    /// `None` when signed out or when the load failed
    pub identity: Option<Identity>,
    pub jobs: Vec<JobRecord>,
}

impl SessionLoad {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

#[derive(Debug)]
struct StoreState {
    collection: JobCollection,
    filters: FilterState,
    owner: Option<Identity>,
    gate: Gate,
}

#[derive(Debug)]
struct StoreShared {
    state: RwLock<StoreState>,
}

impl StoreShared {
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for StoreShared {
    fn open_generation(&self) -> u64 {
        self.write().gate.open()
    }

    fn retire_generation(&self, generation: u64) {
        self.write().gate.retire(generation);
    }

    fn deliver(&self, generation: u64, event: ChangeEvent) -> bool {
        let mut state = self.write();
        if !state.gate.is_live(generation) {
            return false;
        }
        match state.collection.apply_event(&event) {
            Applied::Ignored => {
                tracing::warn!(
                    job_id = %event.record_id(),
                    "Ignoring change event with unknown action"
                );
            }
            applied => {
                tracing::debug!(
                    action = %event.action,
                    job_id = %event.record_id(),
                    applied = ?applied,
                    "Change event applied"
                );
            }
        }
        true
    }
}

/// Builder for [`JobsStore`]
///
/// # Example
///
/// ```ignore
/// let store = JobsStore::builder(client, auth)
///     .with_config(StoreConfig::from_yaml_file("jobs.yaml")?)
///     .build()?;
/// ```
pub struct JobsStoreBuilder {
    client: Arc<dyn RecordStoreClient>,
    auth: Arc<dyn IdentityProvider>,
    config: StoreConfig,
    dependent: Option<Arc<dyn DependentSource>>,
}

impl JobsStoreBuilder {
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a source whose subscription brackets the job subscription
    pub fn with_dependent(mut self, dependent: Arc<dyn DependentSource>) -> Self {
        self.dependent = Some(dependent);
        self
    }

    pub fn build(self) -> SyncResult<JobsStore> {
        self.config.validate().map_err(|e| SyncError::Config {
            message: e.to_string(),
        })?;

        let shared = Arc::new(StoreShared {
            state: RwLock::new(StoreState {
                collection: JobCollection::new(),
                filters: FilterState::new(self.config.page_size),
                owner: None,
                gate: Gate::default(),
            }),
        });
        let sink: Arc<dyn EventSink> = shared.clone();
        let coordinator =
            SubscriptionCoordinator::new(Arc::clone(&self.client), sink, self.dependent.clone());

        Ok(JobsStore {
            client: self.client,
            auth: self.auth,
            config: self.config,
            dependent: self.dependent,
            shared,
            view: Mutex::new(ViewMemo::new()),
            coordinator: tokio::sync::Mutex::new(coordinator),
        })
    }
}

/// Local mirror of the remote job collection with filterable, paginated views
///
/// The collection is mutated only by [`load`](Self::load), [`set_jobs`](Self::set_jobs),
/// [`apply_event`](Self::apply_event) (directly or through the live
/// subscription) and [`clear`](Self::clear). Derived views are recomputed
/// lazily when the collection or a filter predicate changed since the last read.
pub struct JobsStore {
    client: Arc<dyn RecordStoreClient>,
    auth: Arc<dyn IdentityProvider>,
    config: StoreConfig,
    dependent: Option<Arc<dyn DependentSource>>,
    shared: Arc<StoreShared>,
    view: Mutex<ViewMemo>,
    coordinator: tokio::sync::Mutex<SubscriptionCoordinator>,
}

impl JobsStore {
    pub fn builder(
        client: Arc<dyn RecordStoreClient>,
        auth: Arc<dyn IdentityProvider>,
    ) -> JobsStoreBuilder {
        JobsStoreBuilder {
            client,
            auth,
            config: StoreConfig::default(),
            dependent: None,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn memo(&self) -> MutexGuard<'_, ViewMemo> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Collection cache
    // ------------------------------------------------------------------

    /// Replace the collection with a fresh bulk fetch
    ///
    /// Requires a valid identity. On any failure the collection is left as it
    /// was. On success the identity becomes the store's owner, which scopes
    /// later subscriptions.
    pub async fn load(&self) -> SyncResult<Vec<JobRecord>> {
        let identity = self
            .auth
            .valid_identity()
            .ok_or(LoadError::Unauthenticated)?;
        let query = self.config.load_query(&identity);

        tracing::debug!(
            user_id = %identity.user_id,
            filter = %query.predicate.to_filter_expr(),
            sort = %query.sort,
            "Loading jobs"
        );

        let jobs = self.client.list(&query).await.map_err(LoadError::Remote)?;

        {
            let mut state = self.shared.write();
            state.collection.replace(jobs.clone());
            state.owner = Some(identity);
        }

        tracing::info!(count = jobs.len(), "Jobs loaded");
        Ok(jobs)
    }

    /// Bootstrap a session: load if signed in, drop credentials if that fails
    ///
    /// Never errors. A signed-out caller gets an empty anonymous session
    /// without any remote call.
    pub async fn load_session(&self) -> SessionLoad {
        if !self.auth.is_valid() {
            tracing::debug!("No valid session, skipping job load");
            return SessionLoad::anonymous();
        }

        match self.load().await {
            Ok(jobs) => SessionLoad {
                identity: self.owner(),
                jobs,
            },
            Err(e) => {
                tracing::error!(
                    error = %e,
                    code = e.error_code(),
                    "Session load failed, clearing credentials"
                );
                if e.invalidates_session() {
                    self.auth.clear();
                }
                SessionLoad::anonymous()
            }
        }
    }

    /// Replace the collection with already fetched records
    pub fn set_jobs(&self, jobs: Vec<JobRecord>) {
        self.shared.write().collection.replace(jobs);
    }

    /// Apply one change event to the collection
    pub fn apply_event(&self, event: &ChangeEvent) -> Applied {
        let applied = self.shared.write().collection.apply_event(event);
        if event.action == EventAction::Unknown {
            tracing::warn!(
                job_id = %event.record_id(),
                "Ignoring change event with unknown action"
            );
        }
        applied
    }

    /// Flip a job between archived and active on the remote store
    ///
    /// The local collection is not touched: the change becomes visible when
    /// the echoed `update` event arrives. Fails with [`SyncError::NotFound`]
    /// without any remote call when the id is not in the collection.
    pub async fn toggle_archive(&self, id: &str) -> SyncResult<JobRecord> {
        let currently_archived = self
            .shared
            .read()
            .collection
            .get(id)
            .map(JobRecord::is_archived)
            .ok_or_else(|| SyncError::NotFound { id: id.to_string() })?;

        let archived = if currently_archived {
            None
        } else {
            Some(Utc::now())
        };
        let updated = self.client.update(id, &JobPatch::archived(archived)).await?;

        tracing::debug!(job_id = %id, archived = archived.is_some(), "Archive toggle written");
        Ok(updated)
    }

    /// Snapshot of the whole collection in cache order
    pub fn jobs(&self) -> Vec<JobRecord> {
        self.shared.read().collection.to_vec()
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.shared.read().collection.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.read().collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.read().collection.is_empty()
    }

    /// Identity the collection was loaded for
    pub fn owner(&self) -> Option<Identity> {
        self.shared.read().owner.clone()
    }

    // ------------------------------------------------------------------
    // Subscription lifecycle
    // ------------------------------------------------------------------

    /// Start applying pushed change events
    ///
    /// Needs a prior [`load`](Self::load); without an owner nothing is
    /// subscribed and [`SubscribeOutcome::SkippedNotLoaded`] is returned.
    /// Calling it again replaces the running subscription.
    pub async fn subscribe(&self) -> SyncResult<SubscribeOutcome> {
        let Some(owner) = self.owner() else {
            tracing::warn!(
                "subscribe() called before load(), nothing to scope the subscription to"
            );
            return Ok(SubscribeOutcome::SkippedNotLoaded);
        };
        let predicate = self.config.predicate_for(&owner);

        let mut coordinator = self.coordinator.lock().await;
        coordinator
            .start(&self.config.topic, &predicate, &owner)
            .await?;
        Ok(SubscribeOutcome::Active)
    }

    /// Stop applying pushed events; safe when not subscribed
    ///
    /// Once this returns no further event is applied.
    pub async fn unsubscribe(&self) {
        self.coordinator.lock().await.stop().await;
    }

    pub async fn is_subscribed(&self) -> bool {
        self.coordinator.lock().await.is_active()
    }

    /// Drop the collection, owner, filters and dependent state
    ///
    /// Does not unsubscribe; stop the subscription first on teardown.
    pub fn clear(&self) {
        {
            let mut state = self.shared.write();
            state.collection.clear();
            state.filters.reset(self.config.page_size);
            state.owner = None;
        }
        self.memo().invalidate();
        if let Some(dependent) = &self.dependent {
            dependent.clear();
        }
        tracing::debug!("Job store cleared");
    }

    // ------------------------------------------------------------------
    // Filter state
    // ------------------------------------------------------------------

    /// Copy of the current filter state
    pub fn filters(&self) -> FilterState {
        self.shared.read().filters.clone()
    }

    pub fn search(&self) -> String {
        self.shared.read().filters.search().to_string()
    }

    pub fn set_search(&self, search: impl Into<String>) {
        self.shared.write().filters.set_search(search);
    }

    pub fn filter_remote(&self) -> Option<bool> {
        self.shared.read().filters.filter_remote()
    }

    pub fn set_filter_remote(&self, filter_remote: Option<bool>) {
        self.shared.write().filters.set_filter_remote(filter_remote);
    }

    pub fn filter_grade(&self) -> String {
        self.shared.read().filters.filter_grade().to_string()
    }

    pub fn set_filter_grade(&self, grade: impl Into<String>) {
        self.shared.write().filters.set_filter_grade(grade);
    }

    pub fn show_archived(&self) -> bool {
        self.shared.read().filters.show_archived()
    }

    pub fn set_show_archived(&self, show_archived: bool) {
        self.shared.write().filters.set_show_archived(show_archived);
    }

    pub fn current_page(&self) -> usize {
        self.shared.read().filters.current_page()
    }

    pub fn set_current_page(&self, page: usize) {
        self.shared.write().filters.set_current_page(page);
    }

    pub fn page_size(&self) -> usize {
        self.shared.read().filters.page_size()
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.shared.write().filters.set_page_size(page_size);
    }

    // ------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------

    /// Records passing every active predicate, in collection order
    pub fn filtered_jobs(&self) -> Arc<[JobRecord]> {
        let state = self.shared.read();
        self.memo().filtered(&state.collection, &state.filters)
    }

    /// The current page with its metadata
    pub fn page(&self) -> Page<JobRecord> {
        let state = self.shared.read();
        let filtered = self.memo().filtered(&state.collection, &state.filters);
        view::paginate(&filtered, &state.filters)
    }

    pub fn paginated_jobs(&self) -> Vec<JobRecord> {
        self.page().items
    }

    pub fn total_pages(&self) -> usize {
        let state = self.shared.read();
        let filtered = self.memo().filtered(&state.collection, &state.filters);
        view::total_pages(filtered.len(), state.filters.page_size())
    }

    /// How many times the filter pass actually ran
    pub fn view_recomputations(&self) -> u64 {
        self.memo().recomputations()
    }
}

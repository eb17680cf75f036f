//! Per-user archive bookkeeping, the dependent source of the job subscription

use crate::config::StoreConfig;
use crate::core::auth::Identity;
use crate::core::error::{SyncError, SyncResult};
use crate::core::events::{ChangeEvent, EventAction};
use crate::core::query::ListQuery;
use crate::core::service::RecordStoreClient;
use crate::store::subscription::{DependentSource, EventSink, Gate, Pump};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct LedgerState {
    gate: Gate,
    archived: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct LedgerShared {
    state: RwLock<LedgerState>,
}

impl LedgerShared {
    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for LedgerShared {
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
        let ChangeEvent { action, record } = event;
        match (action, record.archived) {
            (EventAction::Create | EventAction::Update, Some(at)) => {
                state.archived.insert(record.id, at);
            }
            (EventAction::Create | EventAction::Update, None) | (EventAction::Delete, _) => {
                state.archived.remove(&record.id);
            }
            (EventAction::Unknown, _) => {}
        }
        true
    }
}

/// Which of the owner's jobs are archived, and since when
///
/// Seeds itself from the archived subset on subscribe, then follows change
/// events on its own channel.
pub struct ArchiveLedger {
    client: Arc<dyn RecordStoreClient>,
    config: StoreConfig,
    shared: Arc<LedgerShared>,
    pump: Mutex<Option<Pump>>,
}

impl ArchiveLedger {
    pub fn new(client: Arc<dyn RecordStoreClient>, config: StoreConfig) -> Self {
        Self {
            client,
            config,
            shared: Arc::new(LedgerShared::default()),
            pump: Mutex::new(None),
        }
    }

    /// When `id` was archived, if it is
    pub fn archived_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.shared.read().archived.get(id).copied()
    }

    pub fn archived_count(&self) -> usize {
        self.shared.read().archived.len()
    }

    pub async fn is_subscribed(&self) -> bool {
        self.pump.lock().await.is_some()
    }

    async fn release(&self, pump: &mut Option<Pump>) {
        if let Some(pump) = pump.take() {
            pump.release(self.shared.as_ref(), self.client.as_ref()).await;
        }
    }
}

#[async_trait]
impl DependentSource for ArchiveLedger {
    fn name(&self) -> &str {
        "archive_ledger"
    }

    async fn subscribe(&self, owner: &Identity) -> SyncResult<()> {
        let mut pump = self.pump.lock().await;
        self.release(&mut pump).await;

        let predicate = self.config.predicate_for(owner);
        // Open the channel before seeding so a change racing the seed is buffered
        let subscription = self
            .client
            .subscribe(&self.config.topic, &predicate)
            .await
            .map_err(SyncError::from)?;

        let seed_query = ListQuery::new(predicate.archived_only(), Default::default());
        let seed = match self.client.list(&seed_query).await {
            Ok(seed) => seed,
            Err(e) => {
                if let Err(release) = self.client.unsubscribe(&subscription.id).await {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        error = %release,
                        "Failed to release archive subscription after seed failure"
                    );
                }
                return Err(e.into());
            }
        };

        {
            let mut state = self.shared.write();
            state.archived = seed
                .into_iter()
                .filter_map(|r| r.archived.map(|at| (r.id, at)))
                .collect();
            tracing::debug!(archived = state.archived.len(), "Archive ledger seeded");
        }

        let sink: Arc<dyn EventSink> = self.shared.clone();
        *pump = Some(Pump::spawn(sink, subscription, "archive_ledger"));
        Ok(())
    }

    async fn unsubscribe(&self) {
        let mut pump = self.pump.lock().await;
        self.release(&mut pump).await;
    }

    fn clear(&self) {
        self.shared.write().archived.clear();
    }
}

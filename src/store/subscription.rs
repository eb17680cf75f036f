//! Lifecycle of live change-event subscriptions
//!
//! # Architecture
//!
//! ```text
//! RecordStoreClient::subscribe() ──▶ EventStream ──▶ Pump task ──▶ EventSink::deliver(generation, event)
//!                                                                      │
//!                                                       gate.is_live(generation)? (under the sink's lock)
//!                                                                      │
//!                                                                ──yes──▶ apply to cache
//! ```
//!
//! Each subscription gets a fresh generation from the sink's [`Gate`]. Stopping
//! retires the generation under the same lock that guards the data before the
//! remote channel is released, so once `stop` returns no event from that
//! subscription can be applied, even one already pulled off the stream.

use crate::core::auth::Identity;
use crate::core::error::SyncResult;
use crate::core::events::ChangeEvent;
use crate::core::query::RecordPredicate;
use crate::core::service::{RecordStoreClient, RemoteSubscription};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Tracks which subscription generation may still mutate guarded state
///
/// Embed it in the state behind the sink's lock.
#[derive(Debug, Default, Clone)]
pub struct Gate {
    live: Option<u64>,
    next: u64,
}

impl Gate {
    /// Start a new generation, retiring any previous one
    pub fn open(&mut self) -> u64 {
        self.next = self.next.wrapping_add(1);
        self.live = Some(self.next);
        self.next
    }

    /// Retire `generation` if it is the live one
    pub fn retire(&mut self, generation: u64) {
        if self.live == Some(generation) {
            self.live = None;
        }
    }

    pub fn is_live(&self, generation: u64) -> bool {
        self.live == Some(generation)
    }

    pub fn is_open(&self) -> bool {
        self.live.is_some()
    }
}

/// Receiver of decoded events for one piece of guarded state
pub trait EventSink: Send + Sync + 'static {
    /// Allocate a live generation
    fn open_generation(&self) -> u64;

    /// Retire a generation; later deliveries for it are dropped
    fn retire_generation(&self, generation: u64);

    /// Apply `event` if `generation` is still live
    ///
    /// Returns `false` once the generation is retired, which ends the pump.
    fn deliver(&self, generation: u64, event: ChangeEvent) -> bool;
}

/// A running subscription: remote handle plus the task draining it
#[derive(Debug)]
pub struct Pump {
    subscription_id: String,
    generation: u64,
    task: JoinHandle<()>,
}

impl Pump {
    /// Spawn the task draining `subscription` into `sink`
    pub fn spawn(
        sink: Arc<dyn EventSink>,
        subscription: RemoteSubscription,
        label: &'static str,
    ) -> Self {
        let generation = sink.open_generation();
        let RemoteSubscription {
            id,
            topic,
            mut events,
        } = subscription;
        let subscription_id = id.clone();

        let task = tokio::spawn(async move {
            tracing::debug!(
                source = label,
                subscription_id = %id,
                topic = %topic,
                "Event pump started"
            );
            while let Some(item) = events.recv().await {
                match item {
                    Ok(event) => {
                        if !sink.deliver(generation, event) {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            source = label,
                            subscription_id = %id,
                            error = %e,
                            "Skipping undeliverable change event"
                        );
                    }
                }
            }
            tracing::debug!(source = label, subscription_id = %id, "Event pump stopped");
        });

        Self {
            subscription_id,
            generation,
            task,
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Retire, stop the task and close the remote channel
    pub async fn release(self, sink: &dyn EventSink, client: &dyn RecordStoreClient) {
        sink.retire_generation(self.generation);
        self.task.abort();
        if let Err(e) = client.unsubscribe(&self.subscription_id).await {
            tracing::warn!(
                subscription_id = %self.subscription_id,
                error = %e,
                "Failed to release remote subscription"
            );
        }
    }
}

/// A collaborator with its own subscription that the primary one depends on
///
/// Subscribed before the primary subscription and released after it.
#[async_trait]
pub trait DependentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Start (or restart) tracking for `owner`
    async fn subscribe(&self, owner: &Identity) -> SyncResult<()>;

    /// Stop tracking; a no-op when not subscribed
    async fn unsubscribe(&self);

    /// Drop tracked state
    fn clear(&self);
}

/// Whether `subscribe` established a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Active,
    /// No owner identity yet; call `load` first
    SkippedNotLoaded,
}

/// Sequences the primary subscription around an optional dependent source
pub struct SubscriptionCoordinator {
    client: Arc<dyn RecordStoreClient>,
    sink: Arc<dyn EventSink>,
    dependent: Option<Arc<dyn DependentSource>>,
    primary: Option<Pump>,
}

impl SubscriptionCoordinator {
    pub fn new(
        client: Arc<dyn RecordStoreClient>,
        sink: Arc<dyn EventSink>,
        dependent: Option<Arc<dyn DependentSource>>,
    ) -> Self {
        Self {
            client,
            sink,
            dependent,
            primary: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.primary.is_some()
    }

    /// Subscribe dependent first, then primary; an existing subscription is replaced
    pub async fn start(
        &mut self,
        topic: &str,
        predicate: &RecordPredicate,
        owner: &Identity,
    ) -> SyncResult<()> {
        if self.primary.is_some() {
            tracing::debug!("Replacing existing job subscription");
            self.stop().await;
        }

        if let Some(dependent) = &self.dependent {
            dependent.subscribe(owner).await?;
            tracing::debug!(source = dependent.name(), "Dependent subscription started");
        }

        let subscription = match self.client.subscribe(topic, predicate).await {
            Ok(subscription) => subscription,
            Err(e) => {
                if let Some(dependent) = &self.dependent {
                    dependent.unsubscribe().await;
                }
                return Err(e.into());
            }
        };

        let pump = Pump::spawn(Arc::clone(&self.sink), subscription, "jobs");
        tracing::info!(
            subscription_id = %pump.subscription_id(),
            topic = %topic,
            filter = %predicate.to_filter_expr(),
            "Job subscription started"
        );
        self.primary = Some(pump);
        Ok(())
    }

    /// Release primary, then dependent; a no-op when idle
    pub async fn stop(&mut self) {
        if let Some(pump) = self.primary.take() {
            let subscription_id = pump.subscription_id().to_string();
            pump.release(self.sink.as_ref(), self.client.as_ref()).await;
            tracing::info!(subscription_id = %subscription_id, "Job subscription stopped");
        }
        if let Some(dependent) = &self.dependent {
            dependent.unsubscribe().await;
        }
    }
}

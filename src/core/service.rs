//! Capability trait for the remote record store

use crate::core::error::{ClientError, DeliveryError};
use crate::core::events::ChangeEvent;
use crate::core::query::{ListQuery, RecordPredicate};
use crate::core::record::{JobPatch, JobRecord};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Ordered stream of decoded events for one remote subscription
///
/// A decode failure is delivered in-band so the consumer can skip that one
/// event and keep reading.
pub type EventStream = mpsc::UnboundedReceiver<Result<ChangeEvent, DeliveryError>>;

/// A live push channel opened by [`RecordStoreClient::subscribe`]
#[derive(Debug)]
pub struct RemoteSubscription {
    /// Handle id, passed back to [`RecordStoreClient::unsubscribe`]
    pub id: String,
    /// Topic the channel was opened on (`"*"` for the whole collection)
    pub topic: String,
    pub events: EventStream,
}

/// Network-facing collaborator holding the authoritative job collection
///
/// The store is agnostic to the transport; implementations only need to
/// honour the ordering of events within one subscription.
#[async_trait]
pub trait RecordStoreClient: Send + Sync {
    /// Fetch every record matching the query, in the requested order
    async fn list(&self, query: &ListQuery) -> Result<Vec<JobRecord>, ClientError>;

    /// Apply a partial update and return the stored record
    async fn update(&self, id: &str, patch: &JobPatch) -> Result<JobRecord, ClientError>;

    /// Open a push channel for mutations of records matching `predicate`
    async fn subscribe(
        &self,
        topic: &str,
        predicate: &RecordPredicate,
    ) -> Result<RemoteSubscription, ClientError>;

    /// Close a push channel
    ///
    /// Unknown ids are not an error.
    async fn unsubscribe(&self, subscription_id: &str) -> Result<(), ClientError>;
}

//! Core types shared by the store and its clients

pub mod auth;
pub mod error;
pub mod events;
pub mod query;
pub mod record;
pub mod service;

pub use auth::{AuthStore, Identity, IdentityProvider};
pub use error::{ClientError, DeliveryError, LoadError, SyncError, SyncResult};
pub use events::{ChangeEvent, EventAction, EventBus, EventEnvelope};
pub use query::{ListQuery, Page, PaginationMeta, RecordPredicate, Sort};
pub use record::{JobPatch, JobRecord, JobStatus};
pub use service::{EventStream, RecordStoreClient, RemoteSubscription};

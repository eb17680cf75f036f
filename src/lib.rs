//! # jobsync
//!
//! A client-side reactive store for a remote collection of job postings.
//!
//! ## Features
//!
//! - **Collection Cache**: ordered, id-unique local mirror, newest first
//! - **Live Updates**: create/update/delete events applied as they are pushed
//! - **Filtering**: archive partition, free-text search, remote flag and grade
//! - **Pagination**: 1-based pages over the filtered view with metadata
//! - **Memoized Views**: derived data recomputed only when its inputs change
//! - **Dependent Subscriptions**: archive bookkeeping started before and
//!   stopped after the job subscription
//! - **Configuration-Based**: scoping, sort and page size from YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobsync::prelude::*;
//!
//! let config = StoreConfig::from_yaml_file("jobs.yaml")?;
//! init_tracing(&config.logging)?;
//!
//! let client = Arc::new(InMemoryRecordStore::from_config(&config));
//! let auth = Arc::new(AuthStore::new());
//! auth.save(token, Identity::user("u1"), None);
//!
//! let ledger = Arc::new(ArchiveLedger::new(client.clone(), config.clone()));
//! let store = JobsStore::builder(client, auth)
//!     .with_config(config)
//!     .with_dependent(ledger)
//!     .build()?;
//!
//! store.load().await?;
//! store.subscribe().await?;
//!
//! store.set_search("rust");
//! for job in store.paginated_jobs() {
//!     println!("{} at {:?}", job.title, job.company);
//! }
//!
//! store.unsubscribe().await;
//! store.clear();
//! ```

pub mod config;
pub mod core;
pub mod storage;
pub mod store;
pub mod telemetry;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{AuthStore, Identity, IdentityProvider},
        error::{ClientError, DeliveryError, LoadError, SyncError, SyncResult},
        events::{ChangeEvent, EventAction, EventBus},
        query::{ListQuery, Page, PaginationMeta, RecordPredicate, Sort},
        record::{JobPatch, JobRecord, JobStatus},
        service::{RecordStoreClient, RemoteSubscription},
    };

    // === Store ===
    pub use crate::store::{
        Applied, ArchiveLedger, DependentSource, FilterState, JobsStore, SessionLoad,
        SubscribeOutcome,
    };

    // === Storage ===
    pub use crate::storage::InMemoryRecordStore;

    // === Config ===
    pub use crate::config::{LoggingConfig, StoreConfig};
    pub use crate::telemetry::init_tracing;

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
}

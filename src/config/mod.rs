//! Configuration loading and management

use crate::core::auth::Identity;
use crate::core::query::{ListQuery, RecordPredicate, Sort};
use crate::core::record::JobStatus;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Logging setup consumed by [`crate::telemetry::init_tracing`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set
    pub filter: String,

    /// Colored output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}

/// Configuration of a [`JobsStore`](crate::store::JobsStore)
///
/// Every field has a default, so an empty document is a valid config.
///
/// ```yaml
/// collection: jobs
/// topic: "*"
/// load_status: processed
/// scope_to_owner: true
/// sort: "-created"
/// page_size: 10
/// event_buffer: 1024
/// logging:
///   filter: "jobsync=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Remote collection name
    pub collection: String,

    /// Subscription topic; `*` is the whole collection
    pub topic: String,

    /// Server-side status every loaded record must have
    pub load_status: Option<JobStatus>,

    /// Restrict load and subscription to records owned by the signed-in user
    pub scope_to_owner: bool,

    /// Sort expression for the bulk load
    pub sort: String,

    /// Initial page size of the derived view
    pub page_size: usize,

    /// Broadcast buffer per subscriber in the in-memory store
    pub event_buffer: usize,

    pub logging: LoggingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: "jobs".to_string(),
            topic: "*".to_string(),
            load_status: Some(JobStatus::Processed),
            scope_to_owner: true,
            sort: "-created".to_string(),
            page_size: 10,
            event_buffer: 1024,
            logging: LoggingConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.topic.trim().is_empty() {
            bail!("topic must not be empty");
        }
        if let Err(e) = self.sort.parse::<Sort>() {
            bail!(e);
        }
        Ok(())
    }

    /// The predicate family shared by load and subscribe
    ///
    /// Owner scoping applies only to non-privileged identities.
    pub fn predicate_for(&self, identity: &Identity) -> RecordPredicate {
        let mut predicate = RecordPredicate {
            status: self.load_status,
            ..Default::default()
        };
        if self.scope_to_owner && !identity.superuser {
            predicate.owner = Some(identity.user_id.clone());
        }
        predicate
    }

    pub fn load_query(&self, identity: &Identity) -> ListQuery {
        // validate() rejects unknown expressions; fall back for hand-built configs
        let sort = self.sort.parse().unwrap_or_default();
        ListQuery::new(self.predicate_for(identity), sort)
    }
}

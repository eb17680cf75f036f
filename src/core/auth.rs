//! Authenticated identity as seen by the job store
//!
//! The store never authenticates on its own. It asks an [`IdentityProvider`]
//! who the current user is and whether the session is still valid, and asks
//! it to drop credentials when a load fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// The signed-in principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Privileged identity, bypasses per-user scoping
    #[serde(default)]
    pub superuser: bool,
}

impl Identity {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            superuser: false,
        }
    }

    pub fn superuser(user_id: impl Into<String>) -> Self {
        Self {
            superuser: true,
            ..Self::user(user_id)
        }
    }
}

/// Source of the current identity and its validity
pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, whether or not the session is still valid
    fn identity(&self) -> Option<Identity>;

    /// Whether requests made now would be authenticated
    fn is_valid(&self) -> bool;

    /// Drop stored credentials
    fn clear(&self);

    /// The identity, only if the session is valid
    fn valid_identity(&self) -> Option<Identity> {
        if self.is_valid() {
            self.identity()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct AuthRecord {
    token: String,
    identity: Identity,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory credential holder
///
/// Valid while a non-empty token is stored and its expiry, if any, lies in
/// the future.
#[derive(Debug, Default)]
pub struct AuthStore {
    record: RwLock<Option<AuthRecord>>,
}

impl AuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store credentials for `identity`
    pub fn save(
        &self,
        token: impl Into<String>,
        identity: Identity,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        *record = Some(AuthRecord {
            token: token.into(),
            identity,
            expires_at,
        });
    }

    pub fn token(&self) -> Option<String> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.token.clone())
    }
}

impl IdentityProvider for AuthStore {
    fn identity(&self) -> Option<Identity> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.identity.clone())
    }

    fn is_valid(&self) -> bool {
        let record = self.record.read().unwrap_or_else(PoisonError::into_inner);
        match record.as_ref() {
            Some(r) => !r.token.is_empty() && r.expires_at.is_none_or(|exp| exp > Utc::now()),
            None => false,
        }
    }

    fn clear(&self) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        if record.take().is_some() {
            tracing::debug!("Stored credentials cleared");
        }
    }
}

//! Job records mirrored from the remote store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Processing state of a job on the server side
///
/// Only used as a server-side load predicate; the derived views never
/// filter on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Freshly collected, not yet analysed
    #[default]
    Raw,
    /// Picked up by the extractor
    Processing,
    /// Parsed into a vacancy
    Processed,
    /// Determined not to be a vacancy
    Rejected,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Raw => "raw",
            JobStatus::Processing => "processing",
            JobStatus::Processed => "processed",
            JobStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single job listing as held by the remote store
///
/// `archived` doubles as the archive flag: `Some` means archived at that
/// instant, `None` means active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_remote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub archived: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,

    /// Owning user, when the collection is per-user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl JobRecord {
    /// Create a processed, active record with only the required fields set
    pub fn new(id: impl Into<String>, title: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            company: None,
            description: None,
            is_remote: None,
            grade: None,
            status: JobStatus::Processed,
            archived: None,
            created,
            updated: created,
            user: None,
            salary_min: None,
            salary_max: None,
            currency: None,
            location: None,
            skills: Vec::new(),
            url: None,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archived.is_some()
    }

    /// Apply a partial update in place
    pub fn apply_patch(&mut self, patch: &JobPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(archived) = patch.archived {
            self.archived = archived;
        }
    }
}

/// Partial update sent through `RecordStoreClient::update`
///
/// `archived` has three states: `None` leaves the field alone,
/// `Some(None)` clears it (serialized as `null`), `Some(Some(ts))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "explicit_null"
    )]
    pub archived: Option<Option<DateTime<Utc>>>,
}

impl JobPatch {
    /// Patch that archives (`Some`) or un-archives (`None`) a record
    pub fn archived(at: Option<DateTime<Utc>>) -> Self {
        Self {
            archived: Some(at),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.archived.is_none()
    }
}

/// A present `null` becomes `Some(None)`; an absent key stays `None` via `default`
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    empty_as_none(deserializer).map(Some)
}

/// The remote store reports unset dates as `""` rather than `null`
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(&s.replacen(' ', "T", 1))
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

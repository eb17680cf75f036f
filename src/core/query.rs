//! Server-side predicates, sorting and pagination utilities

use crate::core::record::{JobRecord, JobStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Server-side filter applied to `list` and `subscribe`
///
/// All fields are optional. `None` acts as a wildcard; set fields are ANDed.
///
/// # Examples
///
/// ```rust,ignore
/// // Processed jobs of one user
/// let predicate = RecordPredicate::with_status(JobStatus::Processed).owned_by("u1");
/// assert_eq!(predicate.to_filter_expr(), r#"status = "processed" && user = "u1""#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPredicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_not: Option<JobStatus>,

    /// Owning user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// `Some(true)` archived only, `Some(false)` active only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl RecordPredicate {
    /// Predicate matching every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn archived_only(mut self) -> Self {
        self.archived = Some(true);
        self
    }

    /// Evaluate the predicate locally
    pub fn matches(&self, record: &JobRecord) -> bool {
        if let Some(status) = self.status
            && record.status != status
        {
            return false;
        }

        if let Some(status) = self.status_not
            && record.status == status
        {
            return false;
        }

        if let Some(ref owner) = self.owner
            && record.user.as_deref() != Some(owner.as_str())
        {
            return false;
        }

        if let Some(archived) = self.archived
            && record.is_archived() != archived
        {
            return false;
        }

        true
    }

    /// Render as a remote filter expression
    ///
    /// Returns an empty string for the match-all predicate.
    pub fn to_filter_expr(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(status) = self.status {
            clauses.push(format!("status = \"{}\"", status));
        }
        if let Some(status) = self.status_not {
            clauses.push(format!("status != \"{}\"", status));
        }
        if let Some(ref owner) = self.owner {
            clauses.push(format!("user = \"{}\"", owner.replace('"', "\\\"")));
        }
        match self.archived {
            Some(true) => clauses.push("archived != \"\"".to_string()),
            Some(false) => clauses.push("archived = \"\"".to_string()),
            None => {}
        }
        clauses.join(" && ")
    }
}

/// Ordering of a `list` result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sort {
    /// Newest first (`-created`)
    #[default]
    CreatedDesc,
    /// Oldest first (`created`)
    CreatedAsc,
}

impl Sort {
    pub fn compare(&self, a: &JobRecord, b: &JobRecord) -> Ordering {
        match self {
            Sort::CreatedDesc => b.created.cmp(&a.created),
            Sort::CreatedAsc => a.created.cmp(&b.created),
        }
    }
}

impl FromStr for Sort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "-created" => Ok(Sort::CreatedDesc),
            "created" | "+created" => Ok(Sort::CreatedAsc),
            other => Err(format!("Unsupported sort expression: {}", other)),
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::CreatedDesc => f.write_str("-created"),
            Sort::CreatedAsc => f.write_str("created"),
        }
    }
}

/// A full `list` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub predicate: RecordPredicate,
    pub sort: Sort,
}

impl ListQuery {
    pub fn new(predicate: RecordPredicate, sort: Sort) -> Self {
        Self { predicate, sort }
    }
}

/// One page of a derived view
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// The items on this page
    pub items: Vec<T>,

    /// Pagination metadata
    pub pagination: PaginationMeta,
}

impl<T: Clone> Page<T> {
    /// Slice one page out of an already filtered sequence
    ///
    /// `page` and `page_size` are clamped to a minimum of 1. A page past the
    /// end yields no items.
    pub fn slice(items: &[T], page: usize, page_size: usize) -> Self {
        let pagination = PaginationMeta::new(page.max(1), page_size, items.len());
        let start = (pagination.page - 1).saturating_mul(pagination.page_size);
        let end = start.saturating_add(pagination.page_size).min(items.len());
        let items = if start < items.len() {
            items[start..end].to_vec()
        } else {
            Vec::new()
        };

        Self { items, pagination }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    /// Current page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub page_size: usize,

    /// Total number of items (after filters)
    pub total: usize,

    /// Total number of pages, 0 when there are no items
    pub total_pages: usize,

    pub has_next: bool,

    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(page: usize, page_size: usize, total: usize) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(page_size) };
        let start = (page - 1).saturating_mul(page_size);

        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next: start.saturating_add(page_size) < total,
            has_prev: page > 1,
        }
    }
}

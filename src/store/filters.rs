//! Caller-controlled filter and pagination state

use serde::{Deserialize, Serialize};

/// Independent client-side predicates plus the page window
///
/// Writing any predicate (`search`, `filter_remote`, `filter_grade`,
/// `show_archived`) moves the view back to page 1. Page and page size are
/// clamped to at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    search: String,
    filter_remote: Option<bool>,
    filter_grade: String,
    show_archived: bool,
    current_page: usize,
    page_size: usize,
    #[serde(skip)]
    revision: u64,
}

impl FilterState {
    pub fn new(page_size: usize) -> Self {
        Self {
            search: String::new(),
            filter_remote: None,
            filter_grade: String::new(),
            show_archived: false,
            current_page: 1,
            page_size: page_size.max(1),
            revision: 0,
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn filter_remote(&self) -> Option<bool> {
        self.filter_remote
    }

    pub fn filter_grade(&self) -> &str {
        &self.filter_grade
    }

    pub fn show_archived(&self) -> bool {
        self.show_archived
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Bumped whenever a predicate value actually changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        let changed = self.search != search;
        self.search = search;
        self.predicate_written(changed);
    }

    /// `None` shows records regardless of their remote flag
    pub fn set_filter_remote(&mut self, filter_remote: Option<bool>) {
        let changed = self.filter_remote != filter_remote;
        self.filter_remote = filter_remote;
        self.predicate_written(changed);
    }

    pub fn set_filter_grade(&mut self, grade: impl Into<String>) {
        let grade = grade.into();
        let changed = self.filter_grade != grade;
        self.filter_grade = grade;
        self.predicate_written(changed);
    }

    pub fn set_show_archived(&mut self, show_archived: bool) {
        let changed = self.show_archived != show_archived;
        self.show_archived = show_archived;
        self.predicate_written(changed);
    }

    pub fn set_current_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
    }

    /// Back to defaults, keeping the revision monotonic
    pub fn reset(&mut self, page_size: usize) {
        let revision = self.revision.wrapping_add(1);
        *self = Self::new(page_size);
        self.revision = revision;
    }

    fn predicate_written(&mut self, changed: bool) {
        self.current_page = 1;
        if changed {
            self.revision = self.revision.wrapping_add(1);
        }
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(10)
    }
}

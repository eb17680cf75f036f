//! Derived views over the collection
//!
//! Filtering is a pure, order-preserving pass; stages run in a fixed order
//! (archive partition, search, remote flag, grade) and each narrows the
//! previous result. [`ViewMemo`] keeps the last filtered result keyed by the
//! collection and filter revisions so unchanged inputs cost nothing.

use crate::core::query::Page;
use crate::core::record::JobRecord;
use crate::store::collection::JobCollection;
use crate::store::filters::FilterState;
use std::sync::Arc;

/// Whether one record passes every active predicate
pub fn matches(record: &JobRecord, filters: &FilterState) -> bool {
    if record.is_archived() != filters.show_archived() {
        return false;
    }

    if !filters.search().is_empty() {
        let term = filters.search().to_lowercase();
        let hit = contains_ci(Some(record.title.as_str()), &term)
            || contains_ci(record.company.as_deref(), &term)
            || contains_ci(record.description.as_deref(), &term);
        if !hit {
            return false;
        }
    }

    if let Some(remote) = filters.filter_remote()
        && record.is_remote != Some(remote)
    {
        return false;
    }

    if !filters.filter_grade().is_empty()
        && !contains_ci(record.grade.as_deref(), &filters.filter_grade().to_lowercase())
    {
        return false;
    }

    true
}

fn contains_ci(field: Option<&str>, lowered_term: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(lowered_term))
}

/// Records passing `filters`, in collection order
pub fn filter_jobs<'a>(
    jobs: impl IntoIterator<Item = &'a JobRecord>,
    filters: &FilterState,
) -> Vec<&'a JobRecord> {
    jobs.into_iter().filter(|r| matches(r, filters)).collect()
}

/// The current page of an already filtered sequence
pub fn paginate(filtered: &[JobRecord], filters: &FilterState) -> Page<JobRecord> {
    Page::slice(filtered, filters.current_page(), filters.page_size())
}

/// `ceil(len / page_size)`, 0 for an empty result
pub fn total_pages(len: usize, page_size: usize) -> usize {
    if len == 0 { 0 } else { len.div_ceil(page_size.max(1)) }
}

#[derive(Debug)]
struct Snapshot {
    collection_revision: u64,
    filter_revision: u64,
    filtered: Arc<[JobRecord]>,
}

/// Memoized filtered view
#[derive(Debug, Default)]
pub struct ViewMemo {
    snapshot: Option<Snapshot>,
    recomputations: u64,
}

impl ViewMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filtered records, recomputed only when either input revision moved
    pub fn filtered(
        &mut self,
        collection: &JobCollection,
        filters: &FilterState,
    ) -> Arc<[JobRecord]> {
        if let Some(snapshot) = &self.snapshot
            && snapshot.collection_revision == collection.revision()
            && snapshot.filter_revision == filters.revision()
        {
            return Arc::clone(&snapshot.filtered);
        }

        let filtered: Arc<[JobRecord]> = filter_jobs(collection.iter(), filters)
            .into_iter()
            .cloned()
            .collect();
        self.recomputations += 1;
        tracing::trace!(
            total = collection.len(),
            matched = filtered.len(),
            "Derived view recomputed"
        );

        self.snapshot = Some(Snapshot {
            collection_revision: collection.revision(),
            filter_revision: filters.revision(),
            filtered: Arc::clone(&filtered),
        });
        filtered
    }

    /// How many times the filter pass actually ran
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }
}

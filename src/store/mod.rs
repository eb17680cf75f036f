//! Client-side state for the job collection
//!
//! - [`collection`]: ordered, id-unique cache of records
//! - [`filters`]: user-controlled predicates and the current page
//! - [`view`]: filtered and paginated projections, memoized
//! - [`subscription`]: live event subscriptions and their ordering
//! - [`archive`]: archive bookkeeping subscribed alongside the jobs
//! - [`jobs`]: the [`JobsStore`] facade over all of the above

pub mod archive;
pub mod collection;
pub mod filters;
pub mod jobs;
pub mod subscription;
pub mod view;

pub use archive::ArchiveLedger;
pub use collection::{Applied, JobCollection};
pub use filters::FilterState;
pub use jobs::{JobsStore, JobsStoreBuilder, SessionLoad};
pub use subscription::{
    DependentSource, EventSink, Gate, Pump, SubscribeOutcome, SubscriptionCoordinator,
};
pub use view::ViewMemo;

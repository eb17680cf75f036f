//! Record store client implementations

pub mod in_memory;

pub use in_memory::InMemoryRecordStore;

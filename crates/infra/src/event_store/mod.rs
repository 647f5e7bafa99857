//! Append-only event store boundary.
//!
//! Storage-agnostic abstraction for tenant-scoped event streams, plus the
//! in-memory implementation used by tests and embedded deployments.
//! Publication of committed events is the dispatcher's job, not the store's.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, stream_version};

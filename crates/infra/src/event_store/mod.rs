//! Append-only event store boundary.
//!
//! Streams are keyed by `(tenant_id, aggregate_id)`; each sized product owns
//! exactly one stream.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

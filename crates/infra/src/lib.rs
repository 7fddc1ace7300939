//! Infrastructure layer: event streams and the operation pipeline.

pub mod event_store;
pub mod service;


pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use service::{InMemoryLedgerService, LedgerService, OperationError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use taskstake_core::{AccountId, ExpectedVersion};
use taskstake_events::Event;

/// An event ready to be appended to an account's stream (no sequence
/// number assigned yet; the store assigns one during append).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub account: AccountId,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Build an uncommitted event from a typed domain event, preserving
    /// the metadata needed to deserialize it on rehydration.
    pub fn from_typed<E>(
        account: AccountId,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::Serialize(e.to_string()))?;

        Ok(Self {
            event_id,
            account,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// A stored event in an append-only stream.
///
/// Sequence numbers are assigned by the store, are monotonically
/// increasing per account stream, and never change once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub account: AccountId,

    /// Monotonically increasing position in the account's stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }
}

/// Event store operation error (infrastructure, not domain).
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency check failed (stale stream version).
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A batch or loaded stream mixed accounts.
    #[error("account isolation violated: {0}")]
    AccountIsolation(String),

    /// Invalid event data or stream state.
    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// Event payload (de)serialization failed.
    #[error("event payload serialization failed: {0}")]
    Serialize(String),
}

/// Append-only, account-scoped event streams.
pub trait EventStore {
    /// Append a batch of events for one account, atomically. All events
    /// must target the same account; `expected_version` is checked against
    /// the stream's current version before anything is written.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load an account's full stream, in sequence order. An account with
    /// no history loads as an empty stream.
    fn load_stream(&self, account: AccountId) -> Result<Vec<StoredEvent>, EventStoreError>;
}

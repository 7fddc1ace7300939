use std::collections::HashMap;
use std::sync::RwLock;

use taskstake_core::{AccountId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// In-memory append-only event store, one stream per account.
///
/// Intended for tests/dev and for embedding behind the service's own
/// serialization. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AccountId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events must target the same account's stream.
        let account = events[0].account;
        for (idx, e) in events.iter().enumerate() {
            if e.account != account {
                return Err(EventStoreError::AccountIsolation(format!(
                    "batch contains multiple accounts (index {idx})"
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(account).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Assign sequence numbers and append (append-only).
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                account: e.account,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(&self, account: AccountId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&account).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn uncommitted(account: AccountId) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            account,
            event_type: "test.event".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn append_assigns_monotonic_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let account = AccountId::new();

        let first = store
            .append(vec![uncommitted(account)], ExpectedVersion::Exact(0))
            .unwrap();
        let second = store
            .append(
                vec![uncommitted(account), uncommitted(account)],
                ExpectedVersion::Exact(1),
            )
            .unwrap();

        assert_eq!(first[0].sequence_number, 1);
        assert_eq!(second[0].sequence_number, 2);
        assert_eq!(second[1].sequence_number, 3);
        assert_eq!(store.load_stream(account).unwrap().len(), 3);
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let account = AccountId::new();

        store
            .append(vec![uncommitted(account)], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![uncommitted(account)], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert_eq!(store.load_stream(account).unwrap().len(), 1);
    }

    #[test]
    fn batches_mixing_accounts_are_rejected() {
        let store = InMemoryEventStore::new();
        let a = AccountId::new();
        let b = AccountId::new();

        let err = store
            .append(
                vec![uncommitted(a), uncommitted(b)],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AccountIsolation(_)));
        assert!(store.load_stream(a).unwrap().is_empty());
        assert!(store.load_stream(b).unwrap().is_empty());
    }
}

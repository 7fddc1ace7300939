//! The operation pipeline: the caller-facing surface of the ledger.
//!
//! Each public operation runs as one synchronous critical section over the
//! event store, the escrow pool and the wallets:
//!
//! ```text
//! 1. Load the caller's stream (account-scoped)
//! 2. Rehydrate the TaskList aggregate
//! 3. Decide events (pure; all domain validation happens here)
//! 4. Preflight the value transfer the decision requires, if any
//! 5. Append events (append-only, optimistic concurrency check)
//! 6. Execute the transfer as the terminal step
//! ```
//!
//! The transfer is preflighted before the append and executed after it,
//! under the same lock, so it cannot fail once state has committed and no
//! caller can observe a cleared list with an unreleased lock (or a locked
//! list whose deposit never arrived). A failure at any earlier step leaves
//! both the stream and the pool exactly as they were.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use taskstake_core::{AccountId, Aggregate, AggregateRoot, ExpectedVersion, LedgerError};
use taskstake_custody::{EscrowPool, InMemoryWallets, TransferError, Wallets};
use taskstake_events::Command;
use taskstake_ledger::{
    AddItem, DeleteList, FinishItem, TaskList, TaskListCommand, TaskListEvent, TaskListView,
};

use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};

/// Operation failure, reported synchronously with the operation aborted
/// and no partial state change.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Deterministic domain rejection.
    #[error(transparent)]
    Domain(#[from] LedgerError),

    /// Event store failure (concurrency, isolation, invalid append).
    #[error("event store failure: {0}")]
    Store(#[from] EventStoreError),

    /// A stored payload no longer deserializes into a ledger event.
    #[error("corrupt event stream: {0}")]
    Deserialize(String),

    /// The service's state lock was poisoned.
    #[error("ledger unavailable: {0}")]
    Internal(String),
}

impl From<TransferError> for OperationError {
    fn from(value: TransferError) -> Self {
        OperationError::Domain(LedgerError::TransferFailed(value.to_string()))
    }
}

struct Inner<S, W> {
    store: S,
    pool: EscrowPool,
    wallets: W,
}

/// The authoritative ledger: per-account task lists and the escrow pool
/// behind them.
///
/// The production environment finalizes one operation at a time in a single
/// global order; the service models that with one mutex over its state, so
/// every operation is atomic across its state mutation and its value
/// transfer, and nothing can re-enter mid-operation.
pub struct LedgerService<S, W> {
    inner: Mutex<Inner<S, W>>,
}

/// Fully in-process wiring, the default for tests and embedding.
pub type InMemoryLedgerService = LedgerService<InMemoryEventStore, InMemoryWallets>;

impl InMemoryLedgerService {
    pub fn in_memory(wallets: InMemoryWallets) -> Self {
        Self::new(InMemoryEventStore::new(), wallets)
    }
}

impl<S, W> LedgerService<S, W>
where
    S: EventStore,
    W: Wallets,
{
    pub fn new(store: S, wallets: W) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store,
                pool: EscrowPool::new(),
                wallets,
            }),
        }
    }

    /// Wire a pre-funded pool (extra funds above the backed locks are
    /// allowed; solvency is an inequality).
    pub fn with_pool(store: S, wallets: W, pool: EscrowPool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store,
                pool,
                wallets,
            }),
        }
    }

    /// Append a task to the caller's list.
    ///
    /// The first task of a list locks `deposit` into escrow; for every
    /// later task the deposit argument is ignored and no value moves.
    pub fn add_item(
        &self,
        caller: AccountId,
        title: &str,
        deposit: u64,
    ) -> Result<(), OperationError> {
        let mut inner = self.lock_inner()?;
        let Inner {
            store,
            pool,
            wallets,
        } = &mut *inner;

        let cmd = TaskListCommand::AddItem(AddItem {
            account: caller,
            title: title.to_string(),
            deposit,
            occurred_at: Utc::now(),
        });
        let (list, events) = decide(store, caller, &cmd)?;

        let locking = events.iter().find_map(|ev| match ev {
            TaskListEvent::ItemAdded(e) if e.deposit_locked > 0 => Some(e.deposit_locked),
            _ => None,
        });

        if let Some(amount) = locking {
            if let Err(e) = pool.preflight_lock(wallets, caller, amount) {
                warn!(account = %caller, amount, error = %e, "deposit transfer rejected");
                return Err(e.into());
            }
        }

        append_events(store, caller, list.version(), &events)?;

        if let Some(amount) = locking {
            pool.lock(wallets, caller, amount)?;
            info!(account = %caller, amount, "deposit locked into escrow");
        }

        debug!(account = %caller, tasks = list.tasks().len() + 1, "task added");
        Ok(())
    }

    /// Mark the task at `index` finished. Re-finishing an already finished
    /// task is a no-op success, so retried calls are harmless.
    pub fn finish_item(&self, caller: AccountId, index: u32) -> Result<(), OperationError> {
        let mut inner = self.lock_inner()?;
        let Inner { store, .. } = &mut *inner;

        let cmd = TaskListCommand::FinishItem(FinishItem {
            account: caller,
            index,
            occurred_at: Utc::now(),
        });
        let (list, events) = decide(store, caller, &cmd)?;

        if events.is_empty() {
            debug!(account = %caller, index, "finish replay ignored");
            return Ok(());
        }

        append_events(store, caller, list.version(), &events)?;
        debug!(account = %caller, index, "task finished");
        Ok(())
    }

    /// Delete a fully finished list and release its locked deposit back to
    /// the caller. Returns the released amount (zero when the list was
    /// already empty).
    pub fn delete_list(&self, caller: AccountId) -> Result<u64, OperationError> {
        let mut inner = self.lock_inner()?;
        let Inner {
            store,
            pool,
            wallets,
        } = &mut *inner;

        let cmd = TaskListCommand::DeleteList(DeleteList {
            account: caller,
            occurred_at: Utc::now(),
        });
        let (list, events) = decide(store, caller, &cmd)?;

        if events.is_empty() {
            return Ok(0);
        }

        let released = events
            .iter()
            .find_map(|ev| match ev {
                TaskListEvent::ListDeleted(e) => Some(e.amount_released),
                _ => None,
            })
            .unwrap_or(0);

        if let Err(e) = pool.preflight_release(wallets, caller, released) {
            warn!(account = %caller, amount = released, error = %e, "release rejected");
            return Err(e.into());
        }

        append_events(store, caller, list.version(), &events)?;

        // Terminal step: state is committed, the preflighted release
        // cannot fail under the same lock.
        pool.release(wallets, caller, released)?;
        info!(account = %caller, amount = released, "escrow released");
        Ok(released)
    }

    /// Read the caller's current list. Pure: an account that never added
    /// a task reads as an empty list with a zero lock.
    pub fn get_list(&self, caller: AccountId) -> Result<TaskListView, OperationError> {
        let inner = self.lock_inner()?;
        let list = rehydrate(&inner.store, caller)?;
        Ok(list.view())
    }

    /// Current balance of an account's wallet.
    pub fn wallet_balance(&self, account: AccountId) -> Result<u64, OperationError> {
        Ok(self.lock_inner()?.wallets.balance(account))
    }

    /// Current balance of the escrow pool.
    pub fn pool_balance(&self) -> Result<u64, OperationError> {
        Ok(self.lock_inner()?.pool.balance())
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner<S, W>>, OperationError> {
        self.inner
            .lock()
            .map_err(|_| OperationError::Internal("state lock poisoned".to_string()))
    }
}

/// Load, validate and rehydrate the caller's aggregate, then decide the
/// command. The returned aggregate is at its pre-command version, which is
/// exactly what the optimistic append expects.
fn decide<S: EventStore>(
    store: &S,
    caller: AccountId,
    cmd: &TaskListCommand,
) -> Result<(TaskList, Vec<TaskListEvent>), OperationError> {
    // Structural authorization: a command may only target the caller's
    // own stream. The aggregate re-checks ownership as defense in depth.
    if cmd.account() != caller {
        return Err(LedgerError::Unauthorized.into());
    }

    let list = rehydrate(store, caller)?;
    let events = list.handle(cmd).map_err(OperationError::from)?;
    Ok((list, events))
}

fn rehydrate<S: EventStore>(store: &S, account: AccountId) -> Result<TaskList, OperationError> {
    let history = store.load_stream(account)?;
    validate_loaded_stream(account, &history)?;

    // Deterministic replay order even if a backend returns events unsorted.
    let mut sorted = history;
    sorted.sort_by_key(|e| e.sequence_number);

    let mut list = TaskList::empty(account);
    for stored in &sorted {
        let ev: TaskListEvent = serde_json::from_value(stored.payload.clone())
            .map_err(|e| OperationError::Deserialize(e.to_string()))?;
        list.apply(&ev);
    }

    Ok(list)
}

fn validate_loaded_stream(
    account: AccountId,
    stream: &[StoredEvent],
) -> Result<(), OperationError> {
    // Enforce account isolation even if a buggy backend returns another
    // account's events, and require monotonic sequence numbers.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.account != account {
            return Err(OperationError::Store(EventStoreError::AccountIsolation(
                format!("loaded stream contains wrong account at index {idx}"),
            )));
        }
        if e.sequence_number <= last {
            return Err(OperationError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn append_events<S: EventStore>(
    store: &S,
    account: AccountId,
    current_version: u64,
    events: &[TaskListEvent],
) -> Result<Vec<StoredEvent>, OperationError> {
    if events.is_empty() {
        return Ok(vec![]);
    }

    let uncommitted = events
        .iter()
        .map(|ev| UncommittedEvent::from_typed(account, Uuid::now_v7(), ev))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(store.append(uncommitted, ExpectedVersion::Exact(current_version))?)
}

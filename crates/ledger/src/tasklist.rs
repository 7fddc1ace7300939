use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taskstake_core::{AccountId, Aggregate, AggregateRoot, LedgerError};
use taskstake_events::{Command, Event};

/// A single task on an account's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    /// One-way flag: false → true via `FinishItem`, never reversed.
    pub completed: bool,
}

/// Snapshot of an account's list for the query surface.
///
/// An uninitialized account reads as an empty list with a zero lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListView {
    pub tasks: Vec<Task>,
    pub locked_amount: u64,
}

/// Aggregate root: one task list per account, with its locked deposit.
///
/// Invariants:
/// - `locked_amount > 0` iff `tasks` is non-empty.
/// - The lock is established exactly once, by the first task, and is not
///   changed by later `AddItem` calls.
/// - Task positions are insertion order and never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskList {
    account: AccountId,
    tasks: Vec<Task>,
    locked_amount: u64,
    version: u64,
}

impl TaskList {
    /// Empty aggregate for rehydration.
    pub fn empty(account: AccountId) -> Self {
        Self {
            account,
            tasks: Vec::new(),
            locked_amount: 0,
            version: 0,
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn locked_amount(&self) -> u64 {
        self.locked_amount
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.completed)
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.completed).count()
    }

    pub fn view(&self) -> TaskListView {
        TaskListView {
            tasks: self.tasks.clone(),
            locked_amount: self.locked_amount,
        }
    }
}

impl AggregateRoot for TaskList {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.account
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub account: AccountId,
    pub title: String,
    /// Deposit offered with this task, in smallest currency unit. Required
    /// strictly positive for the first task; ignored afterwards.
    pub deposit: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinishItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishItem {
    pub account: AccountId,
    pub index: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteList.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteList {
    pub account: AccountId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskListCommand {
    AddItem(AddItem),
    FinishItem(FinishItem),
    DeleteList(DeleteList),
}

impl Command for TaskListCommand {
    fn account(&self) -> AccountId {
        match self {
            TaskListCommand::AddItem(c) => c.account,
            TaskListCommand::FinishItem(c) => c.account,
            TaskListCommand::DeleteList(c) => c.account,
        }
    }
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub account: AccountId,
    pub title: String,
    /// Amount moved into escrow by this add. Positive only for the first
    /// task of a list; zero for every later task.
    pub deposit_locked: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemFinished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFinished {
    pub account: AccountId,
    pub index: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDeleted {
    pub account: AccountId,
    /// Amount released from escrow back to the account.
    pub amount_released: u64,
    pub task_count: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskListEvent {
    ItemAdded(ItemAdded),
    ItemFinished(ItemFinished),
    ListDeleted(ListDeleted),
}

impl Event for TaskListEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TaskListEvent::ItemAdded(_) => "ledger.tasklist.item_added",
            TaskListEvent::ItemFinished(_) => "ledger.tasklist.item_finished",
            TaskListEvent::ListDeleted(_) => "ledger.tasklist.list_deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TaskListEvent::ItemAdded(e) => e.occurred_at,
            TaskListEvent::ItemFinished(e) => e.occurred_at,
            TaskListEvent::ListDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TaskList {
    type Command = TaskListCommand;
    type Event = TaskListEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TaskListEvent::ItemAdded(e) => {
                self.tasks.push(Task {
                    title: e.title.clone(),
                    completed: false,
                });
                if e.deposit_locked > 0 {
                    self.locked_amount = e.deposit_locked;
                }
            }
            TaskListEvent::ItemFinished(e) => {
                if let Some(task) = self.tasks.get_mut(e.index as usize) {
                    task.completed = true;
                }
            }
            TaskListEvent::ListDeleted(_) => {
                self.tasks.clear();
                self.locked_amount = 0;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_owner(command.account())?;

        match command {
            TaskListCommand::AddItem(cmd) => self.handle_add(cmd),
            TaskListCommand::FinishItem(cmd) => self.handle_finish(cmd),
            TaskListCommand::DeleteList(cmd) => self.handle_delete(cmd),
        }
    }
}

impl TaskList {
    fn ensure_owner(&self, account: AccountId) -> Result<(), LedgerError> {
        if self.account != account {
            return Err(LedgerError::Unauthorized);
        }
        Ok(())
    }

    fn handle_add(&self, cmd: &AddItem) -> Result<Vec<TaskListEvent>, LedgerError> {
        if cmd.title.trim().is_empty() {
            return Err(LedgerError::InvalidTitle);
        }

        let deposit_locked = if self.tasks.is_empty() {
            if cmd.deposit == 0 {
                return Err(LedgerError::InsufficientDeposit);
            }
            cmd.deposit
        } else {
            // Lock is established once; deposits offered with later tasks
            // are ignored and never leave the caller.
            0
        };

        Ok(vec![TaskListEvent::ItemAdded(ItemAdded {
            account: cmd.account,
            title: cmd.title.clone(),
            deposit_locked,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_finish(&self, cmd: &FinishItem) -> Result<Vec<TaskListEvent>, LedgerError> {
        let len = self.tasks.len() as u32;
        let Some(task) = self.tasks.get(cmd.index as usize) else {
            return Err(LedgerError::index_out_of_range(cmd.index, len));
        };

        if task.completed {
            // Retried finish after a lost confirmation lands as a no-op.
            return Ok(vec![]);
        }

        Ok(vec![TaskListEvent::ItemFinished(ItemFinished {
            account: cmd.account,
            index: cmd.index,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteList) -> Result<Vec<TaskListEvent>, LedgerError> {
        if self.tasks.is_empty() {
            return Ok(vec![]);
        }

        if !self.all_completed() {
            return Err(LedgerError::IncompleteList);
        }

        Ok(vec![TaskListEvent::ListDeleted(ListDeleted {
            account: cmd.account,
            amount_released: self.locked_amount,
            task_count: self.tasks.len() as u32,
            occurred_at: cmd.occurred_at,
        })])
    }
}

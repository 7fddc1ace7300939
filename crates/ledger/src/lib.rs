//! Ledger module (per-account task lists with escrowed deposits, event-sourced).
//!
//! Pure domain logic only: no IO, no value movement, no persistence concerns.
//! The deposit a decision locks (or releases) is recorded on the emitted
//! event; actually moving it is the operation pipeline's job.

pub mod tasklist;

pub use tasklist::{
    AddItem, DeleteList, FinishItem, ItemAdded, ItemFinished, ListDeleted, Task, TaskList,
    TaskListCommand, TaskListEvent, TaskListView,
};

//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Every operation fails closed: an error means the operation was rejected
/// and no state changed. Infrastructure failures (storage, lock poisoning)
/// belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A task title was empty (or whitespace only).
    #[error("task title must not be empty")]
    InvalidTitle,

    /// The first task on a list requires a strictly positive deposit.
    #[error("first task requires a positive deposit")]
    InsufficientDeposit,

    /// A task index pointed past the end of the list.
    #[error("task index {index} out of range (list has {len} tasks)")]
    IndexOutOfRange { index: u32, len: u32 },

    /// The list still has unfinished tasks.
    #[error("cannot delete a list with unfinished tasks")]
    IncompleteList,

    /// Moving value across the escrow boundary failed.
    #[error("value transfer failed: {0}")]
    TransferFailed(String),

    /// The caller does not own the targeted list.
    #[error("caller does not own this list")]
    Unauthorized,
}

impl LedgerError {
    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::TransferFailed(msg.into())
    }

    pub fn index_out_of_range(index: u32, len: u32) -> Self {
        Self::IndexOutOfRange { index, len }
    }
}

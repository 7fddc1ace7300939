use thiserror::Error;

use taskstake_core::AccountId;

/// Failure at the value-transfer boundary.
///
/// Transfers are all-or-nothing: when any variant is returned, neither the
/// pool nor any wallet has changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The paying account cannot fund the transfer.
    #[error("account {account} holds {available}, transfer needs {required}")]
    InsufficientFunds {
        account: AccountId,
        available: u64,
        required: u64,
    },

    /// The pool cannot cover a release. Under correct accounting this is
    /// unreachable; it is still a hard failure, never an under-delivery.
    #[error("escrow pool holds {pool}, cannot release {requested}")]
    PoolUnderfunded { pool: u64, requested: u64 },

    /// A balance would exceed the representable range.
    #[error("balance overflow")]
    BalanceOverflow,
}

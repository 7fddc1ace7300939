//! Escrow custody: the pooled holder of all currently locked deposits.
//!
//! Value enters the pool through [`EscrowPool::lock`] and leaves through
//! [`EscrowPool::release`]; no other path moves value. The pool balance is
//! always at least the sum of every account's locked amount.

pub mod error;
pub mod pool;
pub mod wallets;

pub use error::TransferError;
pub use pool::EscrowPool;
pub use wallets::{InMemoryWallets, Wallets};

use taskstake_core::AccountId;

use crate::error::TransferError;
use crate::wallets::Wallets;

/// The pooled holder of all currently locked deposits.
///
/// `lock` and `release` are the only mutators. Each is all-or-nothing:
/// the wallet movement is the last fallible step of `lock`, and the pool
/// decrement happens only after the wallet credit succeeds in `release`,
/// so a failure partway leaves both sides untouched.
///
/// Safety property: the pool balance is always ≥ the sum of the locked
/// amounts it backs. A release larger than the pool fails rather than
/// under-delivering or going negative.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EscrowPool {
    balance: u64,
}

impl EscrowPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-funded pool. Extra funds above the backed locks
    /// are allowed; the solvency property is an inequality.
    pub fn with_balance(balance: u64) -> Self {
        Self { balance }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Check that `lock` would succeed, without moving anything.
    pub fn preflight_lock<W: Wallets + ?Sized>(
        &self,
        wallets: &W,
        from: AccountId,
        amount: u64,
    ) -> Result<(), TransferError> {
        let available = wallets.balance(from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: from,
                available,
                required: amount,
            });
        }
        self.balance
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow)?;
        Ok(())
    }

    /// Move `amount` from an account's wallet into the pool.
    pub fn lock<W: Wallets + ?Sized>(
        &mut self,
        wallets: &mut W,
        from: AccountId,
        amount: u64,
    ) -> Result<(), TransferError> {
        let new_balance = self
            .balance
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow)?;
        wallets.debit(from, amount)?;
        self.balance = new_balance;
        Ok(())
    }

    /// Check that `release` would succeed, without moving anything.
    pub fn preflight_release<W: Wallets + ?Sized>(
        &self,
        wallets: &W,
        to: AccountId,
        amount: u64,
    ) -> Result<(), TransferError> {
        if amount > self.balance {
            return Err(TransferError::PoolUnderfunded {
                pool: self.balance,
                requested: amount,
            });
        }
        wallets
            .balance(to)
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow)?;
        Ok(())
    }

    /// Move `amount` from the pool to an account's wallet.
    pub fn release<W: Wallets + ?Sized>(
        &mut self,
        wallets: &mut W,
        to: AccountId,
        amount: u64,
    ) -> Result<(), TransferError> {
        let new_balance = self
            .balance
            .checked_sub(amount)
            .ok_or(TransferError::PoolUnderfunded {
                pool: self.balance,
                requested: amount,
            })?;
        wallets.credit(to, amount)?;
        self.balance = new_balance;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallets::InMemoryWallets;

    #[test]
    fn lock_moves_value_from_wallet_to_pool() {
        let account = AccountId::new();
        let mut wallets = InMemoryWallets::with_balances([(account, 5_000)]);
        let mut pool = EscrowPool::new();

        pool.lock(&mut wallets, account, 1_000).unwrap();

        assert_eq!(wallets.balance(account), 4_000);
        assert_eq!(pool.balance(), 1_000);
    }

    #[test]
    fn lock_fails_whole_when_wallet_cannot_cover() {
        let account = AccountId::new();
        let mut wallets = InMemoryWallets::with_balances([(account, 100)]);
        let mut pool = EscrowPool::new();

        assert!(pool.preflight_lock(&wallets, account, 1_000).is_err());
        let err = pool.lock(&mut wallets, account, 1_000).unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));

        assert_eq!(wallets.balance(account), 100);
        assert_eq!(pool.balance(), 0);
    }

    #[test]
    fn release_returns_value_to_the_wallet() {
        let account = AccountId::new();
        let mut wallets = InMemoryWallets::with_balances([(account, 5_000)]);
        let mut pool = EscrowPool::new();

        pool.lock(&mut wallets, account, 1_000).unwrap();
        pool.release(&mut wallets, account, 1_000).unwrap();

        assert_eq!(wallets.balance(account), 5_000);
        assert_eq!(pool.balance(), 0);
    }

    #[test]
    fn release_never_exceeds_the_pool() {
        let account = AccountId::new();
        let mut wallets = InMemoryWallets::new();
        let mut pool = EscrowPool::with_balance(500);

        assert!(pool.preflight_release(&wallets, account, 501).is_err());
        let err = pool.release(&mut wallets, account, 501).unwrap_err();
        assert_eq!(
            err,
            TransferError::PoolUnderfunded {
                pool: 500,
                requested: 501,
            }
        );

        assert_eq!(pool.balance(), 500);
        assert_eq!(wallets.balance(account), 0);
    }

    #[test]
    fn release_overflowing_the_wallet_leaves_the_pool_intact() {
        let account = AccountId::new();
        let mut wallets = InMemoryWallets::with_balances([(account, u64::MAX)]);
        let mut pool = EscrowPool::with_balance(10);

        let err = pool.release(&mut wallets, account, 10).unwrap_err();
        assert_eq!(err, TransferError::BalanceOverflow);
        assert_eq!(pool.balance(), 10);
        assert_eq!(wallets.balance(account), u64::MAX);
    }

    #[test]
    fn seeded_pool_keeps_extra_funds_above_the_locks() {
        let account = AccountId::new();
        let mut wallets = InMemoryWallets::with_balances([(account, 1_000)]);
        let mut pool = EscrowPool::with_balance(5_000);

        pool.lock(&mut wallets, account, 1_000).unwrap();
        pool.release(&mut wallets, account, 1_000).unwrap();

        assert_eq!(pool.balance(), 5_000);
        assert_eq!(wallets.balance(account), 1_000);
    }
}

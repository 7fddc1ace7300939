use taskstake_core::AccountId;

/// A command targets exactly one account's stream.
///
/// Commands represent **intent** — a request to perform an action against
/// the issuing account's own ledger entry. They are transient (not
/// persisted) and are transformed into events, which are persisted.
///
/// Streams are keyed by account, so the account a command names is both
/// the transaction boundary and the authorization boundary: the operation
/// pipeline rejects any command whose account differs from the caller
/// before state is read.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// The account whose stream this command targets.
    fn account(&self) -> AccountId;
}

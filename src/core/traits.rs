//! Core traits at the seams of the engine
//!
//! The engine never talks to a database directly. It asks a [`Storage`] for a
//! unit of work and receives a [`Ledger`], a handle over the per-variant
//! account stores, the transaction log, holders and third parties that commits
//! or rolls back as one. Fraud rules, the caller identity and the clock are
//! injected the same way.

use crate::types::{
    Account, AccountHolder, AccountKind, AccountNumber, BankError, Caller, HolderId, Money,
    NewAccountHolder, NewTransaction, ThirdParty, Transaction, TransactionType,
};
use chrono::{DateTime, Duration, Utc};

/// Storage primitives available inside one unit of work
///
/// Implementations must make every write visible to later reads through the
/// same ledger, and must discard all of them if the unit of work fails.
pub trait Ledger {
    /// Look up an account in the store of one variant
    fn find_account(
        &self,
        kind: AccountKind,
        number: AccountNumber,
    ) -> Result<Option<Account>, BankError>;

    /// Add an account to the store of its variant
    fn insert_account(&mut self, account: &Account) -> Result<(), BankError>;

    /// Replace an existing account in the store of its variant
    fn update_account(&mut self, account: &Account) -> Result<(), BankError>;

    /// All accounts of one variant, ordered by number
    fn list_accounts(&self, kind: AccountKind) -> Result<Vec<Account>, BankError>;

    /// Append an entry to the log and return it with its assigned id
    fn append_transaction(&mut self, entry: NewTransaction) -> Result<Transaction, BankError>;

    /// Entries of an account with `start <= timestamp <= end`, oldest first
    fn transactions_between(
        &self,
        number: AccountNumber,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, BankError>;

    /// Most recent entry of an account whose type is one of `kinds`
    fn latest_transaction_of(
        &self,
        number: AccountNumber,
        kinds: &[TransactionType],
    ) -> Result<Option<Transaction>, BankError>;

    fn find_holder(&self, id: HolderId) -> Result<Option<AccountHolder>, BankError>;

    fn insert_holder(&mut self, holder: NewAccountHolder) -> Result<AccountHolder, BankError>;

    /// Look up a third party by the digest of its key
    fn find_third_party(&self, hashed_key: &str) -> Result<Option<ThirdParty>, BankError>;

    fn insert_third_party(
        &mut self,
        name: &str,
        hashed_key: &str,
    ) -> Result<ThirdParty, BankError>;
}

/// A transactional store
///
/// `atomically` runs `work` against a fresh [`Ledger`]. When `work` returns
/// `Ok` every write is committed together; when it returns `Err` nothing is.
pub trait Storage: Send + Sync {
    fn atomically<T, F>(&self, work: F) -> Result<T, BankError>
    where
        F: FnOnce(&mut dyn Ledger) -> Result<T, BankError>;
}

/// Pluggable fraud rule evaluation
///
/// Implementations must be pure: the same inputs always give the same answer.
pub trait FraudPolicy: Send + Sync {
    /// How far back the engine should load history for [`FraudPolicy::evaluate`]
    fn lookback(&self) -> Duration;

    /// `true` if the proposed operation should be denied and the account frozen
    ///
    /// # Arguments
    ///
    /// * `account` - The account about to be credited or debited
    /// * `history` - Entries of the account within the look-back window, oldest first
    /// * `amount` - Magnitude of the proposed operation
    /// * `now` - Time of the proposed operation
    fn evaluate(
        &self,
        account: &Account,
        history: &[Transaction],
        amount: &Money,
        now: DateTime<Utc>,
    ) -> bool;
}

/// Source of the authenticated caller for the current request
pub trait IdentityProvider: Send + Sync {
    fn current_caller(&self) -> Option<Caller>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

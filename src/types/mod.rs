//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `money`: Currency and fixed-point money values
//! - `account`: Account snapshots, variants and their terms
//! - `transaction`: Log entries and batch operations
//! - `holder`: Account holders, third parties and callers
//! - `error`: Error types for the banking engine

pub mod account;
pub mod error;
pub mod holder;
pub mod money;
pub mod transaction;

pub use account::{
    Account, AccountKind, AccountNumber, AccountStatus, AccountTerms, HolderId, InterestPeriod,
    PenaltyRule,
};
pub use error::BankError;
pub use holder::{
    hash_key, AccountHolder, Address, Caller, NewAccountHolder, Role, ThirdParty, ThirdPartyId,
};
pub use money::{Currency, Money};
pub use transaction::{NewTransaction, Operation, Transaction, TransactionId, TransactionType};

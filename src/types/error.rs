//! Error types for the banking engine
//!
//! This module defines every error that an engine operation, a storage
//! adapter or the batch front end can surface. Errors carry enough context
//! (account numbers, amounts, currencies) to be printed directly by the CLI.
//!
//! # Error Categories
//!
//! - **Lookup Errors**: unknown accounts, holders, ambiguous account numbers
//! - **Denials**: fraud, frozen accounts, insufficient funds, authorization
//! - **Arithmetic Errors**: currency mismatch, overflow, invalid amounts
//! - **Infrastructure Errors**: storage, file I/O, CSV parsing

use crate::types::{AccountNumber, Currency, HolderId};
use thiserror::Error;

/// Main error type for the banking engine
///
/// Every variant is a value (`Clone + PartialEq`) so results can be compared
/// in tests and collected from worker tasks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BankError {
    /// No variant store holds the account number
    #[error("Account {account} not found")]
    AccountNotFound {
        /// The account number that was looked up
        account: AccountNumber,
    },

    /// Two money values with different currencies were combined
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch {
        /// Currency of the left-hand value
        expected: Currency,
        /// Currency of the right-hand value
        actual: Currency,
    },

    /// The fraud policy flagged the operation; the account has been frozen
    #[error("Operation on account {account} denied by fraud detection; account frozen")]
    FraudDenied {
        /// The flagged account
        account: AccountNumber,
    },

    /// The account is frozen and accepts no balance changes
    #[error("Account {account} is frozen")]
    AccountFrozen {
        /// The frozen account
        account: AccountNumber,
    },

    /// A debit would take the balance below the variant's floor
    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// The account being debited
        account: AccountNumber,
        /// Balance before the debit, formatted with its currency
        balance: String,
        /// Requested amount, formatted with its currency
        requested: String,
    },

    /// The caller may not act on the account
    #[error("Caller is not authorized for account {account}")]
    Unauthorized {
        /// The account the caller tried to access
        account: AccountNumber,
    },

    /// A third-party key, role or account secret did not check out
    #[error("Invalid credential: {reason}")]
    InvalidCredential {
        /// Human readable reason
        reason: String,
    },

    /// A statement query matched no entries
    #[error("No transactions for account {account} between {from} and {to}")]
    NoTransactionsInRange {
        /// The queried account
        account: AccountNumber,
        /// First day of the range
        from: String,
        /// Last day of the range
        to: String,
    },

    /// Amount is negative or has more than two decimal places
    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount {
        /// The rejected amount as text
        amount: String,
        /// Why it was rejected
        reason: String,
    },

    /// Decimal arithmetic would overflow
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
    },

    /// Account number already used by some variant store
    #[error("Account number {account} is already in use")]
    DuplicateAccountNumber {
        /// The conflicting number
        account: AccountNumber,
    },

    /// Account number present in more than one variant store
    #[error("Account number {account} is present in both the {first} and {second} stores")]
    AmbiguousAccount {
        /// The conflicting number
        account: AccountNumber,
        /// First store holding the number (resolution order)
        first: String,
        /// Second store holding the number
        second: String,
    },

    /// Source and destination of a transfer are the same account
    #[error("Cannot transfer from account {account} to itself")]
    SelfTransfer {
        /// The account named twice
        account: AccountNumber,
    },

    /// Referenced account holder does not exist
    #[error("Account holder {holder} not found")]
    HolderNotFound {
        /// The holder id that was looked up
        holder: HolderId,
    },

    /// Login id already taken by another account holder
    #[error("Login id '{login_id}' is already registered")]
    DuplicateLogin {
        /// The conflicting login id
        login_id: String,
    },

    /// Storage adapter failure
    ///
    /// `transient` failures (lock contention) may be retried; everything else
    /// is surfaced as-is.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the failure
        message: String,
        /// Whether retrying the unit of work may succeed
        transient: bool,
    },

    /// I/O error while reading or writing files
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// Malformed input record
    #[error("Parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

impl From<std::io::Error> for BankError {
    fn from(error: std::io::Error) -> Self {
        BankError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for BankError {
    fn from(error: csv::Error) -> Self {
        if error.is_io_error() {
            return BankError::Io {
                message: error.to_string(),
            };
        }
        let line = error.position().map(|pos| pos.line());

        BankError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

impl From<rusqlite::Error> for BankError {
    fn from(error: rusqlite::Error) -> Self {
        let transient = matches!(
            error.sqlite_error_code(),
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
        );

        BankError::Storage {
            message: error.to_string(),
            transient,
        }
    }
}

// Helper functions for creating common errors

impl BankError {
    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountNumber) -> Self {
        BankError::AccountNotFound { account }
    }

    /// Create a CurrencyMismatch error
    pub fn currency_mismatch(expected: Currency, actual: Currency) -> Self {
        BankError::CurrencyMismatch { expected, actual }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(
        account: AccountNumber,
        balance: impl ToString,
        requested: impl ToString,
    ) -> Self {
        BankError::InsufficientFunds {
            account,
            balance: balance.to_string(),
            requested: requested.to_string(),
        }
    }

    /// Create an InvalidCredential error
    pub fn invalid_credential(reason: &str) -> Self {
        BankError::InvalidCredential {
            reason: reason.to_string(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: impl ToString, reason: &str) -> Self {
        BankError::InvalidAmount {
            amount: amount.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str) -> Self {
        BankError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    /// Create a non-transient Storage error
    pub fn storage(message: impl ToString) -> Self {
        BankError::Storage {
            message: message.to_string(),
            transient: false,
        }
    }

    /// Create a Parse error without line information
    pub fn parse(message: impl ToString) -> Self {
        BankError::Parse {
            line: None,
            message: message.to_string(),
        }
    }

    /// Whether retrying the failed unit of work may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, BankError::Storage { transient: true, .. })
    }
}

//! Banking Engine Library
//!
//! # Overview
//!
//! The back-end core of a retail bank: polymorphic accounts, an append-only
//! transaction log, fraud screening, minimum-balance penalties, interest
//! accrual and access checks, over pluggable storage.
//!
//! # Architecture
//!
//! - [`types`] - Money, accounts, holders, log entries and errors
//! - [`core`] - Business logic:
//!   - [`core::engine`] - Credit, debit, transfer, interest and penalties
//!   - [`core::account_manager`] - Resolution across the per-variant stores
//!   - [`core::transaction_store`] - Transaction log queries
//!   - [`core::fraud`] - Default fraud rules
//!   - [`core::auth`] - Holder, administrator and third-party checks
//! - [`store`] - In-memory and SQLite storage adapters
//! - [`io`] - CSV reading of batch operations and report output
//! - [`strategy`] - Sync and async batch pipelines
//! - [`cli`] - Command-line parsing and dispatch
//!
//! # Account Variants
//!
//! - **Checking**: minimum balance with a penalty fee
//! - **Savings**: minimum balance, penalty fee and yearly interest
//! - **Student**: plain balance, no fees, no interest
//! - **CreditCard**: may go negative down to its credit limit; monthly interest
//!
//! # Operations
//!
//! Every operation runs as one unit of work: the balance change and its log
//! entries commit together or not at all.
//!
//! - **Credit** / **Debit**: one account, one log entry (plus a penalty entry
//!   when a debit takes the balance below the minimum)
//! - **Transfer**: two accounts, two entries with one timestamp
//! - **Interest**: at most once per period, paid or charged through the same
//!   credit and debit rules

pub mod cli;
pub mod core;
pub mod io;
pub mod store;
pub mod strategy;
pub mod types;

pub use core::{AccountManager, EngineConfig, TransactionEngine, TransactionLog};
pub use io::{write_accounts_csv, write_transactions_csv};
pub use store::{MemoryStorage, SqliteStorage};
pub use types::{Account, AccountNumber, BankError, Money, Transaction, TransactionType};

//! Core business logic module
//!
//! This module contains the banking core:
//! - `traits` - Seams for storage, fraud rules, identity and time
//! - `engine` - Credit, debit, transfer, interest and penalty orchestration
//! - `account_manager` - Polymorphic resolution over the per-variant stores
//! - `transaction_store` - Append-only transaction log queries
//! - `fraud` - Default rule based fraud detector
//! - `auth` - Holder, administrator and third-party access checks
//! - `locks` - Per-account lock table
//! - `retry` - Bounded retry of transient storage failures
//! - `batch_processor` - Concurrent, account-partitioned batch application
//! - `clock` - System and manual clocks

pub mod account_manager;
pub mod auth;
pub mod batch_processor;
pub mod clock;
pub mod engine;
pub mod fraud;
pub mod locks;
pub mod retry;
pub mod traits;
pub mod transaction_store;

pub use account_manager::AccountManager;
pub use auth::{verify_secret_key, Authorizer, StaticIdentity};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use clock::{ManualClock, SystemClock};
pub use engine::{EngineConfig, TransactionEngine};
pub use fraud::{FraudConfig, FraudDetector};
pub use locks::AccountLocks;
pub use retry::RetryPolicy;
pub use traits::{Clock, FraudPolicy, IdentityProvider, Ledger, Storage};
pub use transaction_store::TransactionLog;

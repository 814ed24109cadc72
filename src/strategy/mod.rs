//! Processing strategy module for batch files
//!
//! A strategy is a complete pipeline: read operations from a CSV file, apply
//! them through the engine, and write the final state of every account the
//! file touched. Synchronous and asynchronous batch implementations can be
//! selected at runtime.

use crate::cli::StrategyType;
use crate::core::{Storage, TransactionEngine};
use crate::types::{Account, AccountNumber, BankError};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete batch pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Apply the operations in `input_path` and write the touched accounts
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the input CSV file containing operations
    /// * `output` - Writer receiving the final account states as CSV
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the file was processed (rejected operations included)
    /// * `Err(BankError)` if a fatal error occurred
    ///
    /// # Errors
    ///
    /// - The input file cannot be opened
    /// - The storage fails while reading back final account states
    /// - Output cannot be written
    ///
    /// Rejected operations and malformed rows are logged and skipped; they
    /// never make this method fail.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), BankError>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - Sync or Async
/// * `config` - Batch configuration (ignored for sync)
/// * `engine` - Engine the strategy applies operations through
pub fn create_strategy<S: Storage + 'static>(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    engine: Arc<TransactionEngine<S>>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(engine)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(engine, config))
        }
    }
}

/// Current snapshots of the touched accounts; numbers that never resolved
/// are left out
pub(crate) fn touched_accounts<S: Storage>(
    engine: &TransactionEngine<S>,
    touched: BTreeSet<AccountNumber>,
) -> Result<Vec<Account>, BankError> {
    let mut accounts = Vec::with_capacity(touched.len());
    for number in touched {
        match engine.account(number) {
            Ok(account) => accounts.push(account),
            Err(BankError::AccountNotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(accounts)
}

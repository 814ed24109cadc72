//! Synchronous processing strategy
//!
//! Streams rows one at a time through [`SyncReader`] and applies each
//! operation before reading the next, so memory use does not grow with the
//! file.

use super::touched_accounts;
use crate::core::{Storage, TransactionEngine};
use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::ProcessingStrategy;
use crate::types::BankError;
use log::{info, warn};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Synchronous processing strategy
///
/// ```no_run
/// use banking_engine::core::{EngineConfig, TransactionEngine};
/// use banking_engine::store::SqliteStorage;
/// use banking_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let storage = Arc::new(SqliteStorage::open(Path::new("bank.db")).unwrap());
/// let engine = Arc::new(TransactionEngine::new(storage, EngineConfig::default()));
/// let strategy = SyncProcessingStrategy::new(engine);
///
/// strategy
///     .process(Path::new("operations.csv"), &mut std::io::stdout())
///     .expect("Processing failed");
/// ```
pub struct SyncProcessingStrategy<S: Storage> {
    engine: Arc<TransactionEngine<S>>,
}

impl<S: Storage> SyncProcessingStrategy<S> {
    pub fn new(engine: Arc<TransactionEngine<S>>) -> Self {
        Self { engine }
    }
}

impl<S: Storage> ProcessingStrategy for SyncProcessingStrategy<S> {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), BankError> {
        let reader = SyncReader::new(input_path, self.engine.currency())?;

        let mut touched = BTreeSet::new();
        let mut applied = 0usize;
        let mut rejected = 0usize;

        for result in reader {
            match result {
                Ok(operation) => {
                    touched.extend(operation.accounts());
                    match self.engine.execute(&operation) {
                        Ok(_) => applied += 1,
                        Err(e) => {
                            rejected += 1;
                            warn!("{} rejected: {}", operation.name(), e);
                        }
                    }
                }
                Err(e) => {
                    rejected += 1;
                    warn!("Skipping record: {}", e);
                }
            }
        }

        info!("Applied {} operations, rejected {}", applied, rejected);
        let accounts = touched_accounts(&self.engine, touched)?;
        write_accounts_csv(&accounts, output)
    }
}

//! Asynchronous batch processing strategy
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (account partitioning + blocking pool)
//!         └── Arc<TransactionEngine<S>>
//! ```
//!
//! Batches are processed one after another so an account's operations keep
//! their file order across batch boundaries. Within a batch, partitions of
//! unrelated accounts run in parallel.

use super::touched_accounts;
use crate::core::{BatchProcessor, Storage, TransactionEngine};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_accounts_csv;
use crate::strategy::ProcessingStrategy;
use crate::types::BankError;
use log::{info, warn};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of operations per batch
    pub batch_size: usize,

    /// Maximum number of partitions applied concurrently
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                "Invalid batch_size ({}), using default ({})",
                batch_size, default.batch_size
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                "Invalid max_concurrent_batches ({}), using default ({})",
                max_concurrent_batches, default.max_concurrent_batches
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
pub struct AsyncProcessingStrategy<S: Storage> {
    engine: Arc<TransactionEngine<S>>,
    config: BatchConfig,
}

impl<S: Storage + 'static> AsyncProcessingStrategy<S> {
    /// Create a new AsyncProcessingStrategy
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine shared by all partitions
    /// * `config` - BatchConfig with batch_size and max_concurrent_batches
    pub fn new(engine: Arc<TransactionEngine<S>>, config: BatchConfig) -> Self {
        Self { engine, config }
    }
}

impl<S: Storage + 'static> ProcessingStrategy for AsyncProcessingStrategy<S> {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), BankError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .max_blocking_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| BankError::Io {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        let touched = runtime.block_on(async {
            let processor = BatchProcessor::new(Arc::clone(&self.engine));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| BankError::Io {
                    message: format!("Failed to open file '{}': {}", input_path.display(), e),
                })?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file, self.engine.currency());

            let mut touched = BTreeSet::new();
            let mut applied = 0usize;
            let mut rejected = 0usize;

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                for result in processor.process_batch(batch).await {
                    touched.extend(result.operation.accounts());
                    if result.result.is_ok() {
                        applied += 1;
                    } else {
                        rejected += 1;
                    }
                }
            }

            info!("Applied {} operations, rejected {}", applied, rejected);
            Ok::<_, BankError>(touched)
        })?;

        let accounts = touched_accounts(&self.engine, touched)?;
        write_accounts_csv(&accounts, output)
    }
}

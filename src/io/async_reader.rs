//! Asynchronous CSV reader with batch interface
//!
//! ```text
//! CSV file → AsyncReader → Vec<Operation> batches
//!                 ↓
//!          csv_format module
//!   (OperationRecord, convert_operation_record)
//! ```
//!
//! Rows that fail to parse are logged and skipped; a batch is only short at
//! the end of the input.

use crate::io::csv_format::{convert_operation_record, OperationRecord};
use crate::types::{Currency, Operation};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use log::warn;

/// Asynchronous CSV reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    currency: Currency,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    ///
    /// # Arguments
    ///
    /// * `reader` - Async reader providing CSV data
    /// * `currency` - Currency of rows that leave the currency column empty
    pub fn new(reader: R, currency: Currency) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            currency,
        }
    }

    /// Read up to `batch_size` operations
    ///
    /// # Returns
    ///
    /// The successfully converted operations, in input order. An empty
    /// vector means the end of the input was reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Operation> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<OperationRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(record)) => match convert_operation_record(record, self.currency) {
                    Ok(operation) => batch.push(operation),
                    Err(e) => warn!("Skipping record: {}", e),
                },
                Some(Err(e)) => warn!("CSV parse error: {}", e),
                None => break,
            }
        }

        batch
    }
}

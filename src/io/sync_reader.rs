//! Synchronous CSV reader with iterator interface
//!
//! Streams batch operations from a CSV file one row at a time, delegating
//! format concerns to the csv_format module.
//!
//! ```no_run
//! use banking_engine::io::sync_reader::SyncReader;
//! use banking_engine::types::Currency;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("operations.csv"), Currency::Usd).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(operation) => println!("Read {:?}", operation),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! Fatal errors (file not found) are returned from `new()`; bad rows are
//! yielded as `Err` items carrying their line number.

use crate::io::csv_format::{convert_operation_record, OperationRecord};
use crate::types::{BankError, Currency, Operation};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Synchronous CSV reader
#[derive(Debug)]
pub struct SyncReader<R: Read = File> {
    reader: csv::Reader<R>,
    currency: Currency,
    line_num: u64,
}

impl SyncReader<File> {
    /// Open a CSV file for streaming iteration
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the CSV file
    /// * `currency` - Currency of rows that leave the currency column empty
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReader)` if the file opened successfully
    /// * `Err(BankError::Io)` if it could not be opened
    pub fn new(path: &Path, currency: Currency) -> Result<Self, BankError> {
        let file = File::open(path).map_err(|e| BankError::Io {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        })?;
        Ok(Self::from_reader(file, currency))
    }
}

impl<R: Read> SyncReader<R> {
    /// Wrap any reader; trims fields, allows missing trailing columns and
    /// uses an 8KB buffer
    pub fn from_reader(reader: R, currency: Currency) -> Self {
        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(reader);

        Self {
            reader,
            currency,
            line_num: 1,
        }
    }
}

impl<R: Read> Iterator for SyncReader<R> {
    type Item = Result<Operation, BankError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<OperationRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;

        let line = self.line_num;
        Some(
            row.map_err(BankError::from)
                .and_then(|record| convert_operation_record(record, self.currency))
                .map_err(|e| match e {
                    BankError::Parse { message, .. } => BankError::Parse {
                        line: Some(line),
                        message,
                    },
                    other => other,
                }),
        )
    }
}

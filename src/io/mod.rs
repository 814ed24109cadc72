//! I/O module
//!
//! Reads operation files and writes account and log listings, all as CSV.
//!
//! - `csv_format`: row layout of operation files, conversion into
//!   [`Operation`](crate::types::Operation), account and log writers
//! - `sync_reader`: operations one row at a time through an iterator
//! - `async_reader`: operations in batches from any tokio reader

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_operation_record, write_accounts_csv, write_transactions_csv, OperationRecord,
};
pub use sync_reader::SyncReader;

//! Storage adapters
//!
//! - `memory` - Mutex-guarded in-process state, used by tests and dry runs
//! - `sqlite` - SQLite database with one table per account variant

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

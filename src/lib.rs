//! Library catalog and rental ledger on an embedded SQLite store.
//!
//! # Intention
//!
//! - Keep the catalog (genres, authors, books, instances) and the rental
//!   ledger (readers, rentals) in one SQLite database.
//! - Make the return of a book a single all-or-nothing unit of work that
//!   also keeps the reader's status in step with their open rentals.
//!
//! # Architectural Boundaries
//!
//! - [`sqlite`] owns the connection, schema rendering and transactions.
//! - [`catalog`] and [`ledger`] are the only modules that write.
//! - [`reports`] is read-only.
//! - Configuration and logging setup live at the edge ([`settings`],
//!   [`telemetry`]) and are used by the binary only.

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod model;
pub mod reports;
pub mod schema;
pub mod settings;
pub mod sqlite;
pub mod telemetry;

pub use error::{CheckoutError, ReturnError, StorageError};
pub use ledger::{check_out, return_book, ReturnReceipt};
pub use sqlite::{Store, StoreConfig};

use std::path::Path;

/// Open (creating if needed) a file-backed library store with the full schema.
pub fn open_store(path: impl AsRef<Path>) -> Result<Store, StorageError> {
    Store::open(&StoreConfig::new(path.as_ref(), schema::library_schema()))
}

/// Open an in-memory library store with the full schema and no data.
pub fn open_memory() -> Result<Store, StorageError> {
    Store::open(&StoreConfig::in_memory(schema::library_schema()))
}

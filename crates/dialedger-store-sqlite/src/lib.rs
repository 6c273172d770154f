//! SQLite backend for the dialedger record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod search;
mod store;

pub mod error;
pub mod schema;

pub use error::{Error, Result};
pub use schema::{MigrationOutcome, MigrationReport, MigrationStep};
pub use store::SqliteStore;

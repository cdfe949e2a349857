//! Table-scoped persistence for synced items.
//!
//! Rows are keyed by item id. A sync pass only ever inserts new rows or
//! rewrites the score of existing ones, so re-running a pass is harmless.

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{SqliteSyncStore, SyncStore};
pub use error::StoreError;
pub use types::{SyncRow, UpsertOutcome};

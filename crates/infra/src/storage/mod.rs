//! File-backed batch source and reconciliation ledgers

pub mod json_source;
pub mod ledger;

pub use json_source::JsonFileBatchSource;
pub use ledger::{InMemoryLedger, JsonlLedger, LedgerEntry};

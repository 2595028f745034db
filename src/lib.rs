//! # Record Heap Database
//!
//! A minimal record-oriented storage engine: one flat file of fixed-width,
//! comma-delimited records plus in-memory secondary indices mapping every
//! field value to the byte offsets of the records that hold it.
//!
//! ## Core idea
//! Every line in the heap has the same length. That makes an offset a stable
//! record address: updates overwrite in place, deletes overwrite the primary
//! key with a tombstone marker, and freed slots are handed back out to later
//! inserts without shifting any other record.

pub mod codec;
pub mod compaction;
pub mod db;
pub mod error;
pub mod free_list;
pub mod heap;
pub mod index;
pub mod types;

// Public re-exports for the top-level API
pub use compaction::CompactionStats;
pub use db::{Database, DeleteReport, IndexPaths, Options, Slot, Stats};
pub use error::{Error, Result};
pub use heap::SyncPolicy;
pub use types::{Field, FieldWidths, Offset, Record};

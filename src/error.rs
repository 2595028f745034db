use std::io;

use thiserror::Error;

use crate::types::{Field, Offset};

/// Unified error type for the record heap engine.
///
/// Every variant is returned to the caller; the engine never logs and drops a
/// failure. Nothing here is worth retrying without first changing file state.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from heap, index or free-slot files.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A persisted file does not have the expected layout.
    #[error("Corruption: {0}")]
    Corruption(String),

    /// Insert with a primary key that is already live.
    #[error("duplicate primary key {0:?}")]
    DuplicateKey(String),

    /// Update target is not in the primary key index.
    #[error("no record with primary key {0:?}")]
    RecordNotFound(String),

    /// The slot at this offset is already a tombstone.
    #[error("record at offset {0} is already deleted")]
    RecordGone(Offset),

    /// The field name does not name one of the indexed fields.
    #[error("no index for field {0:?}")]
    IndexNotFound(String),

    /// An offset is missing from a bucket it must be in. Heap and index
    /// state have diverged; `Database::rebuild_indices` repairs this.
    #[error("index {field} is missing offset {offset} under value {value:?}")]
    IndexInconsistency {
        field: Field,
        value: String,
        offset: Offset,
    },

    /// Offset does not address a whole slot inside the heap.
    #[error("offset {offset} is out of range (heap is {heap_len} bytes)")]
    OffsetOutOfRange { offset: Offset, heap_len: u64 },

    /// Value does not fit in the field's fixed width.
    #[error("{field} value is {len} bytes, width is {width}")]
    FieldTooWide {
        field: Field,
        width: usize,
        len: usize,
    },

    /// Value would break the line or index file layout.
    #[error("invalid {field} value: {reason}")]
    InvalidFieldValue { field: Field, reason: &'static str },

    /// `Options` that cannot describe a usable heap.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Data operation on an engine with no heap bound.
    #[error("no database is open")]
    NoDatabaseOpen,
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

pub mod record_heap;

pub use record_heap::RecordHeap;

/// Controls when heap writes are fsync'd to disk.
///
/// Every heap write reaches the OS page cache before it returns. This policy
/// only decides when the page cache is forced to the physical disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Never fsync implicitly. Callers use `RecordHeap::sync` when they need it.
    #[default]
    Never,
    /// fsync after every append, overwrite and tombstone.
    EveryWrite,
    /// fsync every N writes.
    EveryNWrites(usize),
}

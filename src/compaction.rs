use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::codec::{HEADER, RecordCodec};
use crate::error::Result;
use crate::heap::RecordHeap;

/// Outcome of a heap compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Slots carried over to the new heap.
    pub live_records: u64,
    /// Tombstoned slots dropped.
    pub reclaimed_slots: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Sibling path the compacted heap is written to before it replaces the original.
pub fn staging_path(heap_path: &Path) -> PathBuf {
    let mut name = heap_path.file_name().unwrap_or_default().to_os_string();
    name.push(".compact");
    heap_path.with_file_name(name)
}

/// Copy the header and every live slot of `heap` into a fresh file at `dest`.
///
/// The new file is fsync'd before returning. Slots keep their relative order,
/// so surviving records land at densely packed offsets. Swapping the file in
/// and reindexing is left to the caller.
pub fn write_live_copy(heap: &RecordHeap, codec: &RecordCodec, dest: &Path) -> Result<CompactionStats> {
    let mut writer = BufWriter::new(File::create(dest)?);
    writer.write_all(HEADER.as_bytes())?;

    let mut live_records = 0u64;
    let mut reclaimed_slots = 0u64;
    for (_, line) in heap.slots()? {
        if codec.is_tombstone(&line) {
            reclaimed_slots += 1;
            continue;
        }
        writer.write_all(&line)?;
        live_records += 1;
    }

    writer.flush()?;
    writer.get_ref().sync_all()?;

    Ok(CompactionStats {
        live_records,
        reclaimed_slots,
        bytes_before: heap.len(),
        bytes_after: HEADER.len() as u64 + live_records * codec.line_len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_path_is_a_sibling() {
        let p = staging_path(Path::new("/data/database.csv"));
        assert_eq!(p, Path::new("/data/database.csv.compact"));
    }
}

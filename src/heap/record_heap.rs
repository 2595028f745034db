use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::HEADER;
use crate::error::{Error, Result};
use crate::heap::SyncPolicy;
use crate::types::Offset;

/// The data file: a header line followed by fixed-length slots.
///
/// ```text
/// ┌──────────────────────────────────────┐ 0
/// │ SN,Name,Date,Compliance Index,Sold\n │
/// ├──────────────────────────────────────┤ data_start
/// │ slot 0 (L bytes, live or tombstone)  │
/// ├──────────────────────────────────────┤ data_start + L
/// │ slot 1                               │
/// │ ...                                  │
/// └──────────────────────────────────────┘ len
/// ```
///
/// Every write covers exactly one slot. No write ever shifts another slot,
/// so an offset stays valid for the life of the file (until compaction).
/// Writes go straight to the file without a userspace buffer.
pub struct RecordHeap {
    file: File,
    path: PathBuf,
    /// Current file length in bytes.
    len: u64,
    line_len: usize,
    sync_policy: SyncPolicy,
    writes_since_sync: usize,
}

impl RecordHeap {
    /// Create a new heap file holding only the header. Fails if `path` exists.
    pub fn create(path: &Path, line_len: usize, sync_policy: SyncPolicy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(HEADER.as_bytes())?;
        file.sync_all()?;

        Ok(RecordHeap {
            file,
            path: path.to_path_buf(),
            len: HEADER.len() as u64,
            line_len,
            sync_policy,
            writes_since_sync: 0,
        })
    }

    /// Open an existing heap, or create it if the file is missing.
    ///
    /// Validates the header and that the data region is a whole number of
    /// `line_len` slots.
    pub fn open(path: &Path, line_len: usize, sync_policy: SyncPolicy) -> Result<Self> {
        if !path.exists() {
            return Self::create(path, line_len, sync_policy);
        }

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();

        let mut header = vec![0u8; HEADER.len()];
        if len < header.len() as u64 {
            return Err(Error::Corruption(format!(
                "{}: file too short to contain header",
                path.display()
            )));
        }
        file.read_exact(&mut header)?;
        if header != HEADER.as_bytes() {
            return Err(Error::Corruption(format!(
                "{}: unexpected header",
                path.display()
            )));
        }

        let data_len = len - HEADER.len() as u64;
        if data_len % line_len as u64 != 0 {
            return Err(Error::Corruption(format!(
                "{}: data region of {data_len} bytes is not a multiple of line length {line_len}",
                path.display()
            )));
        }

        Ok(RecordHeap {
            file,
            path: path.to_path_buf(),
            len,
            line_len,
            sync_policy,
            writes_since_sync: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the first slot.
    pub fn data_start(&self) -> Offset {
        HEADER.len() as Offset
    }

    /// File length in bytes, header included.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True when the heap holds no slots.
    pub fn is_empty(&self) -> bool {
        self.len == self.data_start()
    }

    pub fn line_len(&self) -> usize {
        self.line_len
    }

    /// Number of slots, live and tombstoned.
    pub fn slot_count(&self) -> u64 {
        (self.len - self.data_start()) / self.line_len as u64
    }

    /// Write `line` at end of file and return its offset.
    pub fn append(&mut self, line: &[u8]) -> Result<Offset> {
        self.check_line(line)?;
        let offset = self.len;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(line)?;
        self.len += line.len() as u64;
        self.after_write()?;
        Ok(offset)
    }

    /// Overwrite the slot at `offset`. `line` must be exactly one slot long;
    /// anything else is refused before a byte is written.
    pub fn write_at(&mut self, offset: Offset, line: &[u8]) -> Result<()> {
        self.check_line(line)?;
        self.check_slot(offset)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(line)?;
        self.after_write()
    }

    /// Read the slot at `offset`.
    pub fn read_at(&self, offset: Offset) -> Result<Vec<u8>> {
        self.check_slot(offset)?;
        let mut buf = vec![0u8; self.line_len];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Overwrite the leading primary key columns of a slot with `marker`,
    /// leaving the rest of the line untouched.
    pub fn tombstone(&mut self, offset: Offset, marker: &[u8]) -> Result<()> {
        self.check_slot(offset)?;
        if marker.len() >= self.line_len {
            return Err(Error::Corruption(format!(
                "tombstone marker of {} bytes does not fit a {}-byte line",
                marker.len(),
                self.line_len
            )));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(marker)?;
        self.after_write()
    }

    /// Every slot in file order.
    pub fn slots(&self) -> Result<Vec<(Offset, Vec<u8>)>> {
        let start = self.data_start();
        let mut data = Vec::with_capacity((self.len - start) as usize);
        let mut file = &self.file;
        file.seek(SeekFrom::Start(start))?;
        file.take(self.len - start).read_to_end(&mut data)?;

        if data.len() as u64 != self.len - start {
            return Err(Error::Corruption(format!(
                "{}: file shrank while reading",
                self.path.display()
            )));
        }

        Ok(data
            .chunks_exact(self.line_len)
            .enumerate()
            .map(|(i, line)| (start + (i * self.line_len) as Offset, line.to_vec()))
            .collect())
    }

    /// Force every write so far to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        self.writes_since_sync = 0;
        Ok(())
    }

    /// Writes since the last fsync.
    pub fn writes_since_sync(&self) -> usize {
        self.writes_since_sync
    }

    fn after_write(&mut self) -> Result<()> {
        self.writes_since_sync += 1;
        match self.sync_policy {
            SyncPolicy::Never => {}
            SyncPolicy::EveryWrite => self.sync()?,
            SyncPolicy::EveryNWrites(n) => {
                if self.writes_since_sync >= n {
                    self.sync()?;
                }
            }
        }
        Ok(())
    }

    fn check_line(&self, line: &[u8]) -> Result<()> {
        if line.len() != self.line_len {
            return Err(Error::Corruption(format!(
                "refusing to write {}-byte line into {}-byte slot",
                line.len(),
                self.line_len
            )));
        }
        Ok(())
    }

    fn check_slot(&self, offset: Offset) -> Result<()> {
        let start = self.data_start();
        let aligned = offset >= start && (offset - start) % self.line_len as u64 == 0;
        let past_end = offset
            .checked_add(self.line_len as u64)
            .is_none_or(|end| end > self.len);
        if !aligned || past_end {
            return Err(Error::OffsetOutOfRange {
                offset,
                heap_len: self.len,
            });
        }
        Ok(())
    }
}

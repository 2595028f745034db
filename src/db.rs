use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::RecordCodec;
use crate::compaction::{self, CompactionStats};
use crate::error::{Error, Result};
use crate::free_list::FreeList;
use crate::heap::{RecordHeap, SyncPolicy};
use crate::index::IndexStore;
use crate::types::{Field, FieldWidths, Offset, Record};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Byte width of each column. Must match the widths the heap was
    /// written with.
    pub widths: FieldWidths,
    /// When heap writes are fsync'd.
    pub sync_policy: SyncPolicy,
    /// Byte repeated across the SN columns of a deleted slot.
    pub tombstone_byte: u8,
}

impl Options {
    /// Reject settings that would make tombstones unreadable or undetectable.
    pub fn validate(&self) -> Result<()> {
        if self.widths.sn == 0 {
            return Err(Error::InvalidOptions(
                "SN width must be at least one byte".into(),
            ));
        }
        let b = self.tombstone_byte;
        if !b.is_ascii_graphic() || b == b',' {
            return Err(Error::InvalidOptions(format!(
                "tombstone byte {b:#04x} must be printable ASCII other than ','"
            )));
        }
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            widths: FieldWidths::default(),
            sync_policy: SyncPolicy::Never,
            tombstone_byte: b'-',
        }
    }
}

/// Where each field index and the free-slot list are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub sn: PathBuf,
    pub name: PathBuf,
    pub date: PathBuf,
    pub compliance_index: PathBuf,
    pub sold: PathBuf,
    pub free_slots: PathBuf,
}

impl IndexPaths {
    /// The conventional file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        IndexPaths {
            sn: dir.join("index_sn.csv"),
            name: dir.join("index_name.csv"),
            date: dir.join("index_date.csv"),
            compliance_index: dir.join("index_compliance_index.csv"),
            sold: dir.join("index_sold.csv"),
            free_slots: dir.join("removed.txt"),
        }
    }

    pub fn field(&self, field: Field) -> &Path {
        match field {
            Field::Sn => &self.sn,
            Field::Name => &self.name,
            Field::Date => &self.date,
            Field::ComplianceIndex => &self.compliance_index,
            Field::Sold => &self.sold,
        }
    }
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub live_records: u64,
    pub free_slots: u64,
    /// Slots in the heap, live and tombstoned.
    pub total_slots: u64,
    pub heap_bytes: u64,
    pub record_len: usize,
}

/// A heap slot as returned by `load_all_including_tombstones`.
///
/// For a tombstone, `record.sn` holds the marker and the other fields keep
/// whatever the slot held when it was deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub offset: Offset,
    pub record: Record,
    pub live: bool,
}

/// Result of `Database::delete`.
///
/// A slot that cannot be deleted does not stop the remaining ones; its error
/// is collected in `skipped`.
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// Offsets tombstoned and pushed onto the free-slot list, ascending.
    pub freed: Vec<Offset>,
    pub skipped: Vec<(Offset, Error)>,
}

impl DeleteReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// `Ok(freed)` if nothing was skipped, else the first skipped error.
    pub fn into_result(self) -> Result<Vec<Offset>> {
        match self.skipped.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(self.freed),
        }
    }
}

/// The record heap database.
///
/// Owns the heap file, the five field indices and the free-slot list. Every
/// write keeps the three consistent in memory; indices reach disk only on
/// `save_indices` (or `compact`, which saves as its last step).
///
/// Single owner, synchronous. Embedders sharing one instance across threads
/// must wrap the whole `Database` in a mutex.
pub struct Database {
    options: Options,
    codec: RecordCodec,
    heap: Option<RecordHeap>,
    paths: Option<IndexPaths>,
    indices: IndexStore,
    free: FreeList,
}

impl Database {
    /// Open (or create) the heap at `heap_path` and eagerly load its indices
    /// and free-slot list. Missing index files load as empty.
    pub fn open(heap_path: impl AsRef<Path>, paths: IndexPaths, options: Options) -> Result<Self> {
        let heap_path = heap_path.as_ref();
        options.validate()?;
        let codec = RecordCodec::new(options.widths, options.tombstone_byte);
        let heap = RecordHeap::open(heap_path, codec.line_len(), options.sync_policy)?;

        // Catches widths that divide the file evenly but don't match it.
        if !heap.is_empty() {
            codec.decode(&heap.read_at(heap.data_start())?)?;
        }

        let indices = IndexStore::load(|f| paths.field(f))?;
        let free = FreeList::load(&paths.free_slots)?;

        info!(
            path = %heap_path.display(),
            slots = heap.slot_count(),
            free = free.len(),
            "opened database"
        );

        Ok(Database {
            options,
            codec,
            heap: Some(heap),
            paths: Some(paths),
            indices,
            free,
        })
    }

    /// An engine with no heap bound. Data operations fail with
    /// `NoDatabaseOpen` until `bind_new_database` is called.
    pub fn create_empty(options: Options) -> Result<Self> {
        options.validate()?;
        let codec = RecordCodec::new(options.widths, options.tombstone_byte);
        Ok(Database {
            options,
            codec,
            heap: None,
            paths: None,
            indices: IndexStore::new(),
            free: FreeList::new(),
        })
    }

    /// Create a new, empty heap at `heap_path` and bind it, replacing any
    /// database this engine had open. Fails if `heap_path` already exists.
    /// The empty index set is persisted right away.
    pub fn bind_new_database(&mut self, heap_path: impl AsRef<Path>, paths: IndexPaths) -> Result<()> {
        let heap_path = heap_path.as_ref();
        let heap = RecordHeap::create(heap_path, self.codec.line_len(), self.options.sync_policy)?;

        self.heap = Some(heap);
        self.paths = Some(paths);
        self.indices.clear();
        self.free.clear();
        self.save_indices()?;

        info!(path = %heap_path.display(), "created database");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.heap.is_some()
    }

    pub fn heap_path(&self) -> Option<&Path> {
        self.heap.as_ref().map(RecordHeap::path)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    pub fn indices(&self) -> &IndexStore {
        &self.indices
    }

    pub fn free_list(&self) -> &FreeList {
        &self.free
    }

    fn heap(&self) -> Result<&RecordHeap> {
        self.heap.as_ref().ok_or(Error::NoDatabaseOpen)
    }

    /// Insert a new record and return the offset it was written at.
    ///
    /// Reuses the most recently freed slot when there is one, else appends.
    /// Free-slot entries that no longer address a tombstone (left behind when
    /// a reuse was never saved) are dropped and the next one is tried.
    /// On error nothing else has changed.
    pub fn insert(&mut self, record: &Record) -> Result<Offset> {
        let heap = self.heap.as_mut().ok_or(Error::NoDatabaseOpen)?;
        let line = self.codec.encode(record)?;

        if !self.indices.lookup(Field::Sn, &record.sn).is_empty() {
            return Err(Error::DuplicateKey(record.sn.clone()));
        }

        let mut reused = None;
        while let Some(offset) = self.free.pop() {
            let current = match heap.read_at(offset) {
                Ok(current) => current,
                Err(Error::OffsetOutOfRange { .. }) => {
                    warn!(offset, "dropped free slot outside the heap");
                    continue;
                }
                Err(e) => {
                    self.free.push(offset);
                    return Err(e);
                }
            };
            if !self.codec.is_tombstone(&current) {
                warn!(offset, "dropped free slot that holds a live record");
                continue;
            }
            if let Err(e) = heap.write_at(offset, &line) {
                self.free.push(offset);
                return Err(e);
            }
            debug!(offset, "reused free slot");
            reused = Some(offset);
            break;
        }

        let offset = match reused {
            Some(offset) => offset,
            None => heap.append(&line)?,
        };

        self.indices.add_record(record, offset);
        debug!(sn = %record.sn, offset, "inserted record");
        Ok(offset)
    }

    /// Live records whose `field` equals `value`, in index insertion order.
    pub fn search(&self, field: Field, value: &str) -> Result<Vec<Record>> {
        let heap = self.heap()?;
        let mut results = Vec::new();
        for &offset in self.indices.lookup(field, value) {
            let line = heap.read_at(offset)?;
            if self.codec.is_tombstone(&line) {
                continue;
            }
            results.push(self.codec.decode(&line)?);
        }
        Ok(results)
    }

    /// Point lookup on the primary key.
    pub fn get(&self, sn: &str) -> Result<Option<Record>> {
        Ok(self.search(Field::Sn, sn)?.into_iter().next())
    }

    /// Overwrite the record with primary key `record.sn` in place.
    ///
    /// Only fields whose value changed are reindexed. The heap is untouched
    /// unless every old value is found in its index.
    pub fn update(&mut self, record: &Record) -> Result<()> {
        let heap = self.heap.as_mut().ok_or(Error::NoDatabaseOpen)?;
        let line = self.codec.encode(record)?;

        let offset = *self
            .indices
            .lookup(Field::Sn, &record.sn)
            .first()
            .ok_or_else(|| Error::RecordNotFound(record.sn.clone()))?;

        let current = heap.read_at(offset)?;
        if self.codec.is_tombstone(&current) {
            return Err(Error::RecordGone(offset));
        }
        let old = self.codec.decode(&current)?;

        let changed: Vec<Field> = Field::ALL
            .into_iter()
            .filter(|f| old.get(*f) != record.get(*f))
            .collect();
        for &field in &changed {
            if !self.indices.contains(field, old.get(field), offset) {
                return Err(Error::IndexInconsistency {
                    field,
                    value: old.get(field).to_string(),
                    offset,
                });
            }
        }

        heap.write_at(offset, &line)?;

        for field in changed {
            self.indices.remove(field, old.get(field), offset)?;
            self.indices.add(field, record.get(field), offset);
        }
        debug!(sn = %record.sn, offset, "updated record");
        Ok(())
    }

    /// Tombstone every live record whose `field` equals `value`.
    ///
    /// Slots are processed in ascending offset order. Each freed slot is
    /// removed from all five indices and pushed onto the free-slot list. A
    /// slot that fails (already tombstoned, inconsistent index, IO) is
    /// reported in `DeleteReport::skipped` and the rest still proceed.
    pub fn delete(&mut self, field: Field, value: &str) -> Result<DeleteReport> {
        let heap = self.heap.as_mut().ok_or(Error::NoDatabaseOpen)?;

        let mut offsets = self.indices.lookup(field, value).to_vec();
        offsets.sort_unstable();
        offsets.dedup();

        let mut report = DeleteReport::default();
        for offset in offsets {
            match delete_slot(heap, &self.codec, &mut self.indices, offset) {
                Ok(()) => {
                    self.free.push(offset);
                    report.freed.push(offset);
                }
                Err(e) => {
                    warn!(%field, value, offset, error = %e, "skipped slot during delete");
                    report.skipped.push((offset, e));
                }
            }
        }

        debug!(%field, value, freed = report.freed.len(), "deleted records");
        Ok(report)
    }

    /// Persist every field index and the free-slot list.
    pub fn save_indices(&self) -> Result<()> {
        let paths = self.paths.as_ref().ok_or(Error::NoDatabaseOpen)?;
        self.indices.save(|f| paths.field(f))?;
        self.free.save(&paths.free_slots)?;
        info!(free = self.free.len(), "saved indices");
        Ok(())
    }

    /// Every live record in heap order.
    pub fn load_all_live(&self) -> Result<Vec<Record>> {
        let heap = self.heap()?;
        heap.slots()?
            .into_iter()
            .filter(|(_, line)| !self.codec.is_tombstone(line))
            .map(|(_, line)| self.codec.decode(&line))
            .collect()
    }

    /// Every slot in heap order, tombstones included.
    pub fn load_all_including_tombstones(&self) -> Result<Vec<Slot>> {
        let heap = self.heap()?;
        heap.slots()?
            .into_iter()
            .map(|(offset, line)| {
                Ok(Slot {
                    offset,
                    live: !self.codec.is_tombstone(&line),
                    record: self.codec.decode(&line)?,
                })
            })
            .collect()
    }

    /// Regenerate all indices and the free-slot list from heap content.
    ///
    /// Tombstoned slots are pushed in ascending order, so the highest one is
    /// reused first. Fails with `Corruption` if two live slots share a
    /// primary key.
    pub fn rebuild_indices(&mut self) -> Result<()> {
        let heap = self.heap.as_ref().ok_or(Error::NoDatabaseOpen)?;

        let mut indices = IndexStore::new();
        let mut free = FreeList::new();
        for (offset, line) in heap.slots()? {
            if self.codec.is_tombstone(&line) {
                free.push(offset);
                continue;
            }
            let record = self.codec.decode(&line)?;
            if let Some(first) = indices.lookup(Field::Sn, &record.sn).first() {
                return Err(Error::Corruption(format!(
                    "primary key {:?} is live at offsets {first} and {offset}",
                    record.sn
                )));
            }
            indices.add_record(&record, offset);
        }

        self.indices = indices;
        self.free = free;
        info!(
            live = self.indices.field(Field::Sn).len(),
            free = self.free.len(),
            "rebuilt indices from heap"
        );
        Ok(())
    }

    /// Rewrite the heap without tombstones, reindex and persist the indices.
    ///
    /// Offsets of surviving records change. The free-slot list ends empty.
    pub fn compact(&mut self) -> Result<CompactionStats> {
        let heap = self.heap.as_ref().ok_or(Error::NoDatabaseOpen)?;
        let heap_path = heap.path().to_path_buf();
        let staging = compaction::staging_path(&heap_path);

        let stats = compaction::write_live_copy(heap, &self.codec, &staging)?;

        // Release the old handle before the rename replaces the file.
        self.heap = None;
        let renamed = fs::rename(&staging, &heap_path);
        if renamed.is_ok() {
            // Offsets held in memory describe the old layout from here on.
            self.indices.clear();
            self.free.clear();
        }
        self.heap = Some(RecordHeap::open(
            &heap_path,
            self.codec.line_len(),
            self.options.sync_policy,
        )?);
        renamed?;

        // On failure the indices stay empty rather than pointing into the
        // old layout; `rebuild_indices` can be retried once the heap is fixed.
        self.rebuild_indices()?;
        self.save_indices()?;

        info!(
            path = %heap_path.display(),
            live = stats.live_records,
            reclaimed = stats.reclaimed_slots,
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            "compacted heap"
        );
        Ok(stats)
    }

    /// Force heap writes to disk regardless of `SyncPolicy`.
    pub fn sync(&mut self) -> Result<()> {
        self.heap.as_mut().ok_or(Error::NoDatabaseOpen)?.sync()
    }

    pub fn stats(&self) -> Result<Stats> {
        let heap = self.heap()?;
        Ok(Stats {
            live_records: self.indices.field(Field::Sn).len() as u64,
            free_slots: self.free.len() as u64,
            total_slots: heap.slot_count(),
            heap_bytes: heap.len(),
            record_len: heap.line_len(),
        })
    }
}

/// Tombstone one slot and drop it from every index. Index membership is
/// checked before the heap is touched, so a failure leaves the slot as it was.
fn delete_slot(
    heap: &mut RecordHeap,
    codec: &RecordCodec,
    indices: &mut IndexStore,
    offset: Offset,
) -> Result<()> {
    let line = heap.read_at(offset)?;
    if codec.is_tombstone(&line) {
        return Err(Error::RecordGone(offset));
    }
    let old = codec.decode(&line)?;

    if let Some(field) = Field::ALL
        .into_iter()
        .find(|f| !indices.contains(*f, old.get(*f), offset))
    {
        return Err(Error::IndexInconsistency {
            field,
            value: old.get(field).to_string(),
            offset,
        });
    }

    heap.tombstone(offset, codec.marker())?;
    for field in Field::ALL {
        indices.remove(field, old.get(field), offset)?;
    }
    Ok(())
}

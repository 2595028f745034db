pub mod field_index;

pub use field_index::FieldIndex;

use std::path::Path;

use crate::error::Result;
use crate::types::{Field, Offset, Record};

/// One `FieldIndex` per schema field, addressed by `Field`.
///
/// The store never reads the heap. Keeping it in step with heap content is
/// the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStore {
    indices: [FieldIndex; 5],
}

impl IndexStore {
    pub fn new() -> Self {
        IndexStore {
            indices: Field::ALL.map(FieldIndex::new),
        }
    }

    pub fn field(&self, field: Field) -> &FieldIndex {
        &self.indices[field.position()]
    }

    fn field_mut(&mut self, field: Field) -> &mut FieldIndex {
        &mut self.indices[field.position()]
    }

    pub fn lookup(&self, field: Field, value: &str) -> &[Offset] {
        self.field(field).lookup(value)
    }

    pub fn contains(&self, field: Field, value: &str, offset: Offset) -> bool {
        self.field(field).contains(value, offset)
    }

    pub fn add(&mut self, field: Field, value: &str, offset: Offset) {
        self.field_mut(field).add(value, offset);
    }

    pub fn remove(&mut self, field: Field, value: &str, offset: Offset) -> Result<()> {
        self.field_mut(field).remove(value, offset)
    }

    /// Index every field of `record` at `offset`.
    pub fn add_record(&mut self, record: &Record, offset: Offset) {
        for field in Field::ALL {
            self.add(field, record.get(field), offset);
        }
    }

    pub fn clear(&mut self) {
        for index in &mut self.indices {
            index.clear();
        }
    }

    /// Load every field index. `path_for` maps a field to its file.
    pub fn load<'a>(path_for: impl Fn(Field) -> &'a Path) -> Result<Self> {
        let mut store = IndexStore::new();
        for field in Field::ALL {
            store.indices[field.position()] = FieldIndex::load(field, path_for(field))?;
        }
        Ok(store)
    }

    pub fn save<'a>(&self, path_for: impl Fn(Field) -> &'a Path) -> Result<()> {
        for index in &self.indices {
            index.save(path_for(index.field()))?;
        }
        Ok(())
    }
}

impl Default for IndexStore {
    fn default() -> Self {
        Self::new()
    }
}

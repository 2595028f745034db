use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Field, Offset};

/// Value → offsets mapping for a single field.
///
/// Offsets under a value keep insertion order. A value with no offsets is
/// never stored: removing the last offset drops the key.
///
/// Persisted as one line per distinct value:
/// ```text
/// value,offset1,offset2,...
/// ```
/// Keys are written in sorted order so saved files are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIndex {
    field: Field,
    buckets: BTreeMap<String, Vec<Offset>>,
}

impl FieldIndex {
    pub fn new(field: Field) -> Self {
        FieldIndex {
            field,
            buckets: BTreeMap::new(),
        }
    }

    pub fn field(&self) -> Field {
        self.field
    }

    /// Offsets stored under `value`, empty if none.
    pub fn lookup(&self, value: &str) -> &[Offset] {
        self.buckets.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, value: &str, offset: Offset) -> bool {
        self.lookup(value).contains(&offset)
    }

    pub fn add(&mut self, value: &str, offset: Offset) {
        self.buckets.entry(value.to_string()).or_default().push(offset);
    }

    /// Remove `offset` from `value`'s bucket, dropping the bucket once empty.
    pub fn remove(&mut self, value: &str, offset: Offset) -> Result<()> {
        let inconsistency = || Error::IndexInconsistency {
            field: self.field,
            value: value.to_string(),
            offset,
        };

        let bucket = self.buckets.get_mut(value).ok_or_else(inconsistency)?;
        let pos = bucket
            .iter()
            .position(|o| *o == offset)
            .ok_or_else(inconsistency)?;
        bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(value);
        }
        Ok(())
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Offset])> {
        self.buckets.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Load from `path`. A missing file is an empty index.
    pub fn load(field: Field, path: &Path) -> Result<Self> {
        let mut index = FieldIndex::new(field);
        if !path.exists() {
            return Ok(index);
        }

        let text = fs::read_to_string(path)?;
        for (lineno, line) in text.lines().enumerate() {
            let mut parts = line.split(',');
            let value = parts.next().unwrap_or_default();
            let offsets = parts
                .map(|p| p.trim().parse::<Offset>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    Error::Corruption(format!(
                        "{}:{}: bad offset: {e}",
                        path.display(),
                        lineno + 1
                    ))
                })?;
            // A value with no offsets carries nothing worth keeping.
            if !offsets.is_empty() {
                index.buckets.entry(value.to_string()).or_default().extend(offsets);
            }
        }
        Ok(index)
    }

    /// Write the whole index to `path`, replacing its contents.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for (value, offsets) in &self.buckets {
            writer.write_all(value.as_bytes())?;
            for offset in offsets {
                write!(writer, ",{offset}")?;
            }
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Offset;

/// Offsets of tombstoned heap slots waiting for reuse.
///
/// LIFO: the most recently freed slot is handed out first. Persisted as one
/// decimal offset per line in push order, so a reload pops in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeList {
    slots: Vec<Offset>,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, offset: Offset) {
        self.slots.push(offset);
    }

    pub fn pop(&mut self) -> Option<Offset> {
        self.slots.pop()
    }

    /// The offset the next `pop` would return.
    pub fn peek(&self) -> Option<Offset> {
        self.slots.last().copied()
    }

    pub fn contains(&self, offset: Offset) -> bool {
        self.slots.contains(&offset)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Offsets in push order.
    pub fn as_slice(&self) -> &[Offset] {
        &self.slots
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Load from `path`. A missing file is an empty list; blank lines are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let text = fs::read_to_string(path)?;
        let mut slots = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let offset = line.parse::<Offset>().map_err(|e| {
                Error::Corruption(format!("{}:{}: bad offset: {e}", path.display(), lineno + 1))
            })?;
            slots.push(offset);
        }
        Ok(FreeList { slots })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for offset in &self.slots {
            writeln!(writer, "{offset}")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

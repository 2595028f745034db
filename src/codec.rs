use crate::error::{Error, Result};
use crate::types::{Field, FieldWidths, Record};

const SEPARATOR: u8 = b',';
const TERMINATOR: u8 = b'\n';
const PAD: u8 = b' ';

/// Header line written once at the start of every heap file.
pub const HEADER: &str = "SN,Name,Date,Compliance Index,Sold\n";

/// Encodes records to and from constant-length heap lines.
///
/// Line format (default widths, L = 32):
/// ```text
/// ┌────────┬─┬────────┬─┬────────────┬─┬──────┬─┬────┬──┐
/// │ SN (6) │,│Name (6)│,│ Date (10)  │,│CI (4)│,│S(1)│\n│
/// └────────┴─┴────────┴─┴────────────┴─┴──────┴─┴────┴──┘
/// ```
///
/// Short values are right-padded with spaces. A tombstone is the same line
/// with the SN columns overwritten by the marker, so its length never changes.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    widths: FieldWidths,
    marker: Vec<u8>,
}

impl RecordCodec {
    /// The tombstone marker is `tombstone_byte` repeated to the SN width.
    pub fn new(widths: FieldWidths, tombstone_byte: u8) -> Self {
        RecordCodec {
            widths,
            marker: vec![tombstone_byte; widths.sn],
        }
    }

    pub fn widths(&self) -> &FieldWidths {
        &self.widths
    }

    /// Length in bytes of every encoded line.
    pub fn line_len(&self) -> usize {
        self.widths.line_len()
    }

    /// Marker bytes written over the SN columns of a deleted slot.
    pub fn marker(&self) -> &[u8] {
        &self.marker
    }

    /// Check a single value against its column without encoding anything.
    pub fn validate(&self, field: Field, value: &str) -> Result<()> {
        let width = self.widths.get(field);
        if value.len() > width {
            return Err(Error::FieldTooWide {
                field,
                width,
                len: value.len(),
            });
        }
        if value.bytes().any(|b| b == SEPARATOR || b == b'\r' || b == TERMINATOR) {
            return Err(Error::InvalidFieldValue {
                field,
                reason: "contains a separator or line break",
            });
        }
        if value.ends_with(PAD as char) {
            return Err(Error::InvalidFieldValue {
                field,
                reason: "trailing spaces are indistinguishable from padding",
            });
        }
        if field == Field::Sn && self.padded(value, width) == self.marker {
            return Err(Error::InvalidFieldValue {
                field,
                reason: "equals the tombstone marker",
            });
        }
        Ok(())
    }

    /// Serialize a record to exactly `line_len()` bytes.
    pub fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.line_len());
        for (i, field) in Field::ALL.iter().enumerate() {
            let value = record.get(*field);
            self.validate(*field, value)?;
            if i > 0 {
                buf.push(SEPARATOR);
            }
            buf.extend_from_slice(&self.padded(value, self.widths.get(*field)));
        }
        buf.push(TERMINATOR);
        debug_assert_eq!(buf.len(), self.line_len());
        Ok(buf)
    }

    /// Parse a line by column position. Tombstones decode too; callers check
    /// `is_tombstone` first when they need a live record.
    pub fn decode(&self, line: &[u8]) -> Result<Record> {
        if line.len() != self.line_len() {
            return Err(Error::Corruption(format!(
                "line is {} bytes, expected {}",
                line.len(),
                self.line_len()
            )));
        }
        if line[line.len() - 1] != TERMINATOR {
            return Err(Error::Corruption("line is not newline terminated".into()));
        }

        let mut record = Record::default();
        let mut pos = 0usize;
        for (i, field) in Field::ALL.iter().enumerate() {
            if i > 0 {
                if line[pos] != SEPARATOR {
                    return Err(Error::Corruption(format!(
                        "expected separator before {field} at column {pos}"
                    )));
                }
                pos += 1;
            }
            let width = self.widths.get(*field);
            let column = &line[pos..pos + width];
            let value = std::str::from_utf8(column)
                .map_err(|_| Error::Corruption(format!("{field} column is not UTF-8")))?;
            record.set(*field, value.trim_end_matches(PAD as char).to_string());
            pos += width;
        }
        Ok(record)
    }

    /// True when the SN columns hold the tombstone marker.
    pub fn is_tombstone(&self, line: &[u8]) -> bool {
        line.len() >= self.marker.len() && line[..self.marker.len()] == self.marker[..]
    }

    /// Copy of `line` with the SN columns replaced by the marker.
    pub fn tombstone_line(&self, line: &[u8]) -> Vec<u8> {
        let mut out = line.to_vec();
        let n = self.marker.len().min(out.len());
        out[..n].copy_from_slice(&self.marker[..n]);
        out
    }

    fn padded(&self, value: &str, width: usize) -> Vec<u8> {
        let mut col = Vec::with_capacity(width);
        col.extend_from_slice(value.as_bytes());
        col.resize(width.max(value.len()), PAD);
        col
    }
}

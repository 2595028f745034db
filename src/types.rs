use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Byte position of the first byte of a slot in the heap file.
pub type Offset = u64;

/// The five fields of the fixed schema, in column order.
///
/// Every field is indexed. `Sn` is the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Sn,
    Name,
    Date,
    ComplianceIndex,
    Sold,
}

impl Field {
    /// All fields in column order.
    pub const ALL: [Field; 5] = [
        Field::Sn,
        Field::Name,
        Field::Date,
        Field::ComplianceIndex,
        Field::Sold,
    ];

    /// Column position, also the slot of this field's index.
    pub const fn position(self) -> usize {
        match self {
            Field::Sn => 0,
            Field::Name => 1,
            Field::Date => 2,
            Field::ComplianceIndex => 3,
            Field::Sold => 4,
        }
    }

    /// Name as written in the heap header.
    pub const fn name(self) -> &'static str {
        match self {
            Field::Sn => "SN",
            Field::Name => "Name",
            Field::Date => "Date",
            Field::ComplianceIndex => "Compliance Index",
            Field::Sold => "Sold",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SN" => Ok(Field::Sn),
            "Name" => Ok(Field::Name),
            "Date" => Ok(Field::Date),
            "Compliance Index" | "ComplianceIndex" => Ok(Field::ComplianceIndex),
            "Sold" => Ok(Field::Sold),
            other => Err(Error::IndexNotFound(other.to_string())),
        }
    }
}

/// One row of the fixed schema.
///
/// Values are unpadded; the codec pads them to the column width on write and
/// strips the padding on read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub sn: String,
    pub name: String,
    /// `DD/MM/YYYY`
    pub date: String,
    /// Decimal string, e.g. `"0.75"`.
    pub compliance_index: String,
    /// `"+"` or `"-"`.
    pub sold: String,
}

impl Record {
    pub fn new(
        sn: impl Into<String>,
        name: impl Into<String>,
        date: impl Into<String>,
        compliance_index: impl Into<String>,
        sold: impl Into<String>,
    ) -> Self {
        Record {
            sn: sn.into(),
            name: name.into(),
            date: date.into(),
            compliance_index: compliance_index.into(),
            sold: sold.into(),
        }
    }

    /// Value of a field by identifier.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Sn => &self.sn,
            Field::Name => &self.name,
            Field::Date => &self.date,
            Field::ComplianceIndex => &self.compliance_index,
            Field::Sold => &self.sold,
        }
    }

    pub(crate) fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Sn => self.sn = value,
            Field::Name => self.name = value,
            Field::Date => self.date = value,
            Field::ComplianceIndex => self.compliance_index = value,
            Field::Sold => self.sold = value,
        }
    }
}

/// Byte width of each column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldWidths {
    pub sn: usize,
    pub name: usize,
    pub date: usize,
    pub compliance_index: usize,
    pub sold: usize,
}

impl FieldWidths {
    pub fn get(&self, field: Field) -> usize {
        match field {
            Field::Sn => self.sn,
            Field::Name => self.name,
            Field::Date => self.date,
            Field::ComplianceIndex => self.compliance_index,
            Field::Sold => self.sold,
        }
    }

    /// Length of one encoded line: all columns, four commas and the newline.
    pub fn line_len(&self) -> usize {
        Field::ALL.iter().map(|f| self.get(*f)).sum::<usize>() + Field::ALL.len()
    }
}

impl Default for FieldWidths {
    fn default() -> Self {
        FieldWidths {
            sn: 6,
            name: 6,
            date: 10,
            compliance_index: 4,
            sold: 1,
        }
    }
}

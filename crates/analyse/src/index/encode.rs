//! Index record layouts
//!
//! All three layouts share one value order and one value-code assignment,
//! so their sizes can be compared directly.

use crate::error::{AnalyseError, Result};
use crate::index::collect::{sorted_groups, FileStats, RowNumberCols, ValueGroups};
use crate::index::IndexValue;
use crate::scope::ScopeMask;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Key codes, value codes and row numbers
    Combined,
    /// Values with row numbers only
    Rows,
    /// Key and value codes without row numbers
    Codes,
}

impl IndexKind {
    pub fn has_codes(self) -> bool {
        !matches!(self, IndexKind::Rows)
    }

    pub fn has_rows(self) -> bool {
        !matches!(self, IndexKind::Codes)
    }

    /// Selects the layout from `--index-types` values.
    ///
    /// No types or both types select the combined layout.
    pub fn from_index_types<S: AsRef<str>>(types: &[S]) -> Result<Self> {
        let mut rows = false;
        let mut codes = false;
        for index_type in types {
            match index_type.as_ref() {
                "rows" => rows = true,
                "codes" => codes = true,
                other => {
                    return Err(AnalyseError::InvalidIndex(format!(
                        "unknown index type {other:?}, expected \"rows\" or \"codes\""
                    )))
                }
            }
        }

        Ok(match (rows, codes) {
            (true, false) => IndexKind::Rows,
            (false, true) => IndexKind::Codes,
            _ => IndexKind::Combined,
        })
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexKind::Combined => "combined",
            IndexKind::Rows => "rows",
            IndexKind::Codes => "codes",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedValue<T> {
    pub value: Vec<T>,
    pub value_code: Option<i64>,
    pub row_numbers: Option<Vec<RowNumberCols>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedAttribute {
    pub key: String,
    pub key_code: Option<i64>,
    pub scope_mask: ScopeMask,
    pub values_string: Vec<IndexedValue<String>>,
    pub values_int: Vec<IndexedValue<i64>>,
    pub values_float: Vec<IndexedValue<f64>>,
    pub values_bool: Vec<IndexedValue<bool>>,
}

impl IndexedAttribute {
    pub fn value_count(&self) -> usize {
        self.values_string.len() + self.values_int.len() + self.values_float.len() + self.values_bool.len()
    }
}

/// One record per attribute key, in key order
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeIndex {
    pub kind: IndexKind,
    pub attributes: Vec<IndexedAttribute>,
}

impl AttributeIndex {
    pub fn get(&self, key: &str) -> Option<&IndexedAttribute> {
        self.attributes.iter().find(|attr| attr.key == key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Encodes collected stats into the given layout.
///
/// Key codes count from 1 in key order. Within each value type, values
/// are sorted and coded from 1.
pub fn generate_index(stats: &FileStats, kind: IndexKind) -> AttributeIndex {
    let attributes: Vec<IndexedAttribute> = stats
        .attributes
        .values()
        .zip(1..)
        .map(|(attr, key_code)| IndexedAttribute {
            key: attr.key.clone(),
            key_code: kind.has_codes().then_some(key_code),
            scope_mask: attr.scope_mask,
            values_string: encode_values(&attr.values_string, kind),
            values_int: encode_values(&attr.values_int, kind),
            values_float: encode_values(&attr.values_float, kind),
            values_bool: encode_values(&attr.values_bool, kind),
        })
        .collect();

    debug!(kind = %kind, attributes = attributes.len(), "Generated attribute index");
    AttributeIndex { kind, attributes }
}

pub fn generate_combined_index(stats: &FileStats) -> AttributeIndex {
    generate_index(stats, IndexKind::Combined)
}

pub fn generate_rows_index(stats: &FileStats) -> AttributeIndex {
    generate_index(stats, IndexKind::Rows)
}

pub fn generate_codes_index(stats: &FileStats) -> AttributeIndex {
    generate_index(stats, IndexKind::Codes)
}

fn encode_values<T: IndexValue>(groups: &ValueGroups<T>, kind: IndexKind) -> Vec<IndexedValue<T>> {
    sorted_groups(groups)
        .into_iter()
        .zip(1..)
        .map(|(info, value_code)| IndexedValue {
            value: info.value.clone(),
            value_code: kind.has_codes().then_some(value_code),
            row_numbers: kind.has_rows().then(|| info.row_numbers.clone()),
        })
        .collect()
}

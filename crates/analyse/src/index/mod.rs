//! Experimental attribute index
//!
//! Attribute occurrences of a block are grouped per key and per distinct
//! value ([`collect`]), encoded into one of three record layouts
//! ([`encode`]) and persisted as `index.parquet` next to the block data
//! ([`writer`]).

pub mod collect;
pub mod encode;
pub mod hash;
pub mod writer;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use hash::Fnv64a;
use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

/// Element type of indexed attribute values
pub trait IndexValue: Clone + Debug + PartialEq + Send + Sync + 'static {
    fn hash_into(&self, hasher: &mut Fnv64a);

    /// Total order used to sort value groups
    fn compare(&self, other: &Self) -> Ordering;

    /// Identity used to merge value groups, consistent with `hash_into`
    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn data_type() -> DataType;

    fn into_array(values: Vec<Self>) -> ArrayRef;

    /// Reads the values of a non-null array, or None on a type mismatch
    fn from_array(array: &dyn Array) -> Option<Vec<Self>>;
}

impl IndexValue for String {
    fn hash_into(&self, hasher: &mut Fnv64a) {
        hasher.write(self.as_bytes());
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn data_type() -> DataType {
        DataType::Utf8
    }

    fn into_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(StringArray::from(values))
    }

    fn from_array(array: &dyn Array) -> Option<Vec<Self>> {
        let strings = array.as_string_opt::<i32>()?;
        Some(
            strings
                .iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect(),
        )
    }
}

impl IndexValue for i64 {
    fn hash_into(&self, hasher: &mut Fnv64a) {
        hasher.write(&self.to_le_bytes());
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn data_type() -> DataType {
        DataType::Int64
    }

    fn into_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(Int64Array::from(values))
    }

    fn from_array(array: &dyn Array) -> Option<Vec<Self>> {
        Some(array.as_primitive_opt::<Int64Type>()?.values().to_vec())
    }
}

impl IndexValue for f64 {
    fn hash_into(&self, hasher: &mut Fnv64a) {
        hasher.write(&self.to_bits().to_le_bytes());
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    fn same(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }

    fn data_type() -> DataType {
        DataType::Float64
    }

    fn into_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(Float64Array::from(values))
    }

    fn from_array(array: &dyn Array) -> Option<Vec<Self>> {
        Some(array.as_primitive_opt::<Float64Type>()?.values().to_vec())
    }
}

impl IndexValue for bool {
    fn hash_into(&self, hasher: &mut Fnv64a) {
        hasher.write(&[u8::from(*self)]);
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn data_type() -> DataType {
        DataType::Boolean
    }

    fn into_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(BooleanArray::from(values))
    }

    fn from_array(array: &dyn Array) -> Option<Vec<Self>> {
        let bools = array.as_boolean_opt()?;
        Some(bools.iter().map(|v| v.unwrap_or_default()).collect())
    }
}

/// FNV-1a over the concatenated element encodings
pub fn hash_values<T: IndexValue>(values: &[T]) -> u64 {
    let mut hasher = Fnv64a::new();
    for value in values {
        value.hash_into(&mut hasher);
    }
    hasher.finish()
}

/// Compares element-wise, then by length
pub fn compare_slices<T: IndexValue>(a: &[T], b: &[T]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.compare(y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

pub use collect::{
    collect_attribute_stats, AttributeInfo, AttributeValue, CollectOptions, FileStats,
    RowNumberCols, ValueGroups, ValueInfo,
};
pub use encode::{
    generate_codes_index, generate_combined_index, generate_index, generate_rows_index,
    AttributeIndex, IndexKind, IndexedAttribute, IndexedValue,
};
pub use writer::{
    read_attribute_index, read_index, read_rows_index, write_attribute_index, write_index,
    DATA_FILE, INDEX_FILE,
};

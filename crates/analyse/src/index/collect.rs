//! Grouping attribute occurrences by key and distinct value

use crate::collector::{IS_ARRAY, KEY, VALUE};
use crate::error::Result;
use crate::index::{compare_slices, hash_values, IndexValue};
use crate::paths::{
    entity_column, intrinsic_columns, paths_for_version, well_known_columns, AttributeScope,
    ScopeAttributePath,
};
use crate::scope::ScopeMask;
use parquetquery::{
    column_exists, ColumnIterator, JoinIterator, KeepAll, NotNullPredicate, ParquetFile,
    RowIterator, RowNumber, Value,
};
use std::collections::{BTreeMap, HashMap};
use storage::BlockMeta;
use tracing::{debug, info};

/// Typed value columns joined next to the key, in lookup order
const VALUE_SLOTS: [&str; 4] = [VALUE, "valueInt", "valueDouble", "valueBool"];

/// First four levels of a row number as stored in the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowNumberCols {
    pub lvl01: i64,
    pub lvl02: i64,
    pub lvl03: i64,
    pub lvl04: i64,
}

impl From<RowNumber> for RowNumberCols {
    fn from(row: RowNumber) -> Self {
        Self {
            lvl01: i64::from(row.level(0)),
            lvl02: i64::from(row.level(1)),
            lvl03: i64::from(row.level(2)),
            lvl04: i64::from(row.level(3)),
        }
    }
}

/// A distinct value and the rows it occurs in
#[derive(Debug, Clone, PartialEq)]
pub struct ValueInfo<T> {
    pub value: Vec<T>,
    pub row_numbers: Vec<RowNumberCols>,
}

/// Distinct values bucketed by FNV-1a hash.
///
/// Buckets hold every distinct value with that hash, so colliding values
/// are never merged.
#[derive(Debug, Clone)]
pub struct ValueGroups<T> {
    buckets: HashMap<u64, Vec<ValueInfo<T>>>,
    len: usize,
}

impl<T> Default for ValueGroups<T> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
            len: 0,
        }
    }
}

impl<T: IndexValue> ValueGroups<T> {
    pub fn insert(&mut self, value: Vec<T>, row: RowNumberCols) {
        let sum = hash_values(&value);
        let bucket = self.buckets.entry(sum).or_default();
        if let Some(info) = bucket.iter_mut().find(|info| same_values(&info.value, &value)) {
            info.row_numbers.push(row);
            return;
        }
        if !bucket.is_empty() {
            debug!(hash = sum, values = ?value, "Hash collision between attribute values");
        }
        bucket.push(ValueInfo {
            value,
            row_numbers: vec![row],
        });
        self.len += 1;
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distinct values in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &ValueInfo<T>> {
        self.buckets.values().flatten()
    }

    fn sort_rows(&mut self) {
        for info in self.buckets.values_mut().flatten() {
            info.row_numbers.sort_unstable();
        }
    }
}

fn same_values<T: IndexValue>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y))
}

/// Value of one attribute occurrence. Scalars are one-element lists.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(Vec<String>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
}

impl AttributeValue {
    /// Collects the non-null values typed like the first one.
    /// Returns None if every value is null.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Option<Self> {
        let mut values = values.into_iter().filter(|v| !v.is_null()).peekable();
        let value = match values.peek()? {
            Value::String(_) => {
                AttributeValue::String(values.filter_map(|v| v.as_str().map(str::to_string)).collect())
            }
            Value::Int64(_) => AttributeValue::Int(values.filter_map(|v| v.as_i64()).collect()),
            Value::Float64(_) => AttributeValue::Float(values.filter_map(|v| v.as_f64()).collect()),
            Value::Bool(_) => AttributeValue::Bool(values.filter_map(|v| v.as_bool()).collect()),
            Value::Missing => return None,
        };
        Some(value)
    }

    /// Keeps only the first element
    pub fn first(self) -> Self {
        match self {
            AttributeValue::String(mut v) => {
                v.truncate(1);
                AttributeValue::String(v)
            }
            AttributeValue::Int(mut v) => {
                v.truncate(1);
                AttributeValue::Int(v)
            }
            AttributeValue::Float(mut v) => {
                v.truncate(1);
                AttributeValue::Float(v)
            }
            AttributeValue::Bool(mut v) => {
                v.truncate(1);
                AttributeValue::Bool(v)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::String(v) => v.is_empty(),
            AttributeValue::Int(v) => v.is_empty(),
            AttributeValue::Float(v) => v.is_empty(),
            AttributeValue::Bool(v) => v.is_empty(),
        }
    }
}

/// Occurrences of one attribute key
#[derive(Debug, Clone)]
pub struct AttributeInfo {
    pub key: String,
    pub scope_mask: ScopeMask,
    /// Recorded occurrences
    pub count: i64,
    pub values_string: ValueGroups<String>,
    pub values_int: ValueGroups<i64>,
    pub values_float: ValueGroups<f64>,
    pub values_bool: ValueGroups<bool>,
}

impl AttributeInfo {
    pub fn new(key: impl Into<String>, scope_mask: ScopeMask) -> Self {
        Self {
            key: key.into(),
            scope_mask,
            count: 0,
            values_string: ValueGroups::default(),
            values_int: ValueGroups::default(),
            values_float: ValueGroups::default(),
            values_bool: ValueGroups::default(),
        }
    }

    /// Distinct values across all types
    pub fn cardinality(&self) -> usize {
        self.values_string.len()
            + self.values_int.len()
            + self.values_float.len()
            + self.values_bool.len()
    }

    fn sort_rows(&mut self) {
        self.values_string.sort_rows();
        self.values_int.sort_rows();
        self.values_float.sort_rows();
        self.values_bool.sort_rows();
    }
}

/// Entity counts and attribute occurrences of a block
#[derive(Debug, Clone, Default)]
pub struct FileStats {
    pub traces: u64,
    pub resources: u64,
    pub spans: u64,
    pub events: u64,
    pub links: u64,
    /// Array-valued attribute occurrences
    pub arrays: u64,
    /// Keyed and iterated in key order
    pub attributes: BTreeMap<String, AttributeInfo>,
}

impl FileStats {
    /// Records one occurrence. Empty values are ignored entirely.
    pub fn add_attribute(
        &mut self,
        row: RowNumberCols,
        scope: ScopeMask,
        key: &str,
        value: AttributeValue,
    ) {
        if value.is_empty() {
            return;
        }

        let attr = match self.attributes.get_mut(key) {
            Some(attr) => attr,
            None => self
                .attributes
                .entry(key.to_string())
                .or_insert_with(|| AttributeInfo::new(key, scope)),
        };
        attr.count += 1;
        attr.scope_mask.add(scope);

        match value {
            AttributeValue::String(v) => attr.values_string.insert(v, row),
            AttributeValue::Int(v) => attr.values_int.insert(v, row),
            AttributeValue::Float(v) => attr.values_float.insert(v, row),
            AttributeValue::Bool(v) => attr.values_bool.insert(v, row),
        }
    }

    /// Attributes ordered by scope mask, then by count descending
    pub fn sorted_for_display(&self) -> Vec<&AttributeInfo> {
        let mut attrs: Vec<_> = self.attributes.values().collect();
        attrs.sort_by(|a, b| {
            a.scope_mask
                .cmp(&b.scope_mask)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a.key.cmp(&b.key))
        });
        attrs
    }

    /// Orders the row numbers of every value ascending
    pub fn finish(&mut self) {
        for attr in self.attributes.values_mut() {
            attr.sort_rows();
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CollectOptions {
    /// Also index scope name/version, span name/kind/status and event name
    pub add_intrinsics: bool,
}

/// Gathers every attribute occurrence of a block for indexing
pub fn collect_attribute_stats(
    file: &ParquetFile,
    meta: &BlockMeta,
    options: &CollectOptions,
) -> Result<FileStats> {
    let paths = paths_for_version(&meta.version)?;
    let mut stats = FileStats {
        traces: u64::try_from(file.metadata().file_metadata().num_rows()).unwrap_or_default(),
        resources: count_entities(file, AttributeScope::Resource)?,
        spans: count_entities(file, AttributeScope::Span)?,
        events: count_entities(file, AttributeScope::Event)?,
        links: count_entities(file, AttributeScope::Link)?,
        ..Default::default()
    };

    for path in paths.scopes() {
        collect_scope_attributes(file, path, &mut stats)?;
        collect_dedicated_columns(file, meta, path, &mut stats)?;
    }

    for column in well_known_columns() {
        if column_exists(file, &column.path) {
            collect_fixed_column(file, &column.path, column.scope, column.name, &mut stats)?;
        }
    }

    if options.add_intrinsics {
        for column in intrinsic_columns() {
            if column_exists(file, &column.path) {
                collect_fixed_column(file, &column.path, column.scope, column.name, &mut stats)?;
            }
        }
    }

    stats.finish();
    info!(
        block = %meta.block_id,
        traces = stats.traces,
        spans = stats.spans,
        attributes = stats.attributes.len(),
        "Collected attribute stats"
    );
    Ok(stats)
}

/// Counts the entities of a scope through a required column they all carry
fn count_entities(file: &ParquetFile, scope: AttributeScope) -> Result<u64> {
    let path = entity_column(scope);
    if !column_exists(file, &path) {
        debug!(scope = %scope, column = %path, "No entity column, skipping count");
        return Ok(0);
    }

    let level = scope.entity_level();
    let mut iter = ColumnIterator::new(file.clone(), &path, None, VALUE)?;
    let mut count = 0;
    while let Some((row, _)) = iter.next_value()? {
        if row.level(level) >= 0 {
            count += 1;
        }
    }
    Ok(count)
}

fn collect_scope_attributes(
    file: &ParquetFile,
    path: &ScopeAttributePath,
    stats: &mut FileStats,
) -> Result<()> {
    let mut iters: Vec<Box<dyn RowIterator<()>>> = vec![Box::new(ColumnIterator::new(
        file.clone(),
        &path.key_path,
        None,
        KEY,
    )?)];
    if let Some(is_array) = &path.is_array_path {
        iters.push(Box::new(ColumnIterator::new(file.clone(), is_array, None, IS_ARRAY)?));
    }
    for (i, (slot, column)) in VALUE_SLOTS.iter().zip(path.typed_value_paths()).enumerate() {
        // the string column is required, typed columns are optional
        if i > 0 && !column_exists(file, column) {
            debug!(scope = %path.scope, column, "Typed value column not present");
            continue;
        }
        iters.push(Box::new(ColumnIterator::new(file.clone(), column, None, *slot)?));
    }

    let mask = path.scope.mask();
    let owner_level = path.scope.owner_level();
    let mut join = JoinIterator::new(path.definition_level, iters, KeepAll);

    while let Some(row) = join.next()? {
        let Some(key) = row.values(KEY).find_map(|v| v.as_str()) else {
            continue;
        };
        let is_array = row.values(IS_ARRAY).any(|v| v.as_bool() == Some(true));
        if is_array {
            stats.arrays += 1;
        }

        let value = VALUE_SLOTS
            .iter()
            .find_map(|slot| AttributeValue::from_values(row.values(slot)));
        let Some(value) = value else {
            continue;
        };
        let value = if is_array { value } else { value.first() };

        let owner = RowNumberCols::from(row.row_number.truncated(owner_level));
        stats.add_attribute(owner, mask, key, value);
    }

    Ok(())
}

fn collect_dedicated_columns(
    file: &ParquetFile,
    meta: &BlockMeta,
    path: &ScopeAttributePath,
    stats: &mut FileStats,
) -> Result<()> {
    let Some(scope) = path.dedicated_scope else {
        return Ok(());
    };

    for (slot, column) in meta.dedicated_columns_for(scope).enumerate() {
        if let Some(column_path) = path.dedicated_column_paths.get(slot) {
            collect_fixed_column(file, column_path, path.scope, &column.name, stats)?;
        }
    }
    Ok(())
}

/// Records a column holding a single known attribute at its entity level
fn collect_fixed_column(
    file: &ParquetFile,
    column_path: &str,
    scope: AttributeScope,
    name: &str,
    stats: &mut FileStats,
) -> Result<()> {
    let iters: Vec<Box<dyn RowIterator<()>>> = vec![Box::new(ColumnIterator::new(
        file.clone(),
        column_path,
        Some(Box::new(NotNullPredicate)),
        VALUE,
    )?)];
    let mut join = JoinIterator::new(scope.entity_level(), iters, KeepAll);

    while let Some(row) = join.next()? {
        let Some(value) = AttributeValue::from_values(row.values(VALUE)) else {
            continue;
        };
        let owner = RowNumberCols::from(row.row_number.truncated(scope.owner_level()));
        stats.add_attribute(owner, scope.mask(), name, value);
    }

    Ok(())
}

/// Value groups in [`compare_slices`] order
pub(crate) fn sorted_groups<T: IndexValue>(groups: &ValueGroups<T>) -> Vec<&ValueInfo<T>> {
    let mut sorted: Vec<_> = groups.iter().collect();
    sorted.sort_by(|a, b| compare_slices(&a.value, &b.value));
    sorted
}

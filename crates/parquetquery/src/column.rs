//! Iteration over a single leaf column
//!
//! [`ColumnIterator`] decodes the repetition and definition levels of one
//! column, row group by row group, and yields every level entry as a
//! `(RowNumber, Value)` pair. Nulls are yielded as [`Value::Missing`] so
//! that columns sharing a parent stay aligned when joined.

use crate::error::{QueryError, Result};
use crate::iter::{IteratorResult, RowIterator};
use crate::predicate::Predicate;
use crate::row_number::{RowNumber, MAX_DEFINITION_LEVEL};
use crate::value::Value;
use parquet::basic::{Repetition, Type as PhysicalType};
use parquet::column::reader::{ColumnReader, ColumnReaderImpl};
use parquet::data_type::DataType;
use parquet::file::reader::{ChunkReader, FileReader, SerializedFileReader};
use parquet::schema::types::{ColumnDescriptor, SchemaDescriptor};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Shared handle to an opened parquet file
pub type ParquetFile = Arc<dyn FileReader>;

/// Number of records decoded per batch
const DEFAULT_BATCH_SIZE: usize = 1024;

/// Opens a parquet file over any chunk reader
pub fn open_file<R: ChunkReader + 'static>(reader: R) -> Result<ParquetFile> {
    Ok(Arc::new(SerializedFileReader::new(reader)?))
}

/// Returns true if the file schema contains the given leaf column
pub fn column_exists(file: &ParquetFile, path: &str) -> bool {
    let schema = file.metadata().file_metadata().schema_descr();
    find_column(schema, path).is_some()
}

fn find_column(schema: &SchemaDescriptor, path: &str) -> Option<usize> {
    schema
        .columns()
        .iter()
        .position(|column| column.path().string() == path)
}

/// Maps each definition level of a column to the number of repeated
/// ancestors defined at that level.
fn definition_depths(schema: &SchemaDescriptor, column: &ColumnDescriptor) -> Vec<usize> {
    let mut depths = vec![0];
    let mut depth = 0;
    let mut node = schema.root_schema();

    for part in column.path().parts() {
        let Some(child) = node.get_fields().iter().find(|f| f.name() == part.as_str()) else {
            break;
        };
        let info = child.get_basic_info();
        if info.has_repetition() {
            match info.repetition() {
                Repetition::OPTIONAL => depths.push(depth),
                Repetition::REPEATED => {
                    depth += 1;
                    depths.push(depth);
                }
                Repetition::REQUIRED => {}
            }
        }
        node = child.as_ref();
    }

    depths
}

/// Iterator over the values of one leaf column
pub struct ColumnIterator {
    file: ParquetFile,
    path: String,
    column_index: usize,
    select_as: &'static str,
    predicate: Option<Box<dyn Predicate>>,

    max_definition_level: i16,
    depths: Vec<usize>,

    next_row_group: usize,
    reader: Option<ColumnReader>,
    row_number: RowNumber,

    batch_size: usize,
    def_levels: Vec<i16>,
    rep_levels: Vec<i16>,
    buffer: VecDeque<(RowNumber, Value)>,
    closed: bool,
}

impl ColumnIterator {
    /// Opens the column at `path`, yielding its values under `select_as`.
    ///
    /// Returns [`QueryError::ColumnNotFound`] if the path is not a leaf
    /// column of the file schema.
    pub fn new(
        file: ParquetFile,
        path: &str,
        predicate: Option<Box<dyn Predicate>>,
        select_as: &'static str,
    ) -> Result<Self> {
        let schema = file.metadata().file_metadata().schema_descr();
        let column_index = find_column(schema, path).ok_or_else(|| QueryError::ColumnNotFound {
            path: path.to_string(),
        })?;

        let column = schema.column(column_index);
        if column.physical_type() == PhysicalType::INT96 {
            return Err(QueryError::UnsupportedType {
                path: path.to_string(),
                physical_type: column.physical_type().to_string(),
            });
        }
        if column.max_rep_level() as usize >= MAX_DEFINITION_LEVEL {
            return Err(QueryError::TooDeep {
                path: path.to_string(),
                depth: column.max_rep_level() as usize,
            });
        }

        let depths = definition_depths(schema, &column);
        let max_definition_level = column.max_def_level();

        debug!(
            column = path,
            index = column_index,
            max_def = max_definition_level,
            max_rep = column.max_rep_level(),
            "Opened column iterator"
        );

        Ok(Self {
            file,
            path: path.to_string(),
            column_index,
            select_as,
            predicate,
            max_definition_level,
            depths,
            next_row_group: 0,
            reader: None,
            row_number: RowNumber::empty(),
            batch_size: DEFAULT_BATCH_SIZE,
            def_levels: Vec::with_capacity(DEFAULT_BATCH_SIZE),
            rep_levels: Vec::with_capacity(DEFAULT_BATCH_SIZE),
            buffer: VecDeque::with_capacity(DEFAULT_BATCH_SIZE),
            closed: false,
        })
    }

    /// Sets the number of records decoded per batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the next value and its row number
    pub fn next_value(&mut self) -> Result<Option<(RowNumber, Value)>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }
            if self.closed || !self.read_batch()? {
                return Ok(None);
            }
        }
    }

    /// Opens the next row group whose column chunk passes the predicate
    fn open_next_row_group(&mut self) -> Result<bool> {
        let file = Arc::clone(&self.file);
        let metadata = file.metadata();

        while self.next_row_group < metadata.num_row_groups() {
            let index = self.next_row_group;
            self.next_row_group += 1;

            let row_group = metadata.row_group(index);
            if let Some(predicate) = &self.predicate {
                if !predicate.keep_column_chunk(row_group.column(self.column_index)) {
                    debug!(
                        column = %self.path,
                        row_group = index,
                        rows = row_group.num_rows(),
                        "Skipping column chunk"
                    );
                    self.row_number.skip(row_group.num_rows());
                    continue;
                }
            }

            let reader = file.get_row_group(index)?;
            self.reader = Some(reader.get_column_reader(self.column_index)?);
            return Ok(true);
        }

        Ok(false)
    }

    /// Decodes the next batch of records into the buffer.
    /// Returns false once every row group has been read.
    fn read_batch(&mut self) -> Result<bool> {
        loop {
            if self.reader.is_none() && !self.open_next_row_group()? {
                return Ok(false);
            }
            let Some(reader) = self.reader.as_mut() else {
                return Ok(false);
            };

            self.def_levels.clear();
            self.rep_levels.clear();
            let defs = &mut self.def_levels;
            let reps = &mut self.rep_levels;
            let batch = self.batch_size;

            let (values, levels) = match reader {
                ColumnReader::BoolColumnReader(r) => decode(r, batch, defs, reps, |v| Value::Bool(*v))?,
                ColumnReader::Int32ColumnReader(r) => {
                    decode(r, batch, defs, reps, |v| Value::Int64(*v as i64))?
                }
                ColumnReader::Int64ColumnReader(r) => decode(r, batch, defs, reps, |v| Value::Int64(*v))?,
                ColumnReader::FloatColumnReader(r) => {
                    decode(r, batch, defs, reps, |v| Value::Float64(*v as f64))?
                }
                ColumnReader::DoubleColumnReader(r) => {
                    decode(r, batch, defs, reps, |v| Value::Float64(*v))?
                }
                ColumnReader::ByteArrayColumnReader(r) => decode(r, batch, defs, reps, |v| {
                    Value::String(String::from_utf8_lossy(v.data()).into_owned())
                })?,
                ColumnReader::FixedLenByteArrayColumnReader(r) => decode(r, batch, defs, reps, |v| {
                    Value::String(String::from_utf8_lossy(v.data()).into_owned())
                })?,
                ColumnReader::Int96ColumnReader(_) => {
                    return Err(QueryError::UnsupportedType {
                        path: self.path.clone(),
                        physical_type: PhysicalType::INT96.to_string(),
                    })
                }
            };

            if levels == 0 {
                // row group exhausted
                self.reader = None;
                continue;
            }

            self.buffer_levels(values, levels);
            if !self.buffer.is_empty() {
                return Ok(true);
            }
        }
    }

    fn buffer_levels(&mut self, values: Vec<Value>, levels: usize) {
        let mut values = values.into_iter();
        let max_depth = self.depths.last().copied().unwrap_or(0);

        for i in 0..levels {
            let def = self
                .def_levels
                .get(i)
                .copied()
                .unwrap_or(self.max_definition_level);
            let rep = self.rep_levels.get(i).copied().unwrap_or(0);
            let depth = self.depths.get(def as usize).copied().unwrap_or(max_depth);

            self.row_number.next(rep as usize, depth);

            let value = if def == self.max_definition_level {
                values.next().unwrap_or_default()
            } else {
                Value::Missing
            };

            if let Some(predicate) = &self.predicate {
                if !predicate.keep_value(&value) {
                    continue;
                }
            }
            self.buffer.push_back((self.row_number, value));
        }
    }
}

/// Reads up to `batch_size` records, converting the decoded values.
/// Returns the converted values and the number of level entries read.
fn decode<T: DataType>(
    reader: &mut ColumnReaderImpl<T>,
    batch_size: usize,
    def_levels: &mut Vec<i16>,
    rep_levels: &mut Vec<i16>,
    convert: impl Fn(&T::T) -> Value,
) -> Result<(Vec<Value>, usize)> {
    let mut raw = Vec::with_capacity(batch_size);
    let (_, values_read, levels_read) =
        reader.read_records(batch_size, Some(def_levels), Some(rep_levels), &mut raw)?;

    // required top-level columns carry no levels
    let levels = if levels_read == 0 { values_read } else { levels_read };
    Ok((raw.iter().map(convert).collect(), levels))
}

impl<T: Send> RowIterator<T> for ColumnIterator {
    fn next(&mut self) -> Result<Option<IteratorResult<T>>> {
        Ok(self.next_value()?.map(|(row_number, value)| {
            let mut result = IteratorResult::new(row_number);
            result.entries.push((self.select_as, value));
            result
        }))
    }

    fn close(&mut self) {
        self.closed = true;
        self.reader = None;
        self.buffer.clear();
    }
}

impl Drop for ColumnIterator {
    fn drop(&mut self) {
        RowIterator::<()>::close(self);
    }
}

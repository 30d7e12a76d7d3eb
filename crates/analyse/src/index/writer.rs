//! `index.parquet` persistence

use crate::error::{AnalyseError, Result};
use crate::index::collect::RowNumberCols;
use crate::index::encode::{AttributeIndex, IndexKind, IndexedAttribute, IndexedValue};
use crate::index::IndexValue;
use crate::scope::ScopeMask;
use arrow::array::{Array, ArrayRef, AsArray, Int64Array, ListArray, StringArray, StructArray};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, Fields, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, Encoding};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::ChunkReader;
use parquet::schema::types::ColumnPath;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::info;

pub const DATA_FILE: &str = "data.parquet";
pub const INDEX_FILE: &str = "index.parquet";

const KEY: &str = "Key";
const KEY_CODE: &str = "KeyCode";
const SCOPE_MASK: &str = "ScopeMask";
const VALUES_STRING: &str = "ValuesString";
const VALUES_INT: &str = "ValuesInt";
const VALUES_FLOAT: &str = "ValuesFloat";
const VALUES_BOOL: &str = "ValuesBool";
const VALUE: &str = "Value";
const VALUE_CODE: &str = "ValueCode";
const ROW_NUMBERS: &str = "RowNumbers";
const LEVELS: [&str; 4] = ["Lvl01", "Lvl02", "Lvl03", "Lvl04"];
const ELEMENT: &str = "element";

const VALUE_LISTS: [&str; 4] = [VALUES_STRING, VALUES_INT, VALUES_FLOAT, VALUES_BOOL];

/// Writes `index.parquet` into a block directory holding `data.parquet`
pub fn write_attribute_index(dir: &Path, index: &AttributeIndex) -> Result<PathBuf> {
    let data = dir.join(DATA_FILE);
    if !data.is_file() {
        return Err(AnalyseError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no {DATA_FILE} in {}", dir.display()),
        )));
    }

    // An existing index stays readable until the new one is complete
    let path = dir.join(INDEX_FILE);
    let mut tmp = NamedTempFile::new_in(dir)?;
    write_index(tmp.as_file_mut(), index)?;
    tmp.persist(&path).map_err(|e| e.error)?;

    info!(
        path = %path.display(),
        kind = %index.kind,
        attributes = index.len(),
        "Wrote attribute index"
    );
    Ok(path)
}

/// Writes an index as a single record batch
pub fn write_index<W: Write + Send>(writer: W, index: &AttributeIndex) -> Result<()> {
    let batch = index_batch(index)?;
    let mut writer = ArrowWriter::try_new(writer, batch.schema(), Some(writer_properties(index.kind)))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn writer_properties(kind: IndexKind) -> WriterProperties {
    let mut builder = WriterProperties::builder().set_compression(Compression::SNAPPY);
    for path in delta_columns(kind) {
        let path = ColumnPath::new(path.split('.').map(str::to_string).collect());
        builder = builder
            .set_column_encoding(path.clone(), Encoding::DELTA_BINARY_PACKED)
            .set_column_dictionary_enabled(path, false);
    }
    builder.build()
}

/// Integer leaf columns of the layout
fn delta_columns(kind: IndexKind) -> Vec<String> {
    let mut columns = vec![SCOPE_MASK.to_string()];
    if kind.has_codes() {
        columns.push(KEY_CODE.to_string());
    }
    for list in VALUE_LISTS {
        let element = format!("{list}.list.{ELEMENT}");
        if kind.has_codes() {
            columns.push(format!("{element}.{VALUE_CODE}"));
        }
        if kind.has_rows() {
            for level in LEVELS {
                columns.push(format!("{element}.{ROW_NUMBERS}.list.{ELEMENT}.{level}"));
            }
        }
    }
    columns
}

fn index_batch(index: &AttributeIndex) -> Result<RecordBatch> {
    let attrs = &index.attributes;
    let kind = index.kind;

    let mut columns: Vec<(&str, ArrayRef)> = vec![(
        KEY,
        Arc::new(StringArray::from_iter_values(attrs.iter().map(|a| a.key.as_str()))) as ArrayRef,
    )];
    if kind.has_codes() {
        columns.push((
            KEY_CODE,
            Arc::new(Int64Array::from_iter_values(
                attrs.iter().map(|a| a.key_code.unwrap_or_default()),
            )) as ArrayRef,
        ));
    }
    columns.push((
        SCOPE_MASK,
        Arc::new(Int64Array::from_iter_values(attrs.iter().map(|a| a.scope_mask.bits()))) as ArrayRef,
    ));
    columns.push((VALUES_STRING, value_list(attrs.iter().map(|a| &a.values_string[..]), kind)?));
    columns.push((VALUES_INT, value_list(attrs.iter().map(|a| &a.values_int[..]), kind)?));
    columns.push((VALUES_FLOAT, value_list(attrs.iter().map(|a| &a.values_float[..]), kind)?));
    columns.push((VALUES_BOOL, value_list(attrs.iter().map(|a| &a.values_bool[..]), kind)?));

    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), false))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Wraps `values` in a non-null list with the given element counts
fn list_array(values: ArrayRef, lengths: impl IntoIterator<Item = usize>) -> Result<ArrayRef> {
    let field = Arc::new(Field::new(ELEMENT, values.data_type().clone(), false));
    let list = ListArray::try_new(field, OffsetBuffer::from_lengths(lengths), values, None)?;
    Ok(Arc::new(list))
}

fn struct_array(columns: Vec<(&str, ArrayRef)>) -> Result<ArrayRef> {
    let fields: Fields = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), false))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    Ok(Arc::new(StructArray::try_new(fields, arrays, None)?))
}

/// Builds one `Values*` column: a list per attribute of value structs
fn value_list<'a, T: IndexValue>(
    per_attribute: impl Iterator<Item = &'a [IndexedValue<T>]>,
    kind: IndexKind,
) -> Result<ArrayRef> {
    let per_attribute: Vec<_> = per_attribute.collect();
    let entries: Vec<&IndexedValue<T>> = per_attribute.iter().flat_map(|values| values.iter()).collect();

    let flat_values: Vec<T> = entries.iter().flat_map(|e| e.value.iter().cloned()).collect();
    let mut columns = vec![(
        VALUE,
        list_array(T::into_array(flat_values), entries.iter().map(|e| e.value.len()))?,
    )];

    if kind.has_codes() {
        let codes = Int64Array::from_iter_values(entries.iter().map(|e| e.value_code.unwrap_or_default()));
        columns.push((VALUE_CODE, Arc::new(codes) as ArrayRef));
    }
    if kind.has_rows() {
        let rows: Vec<&[RowNumberCols]> = entries
            .iter()
            .map(|e| e.row_numbers.as_deref().unwrap_or_default())
            .collect();
        columns.push((ROW_NUMBERS, row_number_list(&rows)?));
    }

    list_array(struct_array(columns)?, per_attribute.iter().map(|values| values.len()))
}

fn row_number_list(rows: &[&[RowNumberCols]]) -> Result<ArrayRef> {
    let flat: Vec<RowNumberCols> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let level = |get: fn(&RowNumberCols) -> i64| -> ArrayRef {
        Arc::new(Int64Array::from_iter_values(flat.iter().map(get)))
    };
    let levels = struct_array(vec![
        (LEVELS[0], level(|r| r.lvl01)),
        (LEVELS[1], level(|r| r.lvl02)),
        (LEVELS[2], level(|r| r.lvl03)),
        (LEVELS[3], level(|r| r.lvl04)),
    ])?;
    list_array(levels, rows.iter().map(|r| r.len()))
}

/// Reads an index file of any layout
pub fn read_attribute_index(path: &Path) -> Result<AttributeIndex> {
    read_index(File::open(path)?)
}

/// Reads an index file that must use the rows-only layout
pub fn read_rows_index(path: &Path) -> Result<AttributeIndex> {
    let index = read_attribute_index(path)?;
    if index.kind != IndexKind::Rows {
        return Err(AnalyseError::InvalidIndex(format!(
            "{} is a {} index, expected rows",
            path.display(),
            index.kind
        )));
    }
    Ok(index)
}

pub fn read_index<R: ChunkReader + 'static>(reader: R) -> Result<AttributeIndex> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
    let kind = detect_kind(builder.schema())?;
    let reader = builder.build()?;

    let mut attributes = Vec::new();
    for batch in reader {
        decode_batch(&batch?, kind, &mut attributes)?;
    }
    Ok(AttributeIndex { kind, attributes })
}

fn detect_kind(schema: &Schema) -> Result<IndexKind> {
    let has_codes = schema.field_with_name(KEY_CODE).is_ok();
    let has_rows = match schema.field_with_name(VALUES_STRING).map(|f| f.data_type()) {
        Ok(DataType::List(item)) => match item.data_type() {
            DataType::Struct(fields) => fields.find(ROW_NUMBERS).is_some(),
            _ => false,
        },
        _ => false,
    };

    match (has_codes, has_rows) {
        (true, true) => Ok(IndexKind::Combined),
        (false, true) => Ok(IndexKind::Rows),
        (true, false) => Ok(IndexKind::Codes),
        (false, false) => Err(invalid("neither codes nor row numbers")),
    }
}

fn invalid(message: impl Into<String>) -> AnalyseError {
    AnalyseError::InvalidIndex(message.into())
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| invalid(format!("missing column {name}")))
}

fn int64_field<'a>(array: &'a StructArray, name: &str) -> Result<&'a Int64Array> {
    array
        .column_by_name(name)
        .and_then(|c| c.as_primitive_opt::<Int64Type>())
        .ok_or_else(|| invalid(format!("missing int64 field {name}")))
}

fn decode_batch(batch: &RecordBatch, kind: IndexKind, out: &mut Vec<IndexedAttribute>) -> Result<()> {
    let keys = column(batch, KEY)?
        .as_string_opt::<i32>()
        .ok_or_else(|| invalid("Key is not a string column"))?;
    let masks = column(batch, SCOPE_MASK)?
        .as_primitive_opt::<Int64Type>()
        .ok_or_else(|| invalid("ScopeMask is not an int64 column"))?;
    let key_codes = if kind.has_codes() {
        let codes = column(batch, KEY_CODE)?
            .as_primitive_opt::<Int64Type>()
            .ok_or_else(|| invalid("KeyCode is not an int64 column"))?;
        Some(codes)
    } else {
        None
    };

    let lists = VALUE_LISTS
        .iter()
        .map(|name| {
            column(batch, name)?
                .as_list_opt::<i32>()
                .ok_or_else(|| invalid(format!("{name} is not a list column")))
        })
        .collect::<Result<Vec<_>>>()?;

    for row in 0..batch.num_rows() {
        out.push(IndexedAttribute {
            key: keys.value(row).to_string(),
            key_code: key_codes.map(|codes| codes.value(row)),
            scope_mask: ScopeMask::from_bits(masks.value(row)),
            values_string: decode_values(lists[0], row)?,
            values_int: decode_values(lists[1], row)?,
            values_float: decode_values(lists[2], row)?,
            values_bool: decode_values(lists[3], row)?,
        });
    }
    Ok(())
}

fn decode_values<T: IndexValue>(list: &ListArray, row: usize) -> Result<Vec<IndexedValue<T>>> {
    let element = list.value(row);
    let element = element
        .as_struct_opt()
        .ok_or_else(|| invalid("value list element is not a struct"))?;
    let values = element
        .column_by_name(VALUE)
        .and_then(|c| c.as_list_opt::<i32>())
        .ok_or_else(|| invalid("missing Value list"))?;
    let codes = element
        .column_by_name(VALUE_CODE)
        .and_then(|c| c.as_primitive_opt::<Int64Type>());
    let rows = element
        .column_by_name(ROW_NUMBERS)
        .and_then(|c| c.as_list_opt::<i32>());

    (0..element.len())
        .map(|i| {
            let value = T::from_array(values.value(i).as_ref())
                .ok_or_else(|| invalid(format!("Value is not {}", T::data_type())))?;
            let row_numbers = rows
                .map(|rows| decode_row_numbers(rows.value(i).as_ref()))
                .transpose()?;
            Ok(IndexedValue {
                value,
                value_code: codes.map(|codes| codes.value(i)),
                row_numbers,
            })
        })
        .collect()
}

fn decode_row_numbers(array: &dyn Array) -> Result<Vec<RowNumberCols>> {
    let rows = array
        .as_struct_opt()
        .ok_or_else(|| invalid("RowNumbers element is not a struct"))?;
    let lvl01 = int64_field(rows, LEVELS[0])?;
    let lvl02 = int64_field(rows, LEVELS[1])?;
    let lvl03 = int64_field(rows, LEVELS[2])?;
    let lvl04 = int64_field(rows, LEVELS[3])?;

    Ok((0..rows.len())
        .map(|i| RowNumberCols {
            lvl01: lvl01.value(i),
            lvl02: lvl02.value(i),
            lvl03: lvl03.value(i),
            lvl04: lvl04.value(i),
        })
        .collect())
}

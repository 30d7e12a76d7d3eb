//! Synthetic Tempo blocks for end-to-end tests
//!
//! [`BlockFixture`] writes a `data.parquet` with the nested trace layout of a
//! vParquet version (resource spans, scope spans, spans, events and links,
//! each with their attribute lists and dedicated columns) plus the matching
//! `meta.json`.

use analyse::parquetquery::{self, ParquetFile};
use analyse::Version;
use anyhow::Context;
use arrow::datatypes::{DataType, Field, Fields, Schema, SchemaRef};
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde_json::{json, Map, Value as Json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{BlockMeta, DedicatedColumn, DedicatedColumnScope};

pub const TEST_TENANT_ID: &str = "single-tenant";
pub const TEST_BLOCK_ID: &str = "b27b0e53-66a0-4505-afd6-434ae3cd4a10";

/// Typed attribute value, scalars are one-element lists
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    String(Vec<String>),
    Int(Vec<i64>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: AttrValue,
    pub is_array: bool,
}

impl Attribute {
    pub fn string(key: &str, value: &str) -> Self {
        Self::scalar(key, AttrValue::String(vec![value.to_string()]))
    }

    pub fn int(key: &str, value: i64) -> Self {
        Self::scalar(key, AttrValue::Int(vec![value]))
    }

    pub fn double(key: &str, value: f64) -> Self {
        Self::scalar(key, AttrValue::Double(vec![value]))
    }

    pub fn bool(key: &str, value: bool) -> Self {
        Self::scalar(key, AttrValue::Bool(vec![value]))
    }

    pub fn strings(key: &str, values: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            value: AttrValue::String(values.iter().map(|v| v.to_string()).collect()),
            is_array: true,
        }
    }

    pub fn ints(key: &str, values: &[i64]) -> Self {
        Self {
            key: key.to_string(),
            value: AttrValue::Int(values.to_vec()),
            is_array: true,
        }
    }

    fn scalar(key: &str, value: AttrValue) -> Self {
        Self {
            key: key.to_string(),
            value,
            is_array: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Event {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub dedicated: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct Link {
    pub span_id: String,
    pub attrs: Vec<Attribute>,
}

#[derive(Debug, Clone, Default)]
pub struct Span {
    pub name: String,
    pub kind: i64,
    pub status_code: i64,
    pub status_message: String,
    pub http_method: Option<String>,
    pub attrs: Vec<Attribute>,
    /// Attribute name and value of dedicated columns
    pub dedicated: Vec<(String, String)>,
    pub events: Vec<Event>,
    pub links: Vec<Link>,
}

impl Span {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, attr: Attribute) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn with_dedicated(mut self, name: &str, value: &str) -> Self {
        self.dedicated.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScopeSpans {
    pub name: String,
    pub version: String,
    pub attrs: Vec<Attribute>,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceSpans {
    pub service_name: String,
    pub attrs: Vec<Attribute>,
    pub dedicated: Vec<(String, String)>,
    pub scope_spans: Vec<ScopeSpans>,
}

impl ResourceSpans {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, attr: Attribute) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn with_dedicated(mut self, name: &str, value: &str) -> Self {
        self.dedicated.push((name.to_string(), value.to_string()));
        self
    }

    /// Adds the spans under a single instrumentation scope
    pub fn with_spans(mut self, spans: Vec<Span>) -> Self {
        self.scope_spans.push(ScopeSpans {
            name: "fixture".to_string(),
            version: "1.0.0".to_string(),
            attrs: Vec::new(),
            spans,
        });
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub resource_spans: Vec<ResourceSpans>,
}

impl Trace {
    pub fn new(resource_spans: Vec<ResourceSpans>) -> Self {
        Self { resource_spans }
    }
}

/// A block with a chosen format version, dedicated columns and traces
#[derive(Debug, Clone)]
pub struct BlockFixture {
    version: Version,
    meta: BlockMeta,
    traces: Vec<Trace>,
    row_group_size: usize,
}

impl BlockFixture {
    pub fn new(version: Version) -> Self {
        let mut meta = BlockMeta::new(version.as_str(), TEST_BLOCK_ID);
        meta.tenant_id = TEST_TENANT_ID.to_string();
        meta.start_time = "2024-01-01T00:00:00Z".to_string();
        meta.end_time = "2024-01-01T01:00:00Z".to_string();
        Self {
            version,
            meta,
            traces: Vec::new(),
            row_group_size: 1024,
        }
    }

    pub fn with_block_id(mut self, block_id: &str) -> Self {
        self.meta.block_id = block_id.to_string();
        self
    }

    pub fn with_dedicated_column(mut self, scope: DedicatedColumnScope, name: &str) -> Self {
        self.meta.dedicated_columns.push(DedicatedColumn::new(scope, name));
        self
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.traces.push(trace);
        self
    }

    pub fn with_traces(mut self, traces: impl IntoIterator<Item = Trace>) -> Self {
        self.traces.extend(traces);
        self
    }

    /// Maximum traces per row group
    pub fn with_row_group_size(mut self, row_group_size: usize) -> Self {
        self.row_group_size = row_group_size.max(1);
        self
    }

    pub fn meta(&self) -> BlockMeta {
        let mut meta = self.meta.clone();
        meta.total_objects = self.traces.len() as i64;
        meta
    }

    pub fn to_bytes(&self) -> anyhow::Result<Bytes> {
        let mut buf = Vec::new();
        self.write_data(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Opens the block data in memory
    pub fn open(&self) -> anyhow::Result<ParquetFile> {
        Ok(parquetquery::open_file(self.to_bytes()?)?)
    }

    /// Writes `data.parquet` and `meta.json` into `dir`
    pub fn write_to_dir(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)?;
        let data = self.to_bytes()?;
        std::fs::write(dir.join("data.parquet"), &data)?;

        let mut meta = self.meta();
        meta.size = data.len() as u64;
        std::fs::write(dir.join("meta.json"), serde_json::to_vec(&meta)?)?;
        Ok(())
    }

    /// Writes the block under `<root>/<tenant>/<block id>/`
    pub fn write_block(&self, root: &Path) -> anyhow::Result<PathBuf> {
        let dir = root.join(&self.meta.tenant_id).join(&self.meta.block_id);
        self.write_to_dir(&dir)?;
        Ok(dir)
    }

    fn write_data<W: std::io::Write + Send>(&self, writer: W) -> anyhow::Result<()> {
        let schema = Arc::new(trace_schema(self.version));
        let batch = self.record_batch(&schema)?;

        let props = WriterProperties::builder()
            .set_max_row_group_size(self.row_group_size)
            .build();
        let mut writer = ArrowWriter::try_new(writer, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    fn record_batch(&self, schema: &SchemaRef) -> anyhow::Result<RecordBatch> {
        let rows: Vec<Json> = self
            .traces
            .iter()
            .enumerate()
            .map(|(i, trace)| self.trace_json(i, trace))
            .collect();

        let mut decoder = ReaderBuilder::new(Arc::clone(schema))
            .with_batch_size(rows.len().max(1))
            .build_decoder()?;
        decoder.serialize(&rows)?;
        let batch = decoder.flush()?.context("no rows decoded")?;
        Ok(batch)
    }

    fn trace_json(&self, index: usize, trace: &Trace) -> Json {
        let resource_spans: Vec<Json> = trace
            .resource_spans
            .iter()
            .map(|rs| {
                let scope_spans: Vec<Json> = rs.scope_spans.iter().map(|ss| self.scope_json(ss)).collect();
                let mut resource = Map::new();
                resource.insert("ServiceName".into(), json!(rs.service_name));
                resource.insert("Attrs".into(), self.attrs_json(&rs.attrs));
                self.insert_dedicated(&mut resource, DedicatedColumnScope::Resource, &rs.dedicated);
                json!({ "Resource": resource, "ss": scope_spans })
            })
            .collect();

        json!({ "TraceID": format!("{index:032x}"), "rs": resource_spans })
    }

    fn scope_json(&self, ss: &ScopeSpans) -> Json {
        let mut scope = Map::new();
        scope.insert("Name".into(), json!(ss.name));
        scope.insert("Version".into(), json!(ss.version));
        if self.version.has_array_values() {
            scope.insert("Attrs".into(), self.attrs_json(&ss.attrs));
        }

        let spans: Vec<Json> = ss.spans.iter().map(|span| self.span_json(span)).collect();
        json!({ "Scope": scope, "Spans": spans })
    }

    fn span_json(&self, span: &Span) -> Json {
        let events: Vec<Json> = span
            .events
            .iter()
            .map(|event| {
                let mut obj = Map::new();
                obj.insert("Name".into(), json!(event.name));
                if self.version.has_array_values() {
                    obj.insert("Attrs".into(), self.attrs_json(&event.attrs));
                }
                if event_dedicated_slots(self.version) > 0 {
                    self.insert_dedicated(&mut obj, DedicatedColumnScope::Event, &event.dedicated);
                }
                Json::Object(obj)
            })
            .collect();

        let links: Vec<Json> = span
            .links
            .iter()
            .map(|link| {
                let mut obj = Map::new();
                obj.insert("SpanID".into(), json!(link.span_id));
                if self.version.has_array_values() {
                    obj.insert("Attrs".into(), self.attrs_json(&link.attrs));
                }
                Json::Object(obj)
            })
            .collect();

        let mut obj = Map::new();
        obj.insert("Name".into(), json!(span.name));
        obj.insert("Kind".into(), json!(span.kind));
        obj.insert("StatusCode".into(), json!(span.status_code));
        obj.insert("StatusMessage".into(), json!(span.status_message));
        obj.insert("HttpMethod".into(), json!(span.http_method));
        obj.insert("Attrs".into(), self.attrs_json(&span.attrs));
        self.insert_dedicated(&mut obj, DedicatedColumnScope::Span, &span.dedicated);
        obj.insert("Events".into(), json!(events));
        obj.insert("Links".into(), json!(links));
        Json::Object(obj)
    }

    fn attrs_json(&self, attrs: &[Attribute]) -> Json {
        let nested = self.version.has_array_values();
        let attrs: Vec<Json> = attrs
            .iter()
            .map(|attr| {
                let mut obj = Map::new();
                obj.insert("Key".into(), json!(attr.key));
                if nested {
                    obj.insert("IsArray".into(), json!(attr.is_array));
                }

                let (slot, values) = match &attr.value {
                    AttrValue::String(v) => ("Value", json!(v)),
                    AttrValue::Int(v) => ("ValueInt", json!(v)),
                    AttrValue::Double(v) => ("ValueDouble", json!(v)),
                    AttrValue::Bool(v) => ("ValueBool", json!(v)),
                };
                for column in VALUE_COLUMNS {
                    let value = match (column == slot, nested) {
                        (true, true) => values.clone(),
                        (true, false) => values.get(0).cloned().unwrap_or(Json::Null),
                        (false, true) => json!([]),
                        (false, false) => Json::Null,
                    };
                    obj.insert(column.into(), value);
                }
                Json::Object(obj)
            })
            .collect();
        json!(attrs)
    }

    /// Places values into the slots the meta assigns to their names
    fn insert_dedicated(
        &self,
        obj: &mut Map<String, Json>,
        scope: DedicatedColumnScope,
        values: &[(String, String)],
    ) {
        let slots = self.version.dedicated_string_slots();
        if slots == 0 {
            return;
        }

        let mut dedicated = Map::new();
        for slot in 1..=slots {
            dedicated.insert(format!("String{slot:02}"), Json::Null);
        }
        for (slot, column) in self.meta.dedicated_columns_for(scope).enumerate().take(slots) {
            if let Some((_, value)) = values.iter().find(|(name, _)| *name == column.name) {
                dedicated.insert(format!("String{:02}", slot + 1), json!(value));
            }
        }
        obj.insert("DedicatedAttributes".into(), Json::Object(dedicated));
    }
}

const VALUE_COLUMNS: [&str; 4] = ["Value", "ValueInt", "ValueDouble", "ValueBool"];

fn event_dedicated_slots(version: Version) -> usize {
    if version >= Version::V5 {
        version.dedicated_string_slots()
    } else {
        0
    }
}

fn list(name: &str, item: DataType) -> Field {
    Field::new(name, DataType::List(Arc::new(Field::new("element", item, false))), false)
}

fn attrs_field(version: Version) -> Field {
    let nested = version.has_array_values();
    let mut fields = vec![Field::new("Key", DataType::Utf8, false)];
    if nested {
        fields.push(Field::new("IsArray", DataType::Boolean, false));
    }
    for (name, data_type) in VALUE_COLUMNS.into_iter().zip([
        DataType::Utf8,
        DataType::Int64,
        DataType::Float64,
        DataType::Boolean,
    ]) {
        if nested {
            fields.push(list(name, data_type));
        } else {
            fields.push(Field::new(name, data_type, true));
        }
    }
    list("Attrs", DataType::Struct(Fields::from(fields)))
}

fn dedicated_field(slots: usize) -> Option<Field> {
    if slots == 0 {
        return None;
    }
    let fields: Fields = (1..=slots)
        .map(|slot| Field::new(format!("String{slot:02}"), DataType::Utf8, true))
        .collect();
    Some(Field::new("DedicatedAttributes", DataType::Struct(fields), false))
}

/// Nested trace schema of a block version, limited to the columns the
/// attribute scans read
pub fn trace_schema(version: Version) -> Schema {
    let nested = version.has_array_values();
    let slots = version.dedicated_string_slots();

    let mut resource = vec![Field::new("ServiceName", DataType::Utf8, false), attrs_field(version)];
    resource.extend(dedicated_field(slots));

    let mut scope = vec![
        Field::new("Name", DataType::Utf8, false),
        Field::new("Version", DataType::Utf8, false),
    ];
    let mut event = vec![Field::new("Name", DataType::Utf8, false)];
    let mut link = vec![Field::new("SpanID", DataType::Utf8, false)];
    if nested {
        scope.push(attrs_field(version));
        event.push(attrs_field(version));
        link.push(attrs_field(version));
    }
    event.extend(dedicated_field(event_dedicated_slots(version)));

    let mut span = vec![
        Field::new("Name", DataType::Utf8, false),
        Field::new("Kind", DataType::Int64, false),
        Field::new("StatusCode", DataType::Int64, false),
        Field::new("StatusMessage", DataType::Utf8, false),
        Field::new("HttpMethod", DataType::Utf8, true),
        attrs_field(version),
    ];
    span.extend(dedicated_field(slots));
    span.push(list("Events", DataType::Struct(Fields::from(event))));
    span.push(list("Links", DataType::Struct(Fields::from(link))));

    let scope_spans = vec![
        Field::new("Scope", DataType::Struct(Fields::from(scope)), false),
        list("Spans", DataType::Struct(Fields::from(span))),
    ];
    let resource_spans = vec![
        Field::new("Resource", DataType::Struct(Fields::from(resource)), false),
        list("ss", DataType::Struct(Fields::from(scope_spans))),
    ];

    Schema::new(vec![
        Field::new("TraceID", DataType::Utf8, false),
        list("rs", DataType::Struct(Fields::from(resource_spans))),
    ])
}

/// One trace holding `spans` spans of one service
pub fn trace_with_spans(service: &str, spans: Vec<Span>) -> Trace {
    Trace::new(vec![ResourceSpans::new(service).with_spans(spans)])
}

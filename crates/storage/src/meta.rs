//! Tempo block metadata (`meta.json`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope of an attribute stored in a dedicated column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedicatedColumnScope {
    Resource,
    #[default]
    Span,
    Event,
}

impl fmt::Display for DedicatedColumnScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DedicatedColumnScope::Resource => "resource",
            DedicatedColumnScope::Span => "span",
            DedicatedColumnScope::Event => "event",
        };
        f.write_str(s)
    }
}

/// Type of the values in a dedicated column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedicatedColumnType {
    #[default]
    String,
    Int,
}

/// A dedicated column assignment declared by the block.
///
/// Serialized with the short keys Tempo uses; scope and type fall back to
/// `span` and `string` when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedicatedColumn {
    #[serde(rename = "s", default)]
    pub scope: DedicatedColumnScope,

    #[serde(rename = "n")]
    pub name: String,

    #[serde(rename = "t", default)]
    pub column_type: DedicatedColumnType,
}

impl DedicatedColumn {
    pub fn new(scope: DedicatedColumnScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
            column_type: DedicatedColumnType::String,
        }
    }
}

/// Metadata describing one immutable block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMeta {
    /// Block encoding version, e.g. "vParquet4"
    #[serde(rename = "format")]
    pub version: String,

    #[serde(rename = "blockID")]
    pub block_id: String,

    #[serde(rename = "tenantID", default)]
    pub tenant_id: String,

    #[serde(rename = "startTime", default)]
    pub start_time: String,

    #[serde(rename = "endTime", default)]
    pub end_time: String,

    #[serde(rename = "totalObjects", default)]
    pub total_objects: i64,

    #[serde(default)]
    pub size: u64,

    #[serde(rename = "compactionLevel", default)]
    pub compaction_level: u8,

    #[serde(rename = "dedicatedColumns", default)]
    pub dedicated_columns: Vec<DedicatedColumn>,
}

impl BlockMeta {
    /// Creates metadata with only the fields the analysis relies on
    pub fn new(version: impl Into<String>, block_id: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            block_id: block_id.into(),
            tenant_id: String::new(),
            start_time: String::new(),
            end_time: String::new(),
            total_objects: 0,
            size: 0,
            compaction_level: 0,
            dedicated_columns: Vec::new(),
        }
    }

    pub fn with_dedicated_columns(mut self, columns: Vec<DedicatedColumn>) -> Self {
        self.dedicated_columns = columns;
        self
    }

    /// Dedicated string columns of one scope, in slot order
    pub fn dedicated_columns_for(
        &self,
        scope: DedicatedColumnScope,
    ) -> impl Iterator<Item = &DedicatedColumn> {
        self.dedicated_columns
            .iter()
            .filter(move |c| c.scope == scope && c.column_type == DedicatedColumnType::String)
    }

    pub fn start_time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.start_time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn end_time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.end_time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

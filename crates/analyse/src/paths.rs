//! Column paths of attribute data per block format version
//!
//! Every Tempo vParquet version stores generic attributes as a list of
//! key/value structs below each trace level, plus a fixed number of spare
//! "dedicated" string columns that are assigned to attribute names through
//! the block meta. This module maps a version string to those physical
//! column paths and the definition level the key/value columns share.

use crate::error::{AnalyseError, Result};
use crate::scope::ScopeMask;
use std::fmt;
use storage::DedicatedColumnScope;

pub const RESOURCE: &str = "rs.list.element.Resource";
pub const INSTRUMENTATION: &str = "rs.list.element.ss.list.element.Scope";
pub const SPAN: &str = "rs.list.element.ss.list.element.Spans.list.element";
pub const EVENT: &str = "rs.list.element.ss.list.element.Spans.list.element.Events.list.element";
pub const LINK: &str = "rs.list.element.ss.list.element.Spans.list.element.Links.list.element";

/// Definition levels of the attribute lists
pub mod definition_level {
    pub const RESOURCE_ATTRS: usize = 2;
    pub const INSTRUMENTATION_ATTRS: usize = 3;
    pub const SPAN_ATTRS: usize = 4;
    pub const EVENT_ATTRS: usize = 5;
    pub const LINK_ATTRS: usize = 5;
}

/// Known block format versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    V2,
    V3,
    V4,
    V5,
}

impl Version {
    pub fn parse(version: &str) -> Result<Self> {
        match version {
            "vParquet2" => Ok(Version::V2),
            "vParquet3" => Ok(Version::V3),
            "vParquet4" => Ok(Version::V4),
            "vParquet5" => Ok(Version::V5),
            other => Err(AnalyseError::UnsupportedVersion(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Version::V2 => "vParquet2",
            Version::V3 => "vParquet3",
            Version::V4 => "vParquet4",
            Version::V5 => "vParquet5",
        }
    }

    /// Number of spare dedicated string columns per scope
    pub fn dedicated_string_slots(self) -> usize {
        match self {
            Version::V2 => 0,
            Version::V3 | Version::V4 => 10,
            Version::V5 => 20,
        }
    }

    /// Attribute values are stored as lists with an IsArray flag
    pub fn has_array_values(self) -> bool {
        self >= Version::V4
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trace level an attribute list is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeScope {
    Resource,
    Instrumentation,
    Span,
    Event,
    Link,
}

impl AttributeScope {
    pub fn mask(self) -> ScopeMask {
        match self {
            AttributeScope::Resource => ScopeMask::RESOURCE,
            AttributeScope::Instrumentation => ScopeMask::SCOPE,
            AttributeScope::Span => ScopeMask::SPAN,
            AttributeScope::Event => ScopeMask::EVENT,
            AttributeScope::Link => ScopeMask::LINK,
        }
    }

    /// Block meta scope of the dedicated columns at this level
    pub fn dedicated_scope(self) -> Option<DedicatedColumnScope> {
        match self {
            AttributeScope::Resource => Some(DedicatedColumnScope::Resource),
            AttributeScope::Span => Some(DedicatedColumnScope::Span),
            AttributeScope::Event => Some(DedicatedColumnScope::Event),
            AttributeScope::Instrumentation | AttributeScope::Link => None,
        }
    }

    /// Row number level of the entity owning the attribute. Event and link
    /// attributes are attributed to their span.
    pub fn owner_level(self) -> usize {
        match self {
            AttributeScope::Resource => 1,
            AttributeScope::Instrumentation => 2,
            AttributeScope::Span | AttributeScope::Event | AttributeScope::Link => 3,
        }
    }

    /// Row number level of the entity itself
    pub fn entity_level(self) -> usize {
        match self {
            AttributeScope::Resource => 1,
            AttributeScope::Instrumentation => 2,
            AttributeScope::Span => 3,
            AttributeScope::Event | AttributeScope::Link => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeScope::Resource => "resource",
            AttributeScope::Instrumentation => "scope",
            AttributeScope::Span => "span",
            AttributeScope::Event => "event",
            AttributeScope::Link => "link",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            AttributeScope::Resource => RESOURCE,
            AttributeScope::Instrumentation => INSTRUMENTATION,
            AttributeScope::Span => SPAN,
            AttributeScope::Event => EVENT,
            AttributeScope::Link => LINK,
        }
    }

    fn definition_level(self) -> usize {
        match self {
            AttributeScope::Resource => definition_level::RESOURCE_ATTRS,
            AttributeScope::Instrumentation => definition_level::INSTRUMENTATION_ATTRS,
            AttributeScope::Span => definition_level::SPAN_ATTRS,
            AttributeScope::Event => definition_level::EVENT_ATTRS,
            AttributeScope::Link => definition_level::LINK_ATTRS,
        }
    }
}

impl fmt::Display for AttributeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical layout of one scope's attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeAttributePath {
    pub scope: AttributeScope,
    pub definition_level: usize,
    pub key_path: String,
    /// String value column
    pub value_path: String,
    pub value_int_path: String,
    pub value_double_path: String,
    pub value_bool_path: String,
    /// Absent before vParquet4
    pub is_array_path: Option<String>,
    /// Scope tag of the dedicated columns in the block meta
    pub dedicated_scope: Option<DedicatedColumnScope>,
    /// Spare dedicated string columns in slot order
    pub dedicated_column_paths: Vec<String>,
}

impl ScopeAttributePath {
    fn new(version: Version, scope: AttributeScope) -> Self {
        let attrs = format!("{}.Attrs.list.element", scope.prefix());
        let value = |column: &str| {
            if version.has_array_values() {
                format!("{}.{}.list.element", attrs, column)
            } else {
                format!("{}.{}", attrs, column)
            }
        };

        Self {
            scope,
            definition_level: scope.definition_level(),
            key_path: format!("{}.Key", attrs),
            value_path: value("Value"),
            value_int_path: value("ValueInt"),
            value_double_path: value("ValueDouble"),
            value_bool_path: value("ValueBool"),
            is_array_path: version
                .has_array_values()
                .then(|| format!("{}.IsArray", attrs)),
            dedicated_scope: scope.dedicated_scope(),
            dedicated_column_paths: dedicated_column_paths(version, scope),
        }
    }

    /// Typed value columns in lookup order: string, int, double, bool
    pub fn typed_value_paths(&self) -> [&str; 4] {
        [
            self.value_path.as_str(),
            self.value_int_path.as_str(),
            self.value_double_path.as_str(),
            self.value_bool_path.as_str(),
        ]
    }
}

fn dedicated_column_paths(version: Version, scope: AttributeScope) -> Vec<String> {
    let has_slots = match scope {
        AttributeScope::Resource | AttributeScope::Span => true,
        AttributeScope::Event => version >= Version::V5,
        AttributeScope::Instrumentation | AttributeScope::Link => false,
    };
    if !has_slots {
        return Vec::new();
    }

    (1..=version.dedicated_string_slots())
        .map(|slot| format!("{}.DedicatedAttributes.String{:02}", scope.prefix(), slot))
        .collect()
}

/// Attribute column layout of one block version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePaths {
    pub version: Version,
    pub resource: ScopeAttributePath,
    pub span: ScopeAttributePath,
    pub instrumentation: Option<ScopeAttributePath>,
    pub event: Option<ScopeAttributePath>,
    pub link: Option<ScopeAttributePath>,
}

impl AttributePaths {
    /// All scopes with generic attributes, outermost first
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeAttributePath> {
        [
            Some(&self.resource),
            self.instrumentation.as_ref(),
            Some(&self.span),
            self.event.as_ref(),
            self.link.as_ref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Resolves the attribute column layout for a block version string
pub fn paths_for_version(version: &str) -> Result<AttributePaths> {
    let version = Version::parse(version)?;
    let nested = version >= Version::V4;

    Ok(AttributePaths {
        version,
        resource: ScopeAttributePath::new(version, AttributeScope::Resource),
        span: ScopeAttributePath::new(version, AttributeScope::Span),
        instrumentation: nested
            .then(|| ScopeAttributePath::new(version, AttributeScope::Instrumentation)),
        event: nested.then(|| ScopeAttributePath::new(version, AttributeScope::Event)),
        link: nested.then(|| ScopeAttributePath::new(version, AttributeScope::Link)),
    })
}

/// A fixed column holding one attribute or intrinsic under a known name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedColumn {
    pub scope: AttributeScope,
    pub name: &'static str,
    pub path: String,
}

impl FixedColumn {
    fn new(scope: AttributeScope, name: &'static str, column: &str) -> Self {
        Self {
            scope,
            name,
            path: format!("{}.{}", scope.prefix(), column),
        }
    }
}

/// Well-known attributes stored in their own columns
pub fn well_known_columns() -> Vec<FixedColumn> {
    use AttributeScope::{Resource, Span};

    vec![
        FixedColumn::new(Resource, "service.name", "ServiceName"),
        FixedColumn::new(Resource, "cluster", "Cluster"),
        FixedColumn::new(Resource, "namespace", "Namespace"),
        FixedColumn::new(Resource, "pod", "Pod"),
        FixedColumn::new(Resource, "container", "Container"),
        FixedColumn::new(Resource, "k8s.cluster.name", "K8sClusterName"),
        FixedColumn::new(Resource, "k8s.namespace.name", "K8sNamespaceName"),
        FixedColumn::new(Resource, "k8s.pod.name", "K8sPodName"),
        FixedColumn::new(Resource, "k8s.container.name", "K8sContainerName"),
        FixedColumn::new(Span, "http.method", "HttpMethod"),
        FixedColumn::new(Span, "http.url", "HttpUrl"),
        FixedColumn::new(Span, "http.status_code", "HttpStatusCode"),
    ]
}

/// Intrinsic fields that can be indexed like attributes
pub fn intrinsic_columns() -> Vec<FixedColumn> {
    use AttributeScope::{Event, Instrumentation, Span};

    vec![
        FixedColumn::new(Instrumentation, "scope.name", "Name"),
        FixedColumn::new(Instrumentation, "version", "Version"),
        FixedColumn::new(Span, "name", "Name"),
        FixedColumn::new(Span, "kind", "Kind"),
        FixedColumn::new(Span, "status.code", "StatusCode"),
        FixedColumn::new(Span, "status.message", "StatusMessage"),
        FixedColumn::new(Event, "event.name", "Name"),
    ]
}

/// Required leaf column with exactly one value per entity of a scope
pub fn entity_column(scope: AttributeScope) -> String {
    match scope {
        AttributeScope::Resource => format!("{}.ServiceName", RESOURCE),
        AttributeScope::Instrumentation => format!("{}.Name", INSTRUMENTATION),
        AttributeScope::Span | AttributeScope::Event => format!("{}.Name", scope.prefix()),
        AttributeScope::Link => format!("{}.SpanID", LINK),
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use strum::{Display, EnumString};

/// Fixed deadline applied to the whole fan-out
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(2);

/// Maximum number of records returned by a single query
pub const MAX_RESULTS: usize = 200;

/// Identifies the backend connection that produced a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A symbol query, passed verbatim to every backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// Position in a text document (0-indexed line and UTF-16 character)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Range in a text document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Resource reference plus range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

/// Kind of a symbol, numbered as on the wire
///
/// Kinds outside the known set are kept as `Unknown` with their original
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
#[strum(ascii_case_insensitive)]
pub enum SymbolKind {
    File,
    Module,
    Namespace,
    Package,
    Class,
    Method,
    Property,
    Field,
    Constructor,
    Enum,
    Interface,
    Function,
    Variable,
    Constant,
    String,
    Number,
    Boolean,
    Array,
    Object,
    Key,
    Null,
    EnumMember,
    Struct,
    Event,
    Operator,
    TypeParameter,
    Unknown(u32),
}

impl From<u32> for SymbolKind {
    fn from(value: u32) -> Self {
        match value {
            1 => SymbolKind::File,
            2 => SymbolKind::Module,
            3 => SymbolKind::Namespace,
            4 => SymbolKind::Package,
            5 => SymbolKind::Class,
            6 => SymbolKind::Method,
            7 => SymbolKind::Property,
            8 => SymbolKind::Field,
            9 => SymbolKind::Constructor,
            10 => SymbolKind::Enum,
            11 => SymbolKind::Interface,
            12 => SymbolKind::Function,
            13 => SymbolKind::Variable,
            14 => SymbolKind::Constant,
            15 => SymbolKind::String,
            16 => SymbolKind::Number,
            17 => SymbolKind::Boolean,
            18 => SymbolKind::Array,
            19 => SymbolKind::Object,
            20 => SymbolKind::Key,
            21 => SymbolKind::Null,
            22 => SymbolKind::EnumMember,
            23 => SymbolKind::Struct,
            24 => SymbolKind::Event,
            25 => SymbolKind::Operator,
            26 => SymbolKind::TypeParameter,
            other => SymbolKind::Unknown(other),
        }
    }
}

impl From<SymbolKind> for u32 {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::File => 1,
            SymbolKind::Module => 2,
            SymbolKind::Namespace => 3,
            SymbolKind::Package => 4,
            SymbolKind::Class => 5,
            SymbolKind::Method => 6,
            SymbolKind::Property => 7,
            SymbolKind::Field => 8,
            SymbolKind::Constructor => 9,
            SymbolKind::Enum => 10,
            SymbolKind::Interface => 11,
            SymbolKind::Function => 12,
            SymbolKind::Variable => 13,
            SymbolKind::Constant => 14,
            SymbolKind::String => 15,
            SymbolKind::Number => 16,
            SymbolKind::Boolean => 17,
            SymbolKind::Array => 18,
            SymbolKind::Object => 19,
            SymbolKind::Key => 20,
            SymbolKind::Null => 21,
            SymbolKind::EnumMember => 22,
            SymbolKind::Struct => 23,
            SymbolKind::Event => 24,
            SymbolKind::Operator => 25,
            SymbolKind::TypeParameter => 26,
            SymbolKind::Unknown(other) => other,
        }
    }
}

/// Extra annotation on a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum SymbolTag {
    Deprecated,
    Unknown(u32),
}

impl From<u32> for SymbolTag {
    fn from(value: u32) -> Self {
        match value {
            1 => SymbolTag::Deprecated,
            other => SymbolTag::Unknown(other),
        }
    }
}

impl From<SymbolTag> for u32 {
    fn from(tag: SymbolTag) -> Self {
        match tag {
            SymbolTag::Deprecated => 1,
            SymbolTag::Unknown(other) => other,
        }
    }
}

/// Identifying information for a location that the origin backend resolves
/// on demand
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeferredLocation {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Canonical symbol record produced by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolRecord {
    name: String,
    kind: SymbolKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    container_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<SymbolTag>,
    deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deferred: Option<DeferredLocation>,
    origin: BackendId,
}

impl SymbolRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        kind: SymbolKind,
        container_name: Option<String>,
        tags: Vec<SymbolTag>,
        deprecated: bool,
        location: Option<Location>,
        deferred: Option<DeferredLocation>,
        origin: BackendId,
    ) -> Self {
        Self {
            name,
            kind,
            container_name,
            tags,
            deprecated,
            location,
            deferred,
            origin,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref()
    }

    pub fn tags(&self) -> &[SymbolTag] {
        &self.tags
    }

    /// Deprecated either through the legacy flag or the `Deprecated` tag
    pub fn is_deprecated(&self) -> bool {
        self.deprecated || self.tags.contains(&SymbolTag::Deprecated)
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn deferred(&self) -> Option<&DeferredLocation> {
        self.deferred.as_ref()
    }

    /// Backend that produced this record
    pub fn origin(&self) -> &BackendId {
        &self.origin
    }

    /// True when the range must be fetched from the origin backend before
    /// the symbol can be opened
    pub fn needs_resolution(&self) -> bool {
        self.location.is_none() && self.deferred.is_some()
    }

    /// Resource the symbol lives in, resolved or not
    pub fn uri(&self) -> Option<&str> {
        self.location
            .as_ref()
            .map(|l| l.uri.as_str())
            .or_else(|| self.deferred.as_ref().map(|d| d.uri.as_str()))
    }
}

/// Terminal state of one backend within a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    Responded,
    Failed,
    TimedOut,
}

/// What a single backend contributed to a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendOutcome {
    pub backend: BackendId,
    pub state: BackendState,
    pub record_count: usize,
}

/// Merged, truncated result of one query
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedResult {
    /// Records in backend arrival order
    pub records: Vec<SymbolRecord>,

    /// Per-backend outcome, in the order backends settled
    pub outcomes: Vec<BackendOutcome>,

    /// Records dropped by truncation
    pub truncated: usize,
}

impl AggregatedResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SymbolRecord> {
        self.records.iter()
    }

    /// Number of backends in the given terminal state
    pub fn count_in_state(&self, state: BackendState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    pub fn into_records(self) -> Vec<SymbolRecord> {
        self.records
    }
}

impl IntoIterator for AggregatedResult {
    type Item = SymbolRecord;
    type IntoIter = std::vec::IntoIter<SymbolRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a AggregatedResult {
    type Item = &'a SymbolRecord;
    type IntoIter = std::slice::Iter<'a, SymbolRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

//! Table types, operations and the rows a table serves.

use ropstate_codec::{PropertyTag, PropertyType, PropertyValue, RopId, TaggedPropertyValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of server table a session represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Contents,
    Hierarchy,
    Rules,
    Attachments,
    Permissions,
    /// A handle that names no recognized table.
    Invalid,
}

impl TableType {
    pub const ALL: [TableType; 6] = [
        TableType::Contents,
        TableType::Hierarchy,
        TableType::Rules,
        TableType::Attachments,
        TableType::Permissions,
        TableType::Invalid,
    ];
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableType::Contents => "contents",
            TableType::Hierarchy => "hierarchy",
            TableType::Rules => "rules",
            TableType::Attachments => "attachments",
            TableType::Permissions => "permissions",
            TableType::Invalid => "invalid",
        };
        write!(f, "{}", name)
    }
}

/// Table operations a session accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Release,
    SetColumns,
    SortTable,
    Restrict,
    QueryRows,
    GetStatus,
    QueryPosition,
    SeekRow,
    SeekRowBookmark,
    SeekRowFractional,
    CreateBookmark,
    Abort,
    QueryColumnsAll,
    FindRow,
    ExpandRow,
    CollapseRow,
    GetCollapseState,
    SetCollapseState,
    ResetTable,
    FreeBookmark,
}

impl Operation {
    pub const ALL: [Operation; 20] = [
        Operation::Release,
        Operation::SetColumns,
        Operation::SortTable,
        Operation::Restrict,
        Operation::QueryRows,
        Operation::GetStatus,
        Operation::QueryPosition,
        Operation::SeekRow,
        Operation::SeekRowBookmark,
        Operation::SeekRowFractional,
        Operation::CreateBookmark,
        Operation::Abort,
        Operation::QueryColumnsAll,
        Operation::FindRow,
        Operation::ExpandRow,
        Operation::CollapseRow,
        Operation::GetCollapseState,
        Operation::SetCollapseState,
        Operation::ResetTable,
        Operation::FreeBookmark,
    ];

    /// The table types this operation is declared for. Nothing else decides
    /// NotSupported for a table type.
    pub fn supported_on(self, table_type: TableType) -> bool {
        use TableType::*;
        match self {
            Operation::Release => true,
            Operation::SetColumns
            | Operation::Restrict
            | Operation::QueryRows
            | Operation::QueryPosition
            | Operation::SeekRow
            | Operation::SeekRowFractional
            | Operation::QueryColumnsAll
            | Operation::FindRow
            | Operation::GetStatus => matches!(table_type, Contents | Hierarchy | Rules),
            Operation::Abort
            | Operation::SeekRowBookmark
            | Operation::CreateBookmark
            | Operation::FreeBookmark => matches!(table_type, Contents | Hierarchy),
            Operation::SortTable
            | Operation::ResetTable
            | Operation::ExpandRow
            | Operation::CollapseRow
            | Operation::GetCollapseState
            | Operation::SetCollapseState => table_type == Contents,
        }
    }

    pub fn rop_id(self) -> RopId {
        match self {
            Operation::Release => RopId::Release,
            Operation::SetColumns => RopId::SetColumns,
            Operation::SortTable => RopId::SortTable,
            Operation::Restrict => RopId::Restrict,
            Operation::QueryRows => RopId::QueryRows,
            Operation::GetStatus => RopId::GetStatus,
            Operation::QueryPosition => RopId::QueryPosition,
            Operation::SeekRow => RopId::SeekRow,
            Operation::SeekRowBookmark => RopId::SeekRowBookmark,
            Operation::SeekRowFractional => RopId::SeekRowFractional,
            Operation::CreateBookmark => RopId::CreateBookmark,
            Operation::Abort => RopId::Abort,
            Operation::QueryColumnsAll => RopId::QueryColumnsAll,
            Operation::FindRow => RopId::FindRow,
            Operation::ExpandRow => RopId::ExpandRow,
            Operation::CollapseRow => RopId::CollapseRow,
            Operation::GetCollapseState => RopId::GetCollapseState,
            Operation::SetCollapseState => RopId::SetCollapseState,
            Operation::ResetTable => RopId::ResetTable,
            Operation::FreeBookmark => RopId::FreeBookmark,
        }
    }

    pub fn from_rop_id(rop_id: RopId) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.rop_id() == rop_id)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rop_id())
    }
}

/// A server-side row. Property ids are unique within a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: u64,
    #[serde(default)]
    pub values: Vec<TaggedPropertyValue>,
}

impl Row {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            values: Vec::new(),
        }
    }

    pub fn with(mut self, tag: PropertyTag, value: PropertyValue) -> Self {
        self.values.retain(|v| !v.tag.same_property(tag));
        self.values.push(TaggedPropertyValue::new(tag, value));
        self
    }

    /// The value for `tag`. An Unspecified tag matches any type; otherwise
    /// the stored type must equal the requested one.
    pub fn value(&self, tag: PropertyTag) -> Option<&PropertyValue> {
        self.values
            .iter()
            .find(|v| v.tag.same_property(tag))
            .map(|v| &v.value)
            .filter(|v| tag.prop_type == PropertyType::Unspecified || v.prop_type() == tag.prop_type)
    }
}

/// Everything the table holds: the full column set and its rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableContents {
    #[serde(default)]
    pub columns: Vec<PropertyTag>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl TableContents {
    pub fn new(columns: Vec<PropertyTag>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }
}

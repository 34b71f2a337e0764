//! Per-generation server behavior.
//!
//! Servers disagree on a fixed set of table outcomes. Each divergence point
//! is a named field with a closed set of choices; a session receives one
//! [`ServerBehavior`] at construction and never changes it. There is no
//! default: callers pick a [`ServerGeneration`] preset or spell out every
//! field.

use ropstate_codec::BookmarkOrigin;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of a row-producing operation issued before any successful
/// SetColumns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingColumns {
    NullObject,
    Unspecified,
}

/// What a failed SetColumns, SortTable or Restrict does to the previous
/// successful setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedOperation {
    Invalidate,
    Retain,
}

/// Origin reported by a backward QueryRows that reaches the first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedOrigin {
    Beginning,
    End,
}

impl ExhaustedOrigin {
    pub fn origin(self) -> BookmarkOrigin {
        match self {
            ExhaustedOrigin::Beginning => BookmarkOrigin::Beginning,
            ExhaustedOrigin::End => BookmarkOrigin::End,
        }
    }
}

/// Outcome of using a bookmark made stale by a later reset, sort or restrict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleBookmark {
    Succeed,
    InvalidBookmark,
}

/// What invalidated a bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleCause {
    Reset,
    Sort,
    Restrict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaleBookmarkPolicy {
    pub after_reset: StaleBookmark,
    pub after_sort: StaleBookmark,
    pub after_restrict: StaleBookmark,
}

impl StaleBookmarkPolicy {
    pub fn uniform(choice: StaleBookmark) -> Self {
        Self {
            after_reset: choice,
            after_sort: choice,
            after_restrict: choice,
        }
    }

    pub fn for_cause(&self, cause: StaleCause) -> StaleBookmark {
        match cause {
            StaleCause::Reset => self.after_reset,
            StaleCause::Sort => self.after_sort,
            StaleCause::Restrict => self.after_restrict,
        }
    }
}

/// FreeBookmark on a contents table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeBookmarkSupport {
    Supported,
    Unspecified,
}

/// ExpandRow with a non-zero MaxRowCount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxRowCountSupport {
    Supported,
    NotSupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Implementation {
    Implemented,
    NotImplemented,
}

/// RowNoLongerVisible reported by FindRow on hierarchy tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindRowVisibility {
    /// Report whether the bookmarked row is still visible.
    Reported,
    /// Always report the row as visible.
    AlwaysVisible,
}

/// Per-operation outcome when no column set is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnsRequired {
    pub query_rows: MissingColumns,
    pub find_row: MissingColumns,
    pub seek_row_bookmark: MissingColumns,
    pub free_bookmark: MissingColumns,
    pub expand_row: MissingColumns,
    pub collapse_row: MissingColumns,
    pub get_collapse_state: MissingColumns,
    pub set_collapse_state: MissingColumns,
}

impl ColumnsRequired {
    pub fn uniform(choice: MissingColumns) -> Self {
        Self {
            query_rows: choice,
            find_row: choice,
            seek_row_bookmark: choice,
            free_bookmark: choice,
            expand_row: choice,
            collapse_row: choice,
            get_collapse_state: choice,
            set_collapse_state: choice,
        }
    }
}

/// Every version-dependent table outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerBehavior {
    pub columns_required: ColumnsRequired,
    pub failed_set_columns: FailedOperation,
    pub failed_sort_table: FailedOperation,
    pub failed_restrict: FailedOperation,
    pub backward_exhausted_origin: ExhaustedOrigin,
    pub seek_row_bookmark_stale: StaleBookmarkPolicy,
    pub find_row_stale: StaleBookmarkPolicy,
    pub free_bookmark_on_contents: FreeBookmarkSupport,
    pub expand_row_max_row_count: MaxRowCountSupport,
    pub abort: Implementation,
    pub get_status: Implementation,
    pub hierarchy_find_row_visibility: FindRowVisibility,
}

/// Named server generations with known behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerGeneration {
    Exchange2007,
    Exchange2010,
    Exchange2013,
}

impl ServerGeneration {
    pub const ALL: [ServerGeneration; 3] = [
        ServerGeneration::Exchange2007,
        ServerGeneration::Exchange2010,
        ServerGeneration::Exchange2013,
    ];

    pub fn preset(self) -> ServerBehavior {
        match self {
            ServerGeneration::Exchange2007 => ServerBehavior {
                columns_required: ColumnsRequired::uniform(MissingColumns::Unspecified),
                failed_set_columns: FailedOperation::Invalidate,
                failed_sort_table: FailedOperation::Invalidate,
                failed_restrict: FailedOperation::Invalidate,
                backward_exhausted_origin: ExhaustedOrigin::Beginning,
                seek_row_bookmark_stale: StaleBookmarkPolicy::uniform(StaleBookmark::Succeed),
                find_row_stale: StaleBookmarkPolicy::uniform(StaleBookmark::Succeed),
                free_bookmark_on_contents: FreeBookmarkSupport::Unspecified,
                expand_row_max_row_count: MaxRowCountSupport::Supported,
                abort: Implementation::Implemented,
                get_status: Implementation::Implemented,
                hierarchy_find_row_visibility: FindRowVisibility::AlwaysVisible,
            },
            ServerGeneration::Exchange2010 => ServerBehavior {
                columns_required: ColumnsRequired::uniform(MissingColumns::NullObject),
                failed_set_columns: FailedOperation::Invalidate,
                failed_sort_table: FailedOperation::Invalidate,
                failed_restrict: FailedOperation::Invalidate,
                backward_exhausted_origin: ExhaustedOrigin::End,
                seek_row_bookmark_stale: StaleBookmarkPolicy::uniform(
                    StaleBookmark::InvalidBookmark,
                ),
                find_row_stale: StaleBookmarkPolicy::uniform(StaleBookmark::InvalidBookmark),
                free_bookmark_on_contents: FreeBookmarkSupport::Supported,
                expand_row_max_row_count: MaxRowCountSupport::Supported,
                abort: Implementation::Implemented,
                get_status: Implementation::Implemented,
                hierarchy_find_row_visibility: FindRowVisibility::AlwaysVisible,
            },
            ServerGeneration::Exchange2013 => ServerBehavior {
                expand_row_max_row_count: MaxRowCountSupport::NotSupported,
                hierarchy_find_row_visibility: FindRowVisibility::Reported,
                ..ServerGeneration::Exchange2010.preset()
            },
        }
    }
}

impl fmt::Display for ServerGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerGeneration::Exchange2007 => "exchange2007",
            ServerGeneration::Exchange2010 => "exchange2010",
            ServerGeneration::Exchange2013 => "exchange2013",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ServerGeneration {
    type Err = String;

    /// Accepts `exchange2010`, `exchange_2010`, `Exchange2010` or `2010`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        let year = normalized.strip_prefix("exchange").unwrap_or(&normalized);
        match year {
            "2007" => Ok(ServerGeneration::Exchange2007),
            "2010" => Ok(ServerGeneration::Exchange2010),
            "2013" => Ok(ServerGeneration::Exchange2013),
            _ => Err(format!("unknown server generation: {}", s)),
        }
    }
}

impl From<ServerGeneration> for ServerBehavior {
    fn from(generation: ServerGeneration) -> Self {
        generation.preset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_diverge_where_expected() {
        let b2007 = ServerGeneration::Exchange2007.preset();
        let b2010 = ServerGeneration::Exchange2010.preset();
        let b2013 = ServerGeneration::Exchange2013.preset();

        assert_eq!(b2007.columns_required.query_rows, MissingColumns::Unspecified);
        assert_eq!(b2010.columns_required.query_rows, MissingColumns::NullObject);
        assert_eq!(b2007.backward_exhausted_origin.origin(), BookmarkOrigin::Beginning);
        assert_eq!(b2010.backward_exhausted_origin.origin(), BookmarkOrigin::End);
        assert_eq!(
            b2007.seek_row_bookmark_stale.for_cause(StaleCause::Reset),
            StaleBookmark::Succeed
        );
        assert_eq!(
            b2010.seek_row_bookmark_stale.for_cause(StaleCause::Sort),
            StaleBookmark::InvalidBookmark
        );
        assert_eq!(b2010.expand_row_max_row_count, MaxRowCountSupport::Supported);
        assert_eq!(b2013.expand_row_max_row_count, MaxRowCountSupport::NotSupported);
        assert_eq!(b2013.hierarchy_find_row_visibility, FindRowVisibility::Reported);
        assert_eq!(b2013.free_bookmark_on_contents, b2010.free_bookmark_on_contents);
    }

    #[test]
    fn test_generation_parsing() {
        assert_eq!("2010".parse(), Ok(ServerGeneration::Exchange2010));
        assert_eq!("Exchange_2013".parse(), Ok(ServerGeneration::Exchange2013));
        assert_eq!("exchange2007".parse(), Ok(ServerGeneration::Exchange2007));
        assert!("2016".parse::<ServerGeneration>().is_err());
        for generation in ServerGeneration::ALL {
            assert_eq!(generation.to_string().parse(), Ok(generation));
        }
    }

    #[test]
    fn test_behavior_yaml_requires_every_field() {
        let yaml = serde_yaml::to_string(&ServerGeneration::Exchange2010.preset()).unwrap();
        let parsed: ServerBehavior = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, ServerGeneration::Exchange2010.preset());

        let partial = "failed_set_columns: retain\n";
        assert!(serde_yaml::from_str::<ServerBehavior>(partial).is_err());
    }
}

//! Table session - the cursor state machine for one table handle.
//!
//! Every operation goes through the same admission sequence before its own
//! checks run:
//!
//! 1. the table-type gate (NotSupported)
//! 2. the generation's implementation gate for Abort and GetStatus
//!    (NotImplemented)
//! 3. the released check (NullObject)
//! 4. settling of pending asynchronous work, except for GetStatus and Abort

use crate::behavior::{
    FailedOperation, FindRowVisibility, FreeBookmarkSupport, Implementation, MaxRowCountSupport,
    MissingColumns, ServerBehavior, StaleBookmarkPolicy, StaleCause,
};
use crate::bookmark::{Anchor, Bookmark, BookmarkState, BookmarkTable, RowKey};
use crate::collapse::{CategoryState, CollapseState};
use crate::config::LimitsConfig;
use crate::error::TableError;
use crate::filter;
use crate::table::{Operation, TableContents, TableType};
use crate::view::{SortSpec, View};
use ropstate_codec::table::{
    AbortResponse, CollapseRowResponse, CreateBookmarkResponse, ExpandRowResponse,
    FindRowResponse, FreeBookmarkResponse, GetCollapseStateResponse, GetStatusResponse,
    QueryColumnsAllResponse, QueryPositionResponse, QueryRowsResponse, ResetTableResponse,
    RestrictResponse, SeekRowBookmarkResponse, SeekRowFractionalResponse, SeekRowResponse,
    SetCollapseStateResponse, SetColumnsResponse, SortTableResponse,
};
use ropstate_codec::{
    BookmarkOrigin, PropertyTag, PropertyType, QueryRowsFlags, Restriction, TableFlags,
    TableStatus,
};
use std::collections::HashMap;

/// State restored by Abort.
#[derive(Debug, Clone)]
struct Snapshot {
    columns: Option<Vec<PropertyTag>>,
    sort: Option<SortSpec>,
    restriction: Option<Restriction>,
    overrides: HashMap<u64, bool>,
    cursor: usize,
    bookmarks: BookmarkTable,
}

#[derive(Debug, Clone)]
pub struct TableSession {
    table_type: TableType,
    behavior: ServerBehavior,
    contents: TableContents,
    max_rows_per_query: u16,

    columns: Option<Vec<PropertyTag>>,
    sort: Option<SortSpec>,
    restriction: Option<Restriction>,
    overrides: HashMap<u64, bool>,
    view: View,

    cursor: usize,
    bookmarks: BookmarkTable,
    bookmark_created: bool,

    reset_done: bool,
    released: bool,
    status: TableStatus,
    pending: Option<Snapshot>,
}

impl TableSession {
    pub fn new(table_type: TableType, behavior: ServerBehavior, contents: TableContents) -> Self {
        let mut session = Self {
            table_type,
            behavior,
            contents,
            max_rows_per_query: LimitsConfig::default().max_rows_per_query,
            columns: None,
            sort: None,
            restriction: None,
            overrides: HashMap::new(),
            view: View::default(),
            cursor: 0,
            bookmarks: BookmarkTable::new(),
            bookmark_created: false,
            reset_done: false,
            released: false,
            status: TableStatus::Complete,
            pending: None,
        };
        session.rebuild();
        session
    }

    pub fn with_max_rows(mut self, max_rows_per_query: u16) -> Self {
        self.max_rows_per_query = max_rows_per_query.max(1);
        self
    }

    /// Re-initializes the session as a fresh table of `table_type`. Column,
    /// sort, restriction, cursor and bookmark state are all discarded.
    pub fn initialize(&mut self, table_type: TableType) {
        self.table_type = table_type;
        self.columns = None;
        self.sort = None;
        self.restriction = None;
        self.overrides.clear();
        self.cursor = 0;
        self.bookmarks = BookmarkTable::new();
        self.bookmark_created = false;
        self.reset_done = false;
        self.released = false;
        self.status = TableStatus::Complete;
        self.pending = None;
        self.rebuild();
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    pub fn behavior(&self) -> &ServerBehavior {
        &self.behavior
    }

    /// The column set in effect, if any.
    pub fn columns(&self) -> Option<&[PropertyTag]> {
        self.columns.as_deref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The cursor expressed as a predefined bookmark.
    pub fn cursor_origin(&self) -> BookmarkOrigin {
        if self.cursor == 0 {
            BookmarkOrigin::Beginning
        } else if self.cursor >= self.view.len() {
            BookmarkOrigin::End
        } else {
            BookmarkOrigin::Current
        }
    }

    pub fn row_count(&self) -> usize {
        self.view.len()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn status(&self) -> TableStatus {
        self.status
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn reset_done(&self) -> bool {
        self.reset_done
    }

    pub fn bookmark_created(&self) -> bool {
        self.bookmark_created
    }

    pub fn bookmark(&self, bytes: &[u8]) -> Option<&Bookmark> {
        self.bookmarks.lookup(bytes).ok()
    }

    // -----------------------------------------------------------------------
    // Admission and shared helpers
    // -----------------------------------------------------------------------

    fn admit(&mut self, op: Operation) -> Result<(), TableError> {
        if !op.supported_on(self.table_type) {
            return Err(TableError::NotSupported {
                op,
                table_type: self.table_type,
            });
        }
        let implementation = match op {
            Operation::Abort => self.behavior.abort,
            Operation::GetStatus => self.behavior.get_status,
            _ => Implementation::Implemented,
        };
        if implementation == Implementation::NotImplemented {
            return Err(TableError::NotImplemented { op });
        }
        if self.released {
            return Err(TableError::null_object("table was released"));
        }
        if !matches!(op, Operation::GetStatus | Operation::Abort) {
            self.settle();
        }
        Ok(())
    }

    fn run<T>(
        &mut self,
        op: Operation,
        f: impl FnOnce(&mut Self) -> Result<T, TableError>,
    ) -> Result<T, TableError> {
        let result = self.admit(op).and_then(|()| f(self));
        match &result {
            Ok(_) => tracing::debug!("{} on {} table: success", op, self.table_type),
            Err(e @ TableError::Unspecified { .. }) => {
                tracing::warn!("{} on {} table: {}", op, self.table_type, e)
            }
            Err(e) => tracing::debug!("{} on {} table: {} ({})", op, self.table_type, e.code(), e),
        }
        result
    }

    fn require_columns(
        &self,
        op: Operation,
        choice: MissingColumns,
    ) -> Result<Vec<PropertyTag>, TableError> {
        match (&self.columns, choice) {
            (Some(columns), _) => Ok(columns.clone()),
            (None, MissingColumns::NullObject) => {
                Err(TableError::null_object("no column set is in effect"))
            }
            (None, MissingColumns::Unspecified) => Err(TableError::Unspecified {
                op,
                reason: "no column set is in effect".to_string(),
            }),
        }
    }

    fn rebuild(&mut self) {
        self.view = View::build(
            &self.contents.rows,
            self.restriction.as_ref(),
            self.sort.as_ref(),
            &self.overrides,
        );
        self.cursor = self.cursor.min(self.view.len());
    }

    /// Rebuilds while keeping the cursor on the same row where possible.
    fn rebuild_anchored(&mut self, fallback: impl FnOnce(&View) -> usize) {
        let key = self.view.key_at(self.cursor);
        self.rebuild();
        self.cursor = match key {
            Some(key) => self
                .view
                .position_of(key)
                .unwrap_or_else(|| fallback(&self.view)),
            None => self.view.len(),
        };
        self.cursor = self.cursor.min(self.view.len());
    }

    fn drop_rejected_bookmarks(&mut self) {
        self.bookmarks.drop_rejected(&[
            &self.behavior.seek_row_bookmark_stale,
            &self.behavior.find_row_stale,
        ]);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            columns: self.columns.clone(),
            sort: self.sort.clone(),
            restriction: self.restriction.clone(),
            overrides: self.overrides.clone(),
            cursor: self.cursor,
            bookmarks: self.bookmarks.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.columns = snapshot.columns;
        self.sort = snapshot.sort;
        self.restriction = snapshot.restriction;
        self.overrides = snapshot.overrides;
        self.bookmarks = snapshot.bookmarks;
        self.rebuild();
        self.cursor = snapshot.cursor.min(self.view.len());
    }

    /// Completes any pending asynchronous operation.
    fn settle(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("asynchronous {:?} completed", self.status);
        }
        self.status = TableStatus::Complete;
    }

    /// Records the outcome of SetColumns, SortTable or Restrict.
    fn finish(&mut self, before: Option<Snapshot>, in_progress: TableStatus) -> TableStatus {
        if let Some(snapshot) = before {
            self.pending = Some(snapshot);
            self.status = in_progress;
        }
        self.status
    }

    fn anchor_here(&self) -> Anchor {
        Anchor {
            key: self.view.key_at(self.cursor),
            position: self.cursor,
        }
    }

    /// Position of a bookmark in the current view and whether its row has
    /// gone away.
    fn resolve(&self, anchor: &Anchor) -> (usize, bool) {
        match anchor.key {
            Some(key) => match self.view.position_of(key) {
                Some(position) => (position, false),
                None => (anchor.position.min(self.view.len()), true),
            },
            None => (self.view.len(), false),
        }
    }

    /// Looks up a custom bookmark for seeking or finding.
    fn live_bookmark(
        &self,
        bytes: &[u8],
        policy: &StaleBookmarkPolicy,
    ) -> Result<Anchor, TableError> {
        let bookmark = self.bookmarks.lookup(bytes)?;
        bookmark.check_stale(policy)?;
        Ok(bookmark.anchor)
    }

    fn seek_from(
        &mut self,
        base: usize,
        row_count: i32,
        want_row_moved_count: bool,
    ) -> (bool, i32) {
        let len = self.view.len() as i64;
        let target = base as i64 + row_count as i64;
        let clamped = target.clamp(0, len);
        self.cursor = clamped as usize;
        if want_row_moved_count {
            (clamped != target, (clamped - base as i64) as i32)
        } else {
            (false, 0)
        }
    }

    // -----------------------------------------------------------------------
    // Column, sort and restriction
    // -----------------------------------------------------------------------

    pub fn set_columns(
        &mut self,
        flags: TableFlags,
        columns: Vec<PropertyTag>,
    ) -> Result<SetColumnsResponse, TableError> {
        self.run(Operation::SetColumns, |s| {
            let invalid = if columns.is_empty() {
                Some("column set is empty".to_string())
            } else {
                columns
                    .iter()
                    .find(|c| {
                        matches!(
                            c.prop_type,
                            PropertyType::Unspecified
                                | PropertyType::ErrorCode
                                | PropertyType::Unknown(_)
                        )
                    })
                    .map(|c| format!("column {:#010x} has an unresolvable type", c.as_u32()))
            };
            if let Some(reason) = invalid {
                if s.behavior.failed_set_columns == FailedOperation::Invalidate {
                    s.columns = None;
                }
                return Err(TableError::invalid_parameter(reason));
            }

            let before = flags.is_async().then(|| s.snapshot());
            s.columns = Some(columns);
            let table_status = s.finish(before, TableStatus::SettingColumns);
            Ok(SetColumnsResponse { table_status })
        })
    }

    pub fn sort_table(
        &mut self,
        flags: TableFlags,
        sort: SortSpec,
    ) -> Result<SortTableResponse, TableError> {
        self.run(Operation::SortTable, |s| {
            if let Err(e) = sort.validate() {
                if s.behavior.failed_sort_table == FailedOperation::Invalidate {
                    s.sort = None;
                    s.rebuild();
                    s.cursor = 0;
                }
                return Err(e);
            }

            let before = flags.is_async().then(|| s.snapshot());
            s.bookmarks.invalidate_all(StaleCause::Sort);
            s.drop_rejected_bookmarks();
            s.sort = Some(sort);
            s.overrides.clear();
            s.rebuild();
            s.cursor = 0;
            let table_status = s.finish(before, TableStatus::Sorting);
            Ok(SortTableResponse { table_status })
        })
    }

    /// Applies a restriction, or removes it when `restriction` is `None`.
    pub fn restrict(
        &mut self,
        flags: TableFlags,
        restriction: Option<Restriction>,
    ) -> Result<RestrictResponse, TableError> {
        self.run(Operation::Restrict, |s| {
            if let Some(r) = &restriction {
                if let Err(e) = filter::validate(r) {
                    if s.behavior.failed_restrict == FailedOperation::Invalidate {
                        s.restriction = None;
                        s.rebuild();
                        s.cursor = 0;
                    }
                    return Err(e);
                }
            }

            let before = flags.is_async().then(|| s.snapshot());
            s.bookmarks.invalidate_all(StaleCause::Restrict);
            s.drop_rejected_bookmarks();
            s.restriction = restriction;
            s.rebuild();
            s.cursor = 0;
            let table_status = s.finish(before, TableStatus::Restricting);
            Ok(RestrictResponse { table_status })
        })
    }

    // -----------------------------------------------------------------------
    // Reading and positioning
    // -----------------------------------------------------------------------

    pub fn query_rows(
        &mut self,
        flags: QueryRowsFlags,
        forward_read: bool,
        row_count: u16,
    ) -> Result<QueryRowsResponse, TableError> {
        self.run(Operation::QueryRows, |s| {
            if row_count == 0 {
                return Err(TableError::invalid_parameter("RowCount must be non-zero"));
            }
            let columns =
                s.require_columns(Operation::QueryRows, s.behavior.columns_required.query_rows)?;
            let count = row_count.min(s.max_rows_per_query) as usize;
            let len = s.view.len();

            let (rows, new_cursor, origin) = if forward_read {
                let end = (s.cursor + count).min(len);
                let rows = s.view.project_range(s.cursor..end, &columns);
                let origin = if end == len {
                    BookmarkOrigin::End
                } else {
                    BookmarkOrigin::Current
                };
                (rows, end, origin)
            } else {
                let start = s.cursor.saturating_sub(count);
                let rows = s.view.project_range((start..s.cursor).rev(), &columns);
                let origin = if start == 0 {
                    s.behavior.backward_exhausted_origin.origin()
                } else {
                    BookmarkOrigin::Current
                };
                (rows, start, origin)
            };

            if !flags.no_advance() {
                s.cursor = new_cursor;
            }
            Ok(QueryRowsResponse { origin, rows })
        })
    }

    pub fn query_position(&mut self) -> Result<QueryPositionResponse, TableError> {
        self.run(Operation::QueryPosition, |s| {
            Ok(QueryPositionResponse {
                numerator: s.cursor as u32,
                denominator: s.view.len() as u32,
            })
        })
    }

    pub fn seek_row(
        &mut self,
        origin: BookmarkOrigin,
        row_count: i32,
        want_row_moved_count: bool,
    ) -> Result<SeekRowResponse, TableError> {
        self.run(Operation::SeekRow, |s| {
            let base = match origin {
                BookmarkOrigin::Beginning => 0,
                BookmarkOrigin::Current => s.cursor,
                BookmarkOrigin::End => s.view.len(),
                BookmarkOrigin::Custom => {
                    return Err(TableError::invalid_parameter(
                        "SeekRow does not accept a custom origin",
                    ))
                }
            };
            let (has_sought_less, rows_sought) = s.seek_from(base, row_count, want_row_moved_count);
            Ok(SeekRowResponse {
                has_sought_less,
                rows_sought,
            })
        })
    }

    pub fn seek_row_bookmark(
        &mut self,
        bookmark: &[u8],
        row_count: i32,
        want_row_moved_count: bool,
    ) -> Result<SeekRowBookmarkResponse, TableError> {
        self.run(Operation::SeekRowBookmark, |s| {
            if !s.reset_done {
                s.require_columns(
                    Operation::SeekRowBookmark,
                    s.behavior.columns_required.seek_row_bookmark,
                )?;
            }
            let anchor = s.live_bookmark(bookmark, &s.behavior.seek_row_bookmark_stale)?;
            let (base, row_no_longer_visible) = s.resolve(&anchor);
            let (has_sought_less, rows_sought) = s.seek_from(base, row_count, want_row_moved_count);
            Ok(SeekRowBookmarkResponse {
                row_no_longer_visible,
                has_sought_less,
                rows_sought,
            })
        })
    }

    /// Moves to `numerator / denominator` of the way through the table.
    pub fn seek_row_fractional(
        &mut self,
        numerator: u32,
        denominator: u32,
    ) -> Result<SeekRowFractionalResponse, TableError> {
        self.run(Operation::SeekRowFractional, |s| {
            let len = s.view.len();
            s.cursor = if numerator == 0 {
                0
            } else if numerator >= denominator {
                len
            } else {
                (numerator as u64 * len as u64 / denominator as u64) as usize
            };
            Ok(SeekRowFractionalResponse)
        })
    }

    pub fn create_bookmark(&mut self) -> Result<CreateBookmarkResponse, TableError> {
        self.run(Operation::CreateBookmark, |s| {
            let bookmark = s.bookmarks.create(s.anchor_here());
            s.bookmark_created = true;
            Ok(CreateBookmarkResponse { bookmark })
        })
    }

    pub fn query_columns_all(&mut self) -> Result<QueryColumnsAllResponse, TableError> {
        self.run(Operation::QueryColumnsAll, |s| {
            Ok(QueryColumnsAllResponse {
                columns: s.contents.columns.clone(),
            })
        })
    }

    pub fn find_row(
        &mut self,
        backward: bool,
        restriction: Option<&Restriction>,
        origin: BookmarkOrigin,
        bookmark: &[u8],
    ) -> Result<FindRowResponse, TableError> {
        self.run(Operation::FindRow, |s| {
            let columns =
                s.require_columns(Operation::FindRow, s.behavior.columns_required.find_row)?;
            let restriction = restriction
                .ok_or_else(|| TableError::invalid_parameter("FindRow requires a restriction"))?;
            filter::validate(restriction)?;

            let (start, stale_row) = match origin {
                BookmarkOrigin::Beginning => (0, false),
                BookmarkOrigin::Current => (s.cursor, false),
                BookmarkOrigin::End => (s.view.len(), false),
                BookmarkOrigin::Custom => {
                    let anchor = s.live_bookmark(bookmark, &s.behavior.find_row_stale)?;
                    s.resolve(&anchor)
                }
            };
            let visibility = s.behavior.hierarchy_find_row_visibility;
            let row_no_longer_visible = match (s.table_type, visibility) {
                (TableType::Hierarchy, FindRowVisibility::AlwaysVisible) => false,
                _ => stale_row,
            };

            let is_match = |p: &usize| {
                s.view
                    .leaf_at(*p)
                    .is_some_and(|row| filter::matches(restriction, row))
            };
            let found = if backward {
                (0..start).rev().find(is_match)
            } else {
                (start..s.view.len()).find(is_match)
            };

            let row = match found {
                Some(position) => {
                    s.cursor = position;
                    s.view.project(position, &columns)
                }
                None => None,
            };
            Ok(FindRowResponse {
                row_no_longer_visible,
                row,
            })
        })
    }

    pub fn free_bookmark(&mut self, bookmark: &[u8]) -> Result<FreeBookmarkResponse, TableError> {
        self.run(Operation::FreeBookmark, |s| {
            if s.table_type == TableType::Contents
                && s.behavior.free_bookmark_on_contents == FreeBookmarkSupport::Unspecified
            {
                return Err(TableError::Unspecified {
                    op: Operation::FreeBookmark,
                    reason: "FreeBookmark on a contents table".to_string(),
                });
            }
            if !s.reset_done {
                s.require_columns(
                    Operation::FreeBookmark,
                    s.behavior.columns_required.free_bookmark,
                )?;
            }

            // A stale bookmark is forgotten even though the call fails.
            match s.bookmarks.free(bookmark)? {
                BookmarkState::Stale(causes) if causes.contains(&StaleCause::Reset) => Err(
                    TableError::null_object("bookmark was invalidated by ResetTable"),
                ),
                BookmarkState::Stale(causes) => Err(TableError::invalid_bookmark(format!(
                    "bookmark invalidated by {:?}",
                    causes
                ))),
                BookmarkState::Live => Ok(FreeBookmarkResponse),
            }
        })
    }

    /// Removes the restriction, clears the column set, rewinds the cursor
    /// and invalidates every bookmark. The sort order stays.
    pub fn reset_table(&mut self) -> Result<ResetTableResponse, TableError> {
        self.run(Operation::ResetTable, |s| {
            s.bookmarks.invalidate_all(StaleCause::Reset);
            s.restriction = None;
            s.columns = None;
            s.rebuild();
            s.cursor = 0;
            s.reset_done = true;
            Ok(ResetTableResponse)
        })
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    pub fn expand_row(
        &mut self,
        max_row_count: u16,
        category_id: u64,
    ) -> Result<ExpandRowResponse, TableError> {
        self.run(Operation::ExpandRow, |s| {
            if max_row_count > 0
                && s.behavior.expand_row_max_row_count == MaxRowCountSupport::NotSupported
            {
                return Err(TableError::ParameterNotSupported {
                    op: Operation::ExpandRow,
                    reason: format!("MaxRowCount {} must be zero", max_row_count),
                });
            }
            match s.view.header(category_id) {
                None => return Err(TableError::NotFound { category_id }),
                Some(h) if h.expanded => return Err(TableError::NotCollapsed { category_id }),
                Some(_) => {}
            }
            let columns =
                s.require_columns(Operation::ExpandRow, s.behavior.columns_required.expand_row)?;

            let before = s.view.len();
            s.overrides.insert(category_id, true);
            s.rebuild_anchored(|_| 0);
            let added = s.view.len() - before;

            let rows = match s.view.position_of(RowKey::Category(category_id)) {
                Some(header) if added > 0 => {
                    let take = added
                        .min(max_row_count as usize)
                        .min(s.max_rows_per_query as usize);
                    s.view.project_range(header + 1..header + 1 + take, &columns)
                }
                _ => Vec::new(),
            };
            Ok(ExpandRowResponse {
                expanded_row_count: added as u32,
                rows,
            })
        })
    }

    pub fn collapse_row(&mut self, category_id: u64) -> Result<CollapseRowResponse, TableError> {
        self.run(Operation::CollapseRow, |s| {
            match s.view.header(category_id) {
                None => return Err(TableError::NotFound { category_id }),
                Some(h) if !h.expanded => return Err(TableError::NotExpanded { category_id }),
                Some(_) => {}
            }
            s.require_columns(
                Operation::CollapseRow,
                s.behavior.columns_required.collapse_row,
            )?;

            let before = s.view.len();
            s.overrides.insert(category_id, false);
            s.rebuild_anchored(|view| {
                view.position_of(RowKey::Category(category_id))
                    .map_or(0, |header| header + 1)
            });
            Ok(CollapseRowResponse {
                collapsed_row_count: (before - s.view.len()) as u32,
            })
        })
    }

    pub fn get_collapse_state(
        &mut self,
        row_id: u64,
        row_instance_number: u32,
    ) -> Result<GetCollapseStateResponse, TableError> {
        self.run(Operation::GetCollapseState, |s| {
            s.require_columns(
                Operation::GetCollapseState,
                s.behavior.columns_required.get_collapse_state,
            )?;
            let state = CollapseState {
                categories: s
                    .view
                    .headers()
                    .map(|h| CategoryState {
                        category_id: h.id,
                        expanded: h.expanded,
                    })
                    .collect(),
                anchor_row_id: row_id,
                anchor_instance: row_instance_number,
            };
            Ok(GetCollapseStateResponse {
                collapse_state: state.encode()?,
            })
        })
    }

    pub fn set_collapse_state(
        &mut self,
        collapse_state: &[u8],
    ) -> Result<SetCollapseStateResponse, TableError> {
        self.run(Operation::SetCollapseState, |s| {
            s.require_columns(
                Operation::SetCollapseState,
                s.behavior.columns_required.set_collapse_state,
            )?;
            let state = CollapseState::decode(collapse_state)?;

            s.overrides = state
                .categories
                .iter()
                .map(|c| (c.category_id, c.expanded))
                .collect();
            s.rebuild_anchored(|_| 0);

            // An anchor row that is gone falls back to the first row.
            let key = s
                .view
                .key_for_inst_id(state.anchor_row_id)
                .or_else(|| s.view.key_at(0));
            let anchor = Anchor {
                key,
                position: key.and_then(|k| s.view.position_of(k)).unwrap_or(0),
            };
            let bookmark = s.bookmarks.create(anchor);
            s.bookmark_created = true;
            Ok(SetCollapseStateResponse { bookmark })
        })
    }

    // -----------------------------------------------------------------------
    // Status and lifecycle
    // -----------------------------------------------------------------------

    /// Reports the table status. Pending asynchronous work completes once
    /// it has been observed.
    pub fn get_status(&mut self) -> Result<GetStatusResponse, TableError> {
        self.run(Operation::GetStatus, |s| {
            let table_status = s.status;
            s.settle();
            Ok(GetStatusResponse { table_status })
        })
    }

    /// Rolls back pending asynchronous work.
    pub fn abort(&mut self) -> Result<AbortResponse, TableError> {
        self.run(Operation::Abort, |s| {
            let table_status = s.status;
            match s.pending.take() {
                Some(snapshot) if table_status.is_in_progress() => {
                    s.restore(snapshot);
                    s.status = TableStatus::Complete;
                    Ok(AbortResponse { table_status })
                }
                _ => Err(TableError::UnableToAbort {
                    status: table_status,
                }),
            }
        })
    }

    /// Ends the session. Every later operation fails with NullObject.
    pub fn release(&mut self) -> Result<(), TableError> {
        self.run(Operation::Release, |s| {
            s.released = true;
            s.pending = None;
            s.status = TableStatus::Complete;
            Ok(())
        })
    }
}

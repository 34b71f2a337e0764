//! ROP buffer dispatch.
//!
//! A request buffer is decoded into table ROPs which run in order against
//! the sessions named by the buffer's handle table. Each response is encoded
//! with the column set its table has once the ROP has run, so a SetColumns
//! earlier in the same buffer shapes the rows of a later QueryRows.

use crate::error::{CoreError, TableError};
use crate::registry::TableRegistry;
use crate::session::TableSession;
use crate::view::SortSpec;
use ropstate_codec::{
    EncodeWith, PropertyTag, ResultCode, RopBuffer, RopResponse, TableRequest, TableResponse,
    WireWriter,
};
use std::sync::Arc;

fn respond<T>(handle_index: u8, result: Result<T, TableError>) -> RopResponse<T> {
    match result {
        Ok(payload) => RopResponse::success(handle_index, payload),
        Err(e) => RopResponse::failure(handle_index, e.code()),
    }
}

/// Runs one request against a session. Release produces no response.
pub fn execute(session: &mut TableSession, request: &TableRequest) -> Option<TableResponse> {
    let index = request.header().input_handle_index;
    let response = match request {
        TableRequest::Release(_) => {
            if let Err(e) = session.release() {
                tracing::debug!("Release ignored: {}", e);
            }
            return None;
        }
        TableRequest::SetColumns(r) => TableResponse::SetColumns(respond(
            index,
            session.set_columns(r.flags, r.columns.clone()),
        )),
        TableRequest::SortTable(r) => {
            let sort = SortSpec::new(r.sort_orders.clone(), r.categorized_count, r.expanded_count);
            TableResponse::SortTable(respond(index, session.sort_table(r.flags, sort)))
        }
        TableRequest::Restrict(r) => TableResponse::Restrict(respond(
            index,
            session.restrict(r.flags, r.restriction.clone()),
        )),
        TableRequest::QueryRows(r) => TableResponse::QueryRows(respond(
            index,
            session.query_rows(r.flags, r.forward_read, r.row_count),
        )),
        TableRequest::GetStatus(_) => {
            TableResponse::GetStatus(respond(index, session.get_status()))
        }
        TableRequest::QueryPosition(_) => {
            TableResponse::QueryPosition(respond(index, session.query_position()))
        }
        TableRequest::SeekRow(r) => TableResponse::SeekRow(respond(
            index,
            session.seek_row(r.origin, r.row_count, r.want_row_moved_count),
        )),
        TableRequest::SeekRowBookmark(r) => TableResponse::SeekRowBookmark(respond(
            index,
            session.seek_row_bookmark(&r.bookmark, r.row_count, r.want_row_moved_count),
        )),
        TableRequest::SeekRowFractional(r) => TableResponse::SeekRowFractional(respond(
            index,
            session.seek_row_fractional(r.numerator, r.denominator),
        )),
        TableRequest::CreateBookmark(_) => {
            TableResponse::CreateBookmark(respond(index, session.create_bookmark()))
        }
        TableRequest::Abort(_) => TableResponse::Abort(respond(index, session.abort())),
        TableRequest::QueryColumnsAll(_) => {
            TableResponse::QueryColumnsAll(respond(index, session.query_columns_all()))
        }
        TableRequest::FindRow(r) => TableResponse::FindRow(respond(
            index,
            session.find_row(r.backward, r.restriction.as_ref(), r.origin, &r.bookmark),
        )),
        TableRequest::ExpandRow(r) => TableResponse::ExpandRow(respond(
            index,
            session.expand_row(r.max_row_count, r.category_id),
        )),
        TableRequest::CollapseRow(r) => {
            TableResponse::CollapseRow(respond(index, session.collapse_row(r.category_id)))
        }
        TableRequest::GetCollapseState(r) => TableResponse::GetCollapseState(respond(
            index,
            session.get_collapse_state(r.row_id, r.row_instance_number),
        )),
        TableRequest::SetCollapseState(r) => TableResponse::SetCollapseState(respond(
            index,
            session.set_collapse_state(&r.collapse_state),
        )),
        TableRequest::ResetTable(_) => {
            TableResponse::ResetTable(respond(index, session.reset_table()))
        }
        TableRequest::FreeBookmark(r) => {
            TableResponse::FreeBookmark(respond(index, session.free_bookmark(&r.bookmark)))
        }
    };
    Some(response)
}

/// The failure response for a request that never reached a session.
pub fn failure(request: &TableRequest, code: ResultCode) -> Option<TableResponse> {
    let i = request.header().input_handle_index;
    Some(match request {
        TableRequest::Release(_) => return None,
        TableRequest::SetColumns(_) => TableResponse::SetColumns(RopResponse::failure(i, code)),
        TableRequest::SortTable(_) => TableResponse::SortTable(RopResponse::failure(i, code)),
        TableRequest::Restrict(_) => TableResponse::Restrict(RopResponse::failure(i, code)),
        TableRequest::QueryRows(_) => TableResponse::QueryRows(RopResponse::failure(i, code)),
        TableRequest::GetStatus(_) => TableResponse::GetStatus(RopResponse::failure(i, code)),
        TableRequest::QueryPosition(_) => {
            TableResponse::QueryPosition(RopResponse::failure(i, code))
        }
        TableRequest::SeekRow(_) => TableResponse::SeekRow(RopResponse::failure(i, code)),
        TableRequest::SeekRowBookmark(_) => {
            TableResponse::SeekRowBookmark(RopResponse::failure(i, code))
        }
        TableRequest::SeekRowFractional(_) => {
            TableResponse::SeekRowFractional(RopResponse::failure(i, code))
        }
        TableRequest::CreateBookmark(_) => {
            TableResponse::CreateBookmark(RopResponse::failure(i, code))
        }
        TableRequest::Abort(_) => TableResponse::Abort(RopResponse::failure(i, code)),
        TableRequest::QueryColumnsAll(_) => {
            TableResponse::QueryColumnsAll(RopResponse::failure(i, code))
        }
        TableRequest::FindRow(_) => TableResponse::FindRow(RopResponse::failure(i, code)),
        TableRequest::ExpandRow(_) => TableResponse::ExpandRow(RopResponse::failure(i, code)),
        TableRequest::CollapseRow(_) => TableResponse::CollapseRow(RopResponse::failure(i, code)),
        TableRequest::GetCollapseState(_) => {
            TableResponse::GetCollapseState(RopResponse::failure(i, code))
        }
        TableRequest::SetCollapseState(_) => {
            TableResponse::SetCollapseState(RopResponse::failure(i, code))
        }
        TableRequest::ResetTable(_) => TableResponse::ResetTable(RopResponse::failure(i, code)),
        TableRequest::FreeBookmark(_) => {
            TableResponse::FreeBookmark(RopResponse::failure(i, code))
        }
    })
}

/// Routes ROP buffers to table sessions.
pub struct RopDispatcher {
    registry: Arc<TableRegistry>,
}

impl RopDispatcher {
    pub fn new(registry: Arc<TableRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    /// Decodes each request, runs it and returns the response buffer. The
    /// handle table comes back unchanged. Only a malformed request buffer
    /// fails the whole call.
    pub fn dispatch(&self, buffer: &RopBuffer) -> Result<RopBuffer, CoreError> {
        let requests: Vec<TableRequest> = buffer.decode_rops()?;
        tracing::debug!("Dispatching {} table ROPs", requests.len());

        let mut w = WireWriter::new();
        for request in &requests {
            if let Some((response, columns)) = self.dispatch_one(buffer, request) {
                response.encode_with(&mut w, &columns)?;
            }
        }
        Ok(RopBuffer::new(w.as_slice().to_vec(), buffer.handles.clone()))
    }

    /// Runs one request and returns its response together with the columns
    /// to encode it with.
    pub fn dispatch_one(
        &self,
        buffer: &RopBuffer,
        request: &TableRequest,
    ) -> Option<(TableResponse, Vec<PropertyTag>)> {
        let index = request.header().input_handle_index;
        let outcome = match buffer.handle(index) {
            Some(handle) => self
                .registry
                .with_table(handle, |session| {
                    let response = execute(session, request);
                    let columns = session.columns().map(<[_]>::to_vec).unwrap_or_default();
                    (response, columns)
                })
                .map(|outcome| (handle, outcome)),
            None => Err(CoreError::HandleNotFound {
                handle: ropstate_codec::INVALID_HANDLE,
            }),
        };

        match outcome {
            Ok((handle, (response, columns))) => {
                if matches!(request, TableRequest::Release(_)) {
                    self.registry.remove(handle);
                }
                response.map(|r| (r, columns))
            }
            Err(e) => {
                tracing::warn!("{:?} at handle index {}: {}", request.rop_id(), index, e);
                let code = e.result_code().unwrap_or(ResultCode::NullObject);
                failure(request, code).map(|r| (r, Vec::new()))
            }
        }
    }
}

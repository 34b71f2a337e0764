//! Core error types.

use crate::table::{Operation, TableType};
use ropstate_codec::{CodecError, ResultCode, TableStatus};
use thiserror::Error;

/// Failures of a table operation. Each maps to exactly one result code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("{op} is not supported on {table_type} tables")]
    NotSupported { op: Operation, table_type: TableType },

    #[error("{op}: {reason}")]
    ParameterNotSupported { op: Operation, reason: String },

    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("null object: {reason}")]
    NullObject { reason: String },

    #[error("category not found: {category_id:#x}")]
    NotFound { category_id: u64 },

    #[error("category is not collapsed: {category_id:#x}")]
    NotCollapsed { category_id: u64 },

    #[error("category is not expanded: {category_id:#x}")]
    NotExpanded { category_id: u64 },

    #[error("invalid bookmark: {reason}")]
    InvalidBookmark { reason: String },

    #[error("unable to abort: table status is {status:?}")]
    UnableToAbort { status: TableStatus },

    #[error("{op} is not implemented by this server generation")]
    NotImplemented { op: Operation },

    #[error("{op}: outcome is unspecified for this server generation ({reason})")]
    Unspecified { op: Operation, reason: String },
}

impl TableError {
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        TableError::InvalidParameter {
            reason: reason.into(),
        }
    }

    pub fn null_object(reason: impl Into<String>) -> Self {
        TableError::NullObject {
            reason: reason.into(),
        }
    }

    pub fn invalid_bookmark(reason: impl Into<String>) -> Self {
        TableError::InvalidBookmark {
            reason: reason.into(),
        }
    }

    /// Returns the result code reported on the wire.
    pub fn code(&self) -> ResultCode {
        match self {
            TableError::NotSupported { .. } => ResultCode::NotSupported,
            TableError::ParameterNotSupported { .. } => ResultCode::NotSupported,
            TableError::InvalidParameter { .. } => ResultCode::InvalidParameter,
            TableError::NullObject { .. } => ResultCode::NullObject,
            TableError::NotFound { .. } => ResultCode::NotFound,
            TableError::NotCollapsed { .. } => ResultCode::NotCollapsed,
            TableError::NotExpanded { .. } => ResultCode::NotExpanded,
            TableError::InvalidBookmark { .. } => ResultCode::InvalidBookmark,
            TableError::UnableToAbort { .. } => ResultCode::UnableToAbort,
            TableError::NotImplemented { .. } => ResultCode::NotImplemented,
            TableError::Unspecified { .. } => ResultCode::Unexpected,
        }
    }
}

/// Errors from the registry and dispatcher.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("table handle not found: {handle:#x}")]
    HandleNotFound { handle: u32 },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Table(#[from] TableError),
}

impl CoreError {
    /// Returns an error code suitable for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::HandleNotFound { .. } => "NULL_OBJECT",
            CoreError::Codec(_) => "FRAMING_ERROR",
            CoreError::Table(e) => match e.code() {
                ResultCode::NotSupported => "NOT_SUPPORTED",
                ResultCode::InvalidParameter => "INVALID_PARAMETER",
                ResultCode::NullObject => "NULL_OBJECT",
                ResultCode::NotFound => "NOT_FOUND",
                ResultCode::NotCollapsed => "NOT_COLLAPSED",
                ResultCode::NotExpanded => "NOT_EXPANDED",
                ResultCode::InvalidBookmark => "INVALID_BOOKMARK",
                ResultCode::UnableToAbort => "UNABLE_TO_ABORT",
                ResultCode::NotImplemented => "NOT_IMPLEMENTED",
                ResultCode::Unexpected | ResultCode::Success => "UNEXPECTED",
            },
        }
    }

    /// The result code a ROP response carries for this error, if any.
    /// Framing errors fail the whole buffer instead.
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            CoreError::HandleNotFound { .. } => Some(ResultCode::NullObject),
            CoreError::Codec(_) => None,
            CoreError::Table(e) => Some(e.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_never_success() {
        let errors = vec![
            TableError::NotSupported {
                op: Operation::SortTable,
                table_type: TableType::Rules,
            },
            TableError::invalid_parameter("x"),
            TableError::null_object("x"),
            TableError::NotFound { category_id: 1 },
            TableError::NotCollapsed { category_id: 1 },
            TableError::NotExpanded { category_id: 1 },
            TableError::invalid_bookmark("x"),
            TableError::UnableToAbort {
                status: TableStatus::Complete,
            },
            TableError::NotImplemented { op: Operation::Abort },
            TableError::Unspecified {
                op: Operation::QueryRows,
                reason: "x".into(),
            },
        ];
        for e in errors {
            assert!(!e.code().is_success(), "{}", e);
        }
    }

    #[test]
    fn test_display() {
        let e = TableError::NotSupported {
            op: Operation::SortTable,
            table_type: TableType::Rules,
        };
        assert_eq!(e.to_string(), "RopSortTable is not supported on rules tables");
        assert_eq!(
            TableError::NotFound { category_id: 0x10 }.to_string(),
            "category not found: 0x10"
        );
    }

    #[test]
    fn test_core_error_codes() {
        assert_eq!(
            CoreError::HandleNotFound { handle: 3 }.result_code(),
            Some(ResultCode::NullObject)
        );
        let framing = CoreError::from(CodecError::TrailingBytes(2));
        assert_eq!(framing.result_code(), None);
        assert_eq!(framing.error_code(), "FRAMING_ERROR");
        let table = CoreError::from(TableError::invalid_bookmark("freed"));
        assert_eq!(table.error_code(), "INVALID_BOOKMARK");
    }
}

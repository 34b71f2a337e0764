//! # ropstate-core
//!
//! Table cursor state machine for ropstate.
//!
//! This crate provides:
//! - Per-generation server behavior and its configuration
//! - Table sessions: columns, sort, restriction, cursor and bookmarks
//! - Categorized views with expand and collapse state
//! - A handle registry and a ROP buffer dispatcher

pub mod behavior;
pub mod bookmark;
pub mod collapse;
pub mod config;
pub mod error;
pub mod filter;
pub mod handler;
pub mod registry;
pub mod session;
pub mod table;
pub mod view;

pub use behavior::{ServerBehavior, ServerGeneration};
pub use bookmark::{Bookmark, BookmarkState, BookmarkTable};
pub use collapse::CollapseState;
pub use config::{Config, ConfigError};
pub use error::{CoreError, TableError};
pub use handler::RopDispatcher;
pub use registry::TableRegistry;
pub use session::TableSession;
pub use table::{Operation, Row, TableContents, TableType};
pub use view::{SortSpec, View};

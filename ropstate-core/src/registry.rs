//! Table handle registry.
//!
//! Sessions are keyed by server object handle. Each session sits behind its
//! own lock so that operations on different tables never contend.

use crate::behavior::ServerBehavior;
use crate::error::CoreError;
use crate::session::TableSession;
use crate::table::{TableContents, TableType};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

pub struct TableRegistry {
    behavior: ServerBehavior,
    max_rows_per_query: u16,
    sessions: DashMap<u32, RwLock<TableSession>>,
    next_handle: AtomicU32,
}

impl TableRegistry {
    pub fn new(behavior: ServerBehavior, max_rows_per_query: u16) -> Self {
        Self {
            behavior,
            max_rows_per_query,
            sessions: DashMap::new(),
            next_handle: AtomicU32::new(1),
        }
    }

    pub fn behavior(&self) -> &ServerBehavior {
        &self.behavior
    }

    /// Opens a table and returns its handle.
    pub fn open(&self, table_type: TableType, contents: TableContents) -> u32 {
        let handle = self.allocate_handle();
        let rows = contents.rows.len();
        let session = TableSession::new(table_type, self.behavior, contents)
            .with_max_rows(self.max_rows_per_query);
        self.sessions.insert(handle, RwLock::new(session));
        tracing::info!(
            "Opened {} table with {} rows as handle {:#x}",
            table_type,
            rows,
            handle
        );
        handle
    }

    fn allocate_handle(&self) -> u32 {
        loop {
            let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
            // 0 and the invalid-handle marker are never handed out.
            if handle != 0
                && handle != ropstate_codec::INVALID_HANDLE
                && !self.sessions.contains_key(&handle)
            {
                return handle;
            }
        }
    }

    /// Runs `f` against the session behind `handle`.
    pub fn with_table<R>(
        &self,
        handle: u32,
        f: impl FnOnce(&mut TableSession) -> R,
    ) -> Result<R, CoreError> {
        let entry = self
            .sessions
            .get(&handle)
            .ok_or(CoreError::HandleNotFound { handle })?;
        let mut session = entry.write();
        Ok(f(&mut session))
    }

    /// Columns currently set on a table, used to encode its responses.
    pub fn columns(&self, handle: u32) -> Result<Vec<ropstate_codec::PropertyTag>, CoreError> {
        let entry = self
            .sessions
            .get(&handle)
            .ok_or(CoreError::HandleNotFound { handle })?;
        let session = entry.read();
        Ok(session.columns().map(<[_]>::to_vec).unwrap_or_default())
    }

    /// Drops a released table. Returns false when the handle is unknown.
    pub fn remove(&self, handle: u32) -> bool {
        let removed = self.sessions.remove(&handle).is_some();
        if removed {
            tracing::debug!("Removed table handle {:#x}", handle);
        }
        removed
    }

    pub fn contains(&self, handle: u32) -> bool {
        self.sessions.contains_key(&handle)
    }

    pub fn handles(&self) -> Vec<u32> {
        let mut handles: Vec<u32> = self.sessions.iter().map(|e| *e.key()).collect();
        handles.sort_unstable();
        handles
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::ServerGeneration;
    use crate::table::Row;
    use ropstate_codec::property::tags;
    use ropstate_codec::{PropertyValue, QueryRowsFlags, TableFlags};
    use std::sync::Arc;
    use std::thread;

    fn registry() -> TableRegistry {
        TableRegistry::new(ServerGeneration::Exchange2010.preset(), 100)
    }

    fn contents(n: u64) -> TableContents {
        TableContents::new(
            vec![tags::SUBJECT],
            (1..=n)
                .map(|id| Row::new(id).with(tags::SUBJECT, PropertyValue::Unicode(id.to_string())))
                .collect(),
        )
    }

    #[test]
    fn test_open_and_lookup() {
        let registry = registry();
        let a = registry.open(TableType::Contents, contents(3));
        let b = registry.open(TableType::Hierarchy, contents(1));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.handles(), vec![a, b]);

        let kind = registry.with_table(b, |s| s.table_type()).unwrap();
        assert_eq!(kind, TableType::Hierarchy);
    }

    #[test]
    fn test_unknown_handle() {
        let registry = registry();
        let err = registry.with_table(0x99, |_| ()).unwrap_err();
        assert!(matches!(err, CoreError::HandleNotFound { handle: 0x99 }));
        assert!(registry.columns(0x99).is_err());
        assert!(!registry.remove(0x99));
    }

    #[test]
    fn test_columns_follow_session() {
        let registry = registry();
        let handle = registry.open(TableType::Contents, contents(2));
        assert!(registry.columns(handle).unwrap().is_empty());
        registry
            .with_table(handle, |s| s.set_columns(TableFlags::new(), vec![tags::SUBJECT]))
            .unwrap()
            .unwrap();
        assert_eq!(registry.columns(handle).unwrap(), vec![tags::SUBJECT]);
    }

    #[test]
    fn test_max_rows_applies_to_sessions() {
        let registry = TableRegistry::new(ServerGeneration::Exchange2010.preset(), 2);
        let handle = registry.open(TableType::Contents, contents(10));
        let rows = registry
            .with_table(handle, |s| {
                s.set_columns(TableFlags::new(), vec![tags::SUBJECT])?;
                s.query_rows(QueryRowsFlags::new(), true, 50)
            })
            .unwrap()
            .unwrap();
        assert_eq!(rows.rows.len(), 2);
    }

    #[test]
    fn test_sessions_are_isolated_across_threads() {
        let registry = Arc::new(registry());
        let handles: Vec<u32> = (0..4)
            .map(|_| registry.open(TableType::Contents, contents(20)))
            .collect();

        let workers: Vec<_> = handles
            .iter()
            .enumerate()
            .map(|(i, handle)| {
                let registry = Arc::clone(&registry);
                let handle = *handle;
                thread::spawn(move || {
                    registry
                        .with_table(handle, |s| {
                            s.seek_row(ropstate_codec::BookmarkOrigin::Beginning, i as i32, false)
                                .map(|_| s.cursor())
                        })
                        .unwrap()
                        .unwrap()
                })
            })
            .collect();

        let cursors: Vec<usize> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(cursors, vec![0, 1, 2, 3]);
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(registry.with_table(*handle, |s| s.cursor()).unwrap(), i);
        }
    }
}

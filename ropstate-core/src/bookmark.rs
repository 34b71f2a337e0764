//! Custom bookmarks.
//!
//! A bookmark is the little-endian bytes of a per-session id. The table keeps
//! live bookmarks and the stale ones whose outcome still differs from an
//! unknown bookmark. Freed bookmarks are forgotten: using one afterwards
//! fails the same way as bytes the session never produced.

use crate::behavior::{StaleBookmark, StaleBookmarkPolicy, StaleCause};
use crate::error::TableError;
use std::collections::BTreeMap;

/// Identity of a row in the view, stable across rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKey {
    Leaf(u64),
    Category(u64),
}

/// Where a bookmark points: the row it was created on (none when the cursor
/// was past the last row) and the position it had at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub key: Option<RowKey>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkState {
    Live,
    /// Invalidated by one or more later operations, in the order they ran.
    Stale(Vec<StaleCause>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub anchor: Anchor,
    pub state: BookmarkState,
}

impl Bookmark {
    pub fn causes(&self) -> &[StaleCause] {
        match &self.state {
            BookmarkState::Stale(causes) => causes,
            _ => &[],
        }
    }

    /// Applies a stale-bookmark policy. Live bookmarks always pass; a stale
    /// one passes only if every cause that touched it is tolerated.
    pub fn check_stale(&self, policy: &StaleBookmarkPolicy) -> Result<(), TableError> {
        match &self.state {
            BookmarkState::Live => Ok(()),
            BookmarkState::Stale(causes) => {
                match causes
                    .iter()
                    .find(|c| policy.for_cause(**c) == StaleBookmark::InvalidBookmark)
                {
                    Some(cause) => Err(TableError::invalid_bookmark(format!(
                        "bookmark invalidated by {:?}",
                        cause
                    ))),
                    None => Ok(()),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookmarkTable {
    next: u32,
    entries: BTreeMap<u32, Bookmark>,
}

impl Default for BookmarkTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BookmarkTable {
    pub fn new() -> Self {
        Self {
            next: 1,
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn create(&mut self, anchor: Anchor) -> Vec<u8> {
        // Ids still held after a wrap are skipped.
        while self.entries.contains_key(&self.next) {
            self.next = self.next.wrapping_add(1).max(1);
        }
        let id = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        self.entries.insert(
            id,
            Bookmark {
                anchor,
                state: BookmarkState::Live,
            },
        );
        id.to_le_bytes().to_vec()
    }

    fn id_of(bytes: &[u8]) -> Result<u32, TableError> {
        let raw: [u8; 4] = bytes.try_into().map_err(|_| {
            TableError::invalid_bookmark(format!("malformed bookmark of {} bytes", bytes.len()))
        })?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Finds a bookmark this table issued, in whatever state it is in.
    pub fn lookup(&self, bytes: &[u8]) -> Result<&Bookmark, TableError> {
        let id = Self::id_of(bytes)?;
        self.entries
            .get(&id)
            .ok_or_else(|| TableError::invalid_bookmark(format!("unknown bookmark {}", id)))
    }

    /// Forgets a bookmark, returning the state it was in.
    pub fn free(&mut self, bytes: &[u8]) -> Result<BookmarkState, TableError> {
        let id = Self::id_of(bytes)?;
        self.entries
            .remove(&id)
            .map(|bookmark| bookmark.state)
            .ok_or_else(|| TableError::invalid_bookmark(format!("unknown bookmark {}", id)))
    }

    /// Marks every outstanding bookmark stale.
    pub fn invalidate_all(&mut self, cause: StaleCause) {
        for bookmark in self.entries.values_mut() {
            match &mut bookmark.state {
                BookmarkState::Live => bookmark.state = BookmarkState::Stale(vec![cause]),
                BookmarkState::Stale(causes) => {
                    if !causes.contains(&cause) {
                        causes.push(cause);
                    }
                }
            }
        }
    }

    /// Drops stale bookmarks that every policy rejects and that no reset
    /// touched. Any later use of one fails as an unknown bookmark would.
    pub fn drop_rejected(&mut self, policies: &[&StaleBookmarkPolicy]) {
        self.entries.retain(|_, bookmark| {
            let causes = bookmark.causes();
            causes.is_empty()
                || causes.contains(&StaleCause::Reset)
                || policies.iter().any(|p| bookmark.check_stale(p).is_ok())
        });
    }

    pub fn replace_anchor(&mut self, bytes: &[u8], anchor: Anchor) -> Result<(), TableError> {
        let id = Self::id_of(bytes)?;
        match self.entries.get_mut(&id) {
            Some(bookmark) => {
                bookmark.anchor = anchor;
                Ok(())
            }
            None => Err(TableError::invalid_bookmark(format!("unknown bookmark {}", id))),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(position: usize) -> Anchor {
        Anchor {
            key: Some(RowKey::Leaf(position as u64)),
            position,
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let mut table = BookmarkTable::new();
        let a = table.create(anchor(0));
        let b = table.create(anchor(3));
        assert_ne!(a, b);
        assert_eq!(a.len(), 4);
        assert_eq!(table.lookup(&b).unwrap().anchor.position, 3);
        assert_eq!(table.lookup(&b).unwrap().state, BookmarkState::Live);
    }

    #[test]
    fn test_unknown_and_malformed_bookmarks() {
        let table = BookmarkTable::new();
        assert_eq!(
            table.lookup(&[9, 0, 0, 0]).unwrap_err().code(),
            ropstate_codec::ResultCode::InvalidBookmark
        );
        assert!(table.lookup(&[1, 2]).is_err());
    }

    #[test]
    fn test_free_forgets_bookmark() {
        let mut table = BookmarkTable::new();
        let a = table.create(anchor(1));
        let b = table.create(anchor(2));
        assert_eq!(table.free(&a).unwrap(), BookmarkState::Live);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.lookup(&a).unwrap_err().code(),
            ropstate_codec::ResultCode::InvalidBookmark
        );
        assert!(table.free(&a).is_err());

        table.invalidate_all(StaleCause::Sort);
        assert_eq!(
            table.free(&b).unwrap(),
            BookmarkState::Stale(vec![StaleCause::Sort])
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_drop_rejected_keeps_usable_and_reset_bookmarks() {
        let strict = StaleBookmarkPolicy::uniform(StaleBookmark::InvalidBookmark);
        let tolerant = StaleBookmarkPolicy::uniform(StaleBookmark::Succeed);

        let mut table = BookmarkTable::new();
        let sorted = table.create(anchor(0));
        table.invalidate_all(StaleCause::Sort);
        let live = table.create(anchor(1));

        table.drop_rejected(&[&strict, &tolerant]);
        assert_eq!(table.len(), 2);

        table.drop_rejected(&[&strict, &strict]);
        assert!(table.lookup(&sorted).is_err());
        assert!(table.lookup(&live).is_ok());

        table.invalidate_all(StaleCause::Reset);
        table.drop_rejected(&[&strict]);
        assert_eq!(
            table.lookup(&live).unwrap().causes(),
            &[StaleCause::Reset]
        );
    }

    #[test]
    fn test_churn_does_not_grow_table() {
        let strict = StaleBookmarkPolicy::uniform(StaleBookmark::InvalidBookmark);
        let mut table = BookmarkTable::new();
        for i in 0..1000 {
            let b = table.create(anchor(i));
            if i % 2 == 0 {
                table.free(&b).unwrap();
            } else {
                table.invalidate_all(StaleCause::Restrict);
                table.drop_rejected(&[&strict]);
            }
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_stale_causes_accumulate() {
        let mut table = BookmarkTable::new();
        let a = table.create(anchor(1));
        table.invalidate_all(StaleCause::Sort);
        table.invalidate_all(StaleCause::Sort);
        table.invalidate_all(StaleCause::Reset);
        assert_eq!(
            table.lookup(&a).unwrap().causes(),
            &[StaleCause::Sort, StaleCause::Reset]
        );
    }

    #[test]
    fn test_stale_policy() {
        let mut table = BookmarkTable::new();
        let a = table.create(anchor(1));
        let tolerant = StaleBookmarkPolicy::uniform(StaleBookmark::Succeed);
        let strict = StaleBookmarkPolicy::uniform(StaleBookmark::InvalidBookmark);
        let mixed = StaleBookmarkPolicy {
            after_reset: StaleBookmark::Succeed,
            after_sort: StaleBookmark::Succeed,
            after_restrict: StaleBookmark::InvalidBookmark,
        };

        assert!(table.lookup(&a).unwrap().check_stale(&strict).is_ok());

        table.invalidate_all(StaleCause::Sort);
        let bookmark = table.lookup(&a).unwrap();
        assert!(bookmark.check_stale(&tolerant).is_ok());
        assert!(bookmark.check_stale(&mixed).is_ok());
        assert!(bookmark.check_stale(&strict).is_err());

        table.invalidate_all(StaleCause::Restrict);
        assert!(table.lookup(&a).unwrap().check_stale(&mixed).is_err());
    }

    #[test]
    fn test_ids_never_zero_after_wrap() {
        let mut table = BookmarkTable::new();
        table.next = u32::MAX;
        let last = table.create(anchor(0));
        let wrapped = table.create(anchor(0));
        assert_eq!(last, u32::MAX.to_le_bytes().to_vec());
        assert_eq!(wrapped, 1u32.to_le_bytes().to_vec());

        table.next = u32::MAX;
        assert_eq!(table.create(anchor(0)), 2u32.to_le_bytes().to_vec());
    }
}

// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! the process-wide tag handle table
//!
//! Handles are positive `i32`s handed to users; the table maps them to the
//! shared tag objects. Lookups clone the `Arc`, so a tag being destroyed
//! stays alive until every borrow is gone.

use crate::tag::TagCore;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct Table<T> {
    map: RwLock<HashMap<i32, T>>,
    next: parking_lot::Mutex<i32>,
}

impl<T: Clone> Table<T> {
    pub fn new() -> Self {
        Table {
            map: RwLock::new(HashMap::new()),
            next: parking_lot::Mutex::new(1),
        }
    }

    /// allocate a free handle and insert the value built for it.
    ///
    /// Allocation is monotonic, wraps back to 1 near `i32::MAX`, and skips
    /// handles that are still live.
    pub fn insert_with<F, E>(&self, make: F) -> std::result::Result<i32, E>
    where
        F: FnOnce(i32) -> std::result::Result<T, E>,
    {
        let mut map = self.map.write();
        let mut next = self.next.lock();
        let id = loop {
            let id = *next;
            *next = if id >= i32::MAX - 1 { 1 } else { id + 1 };
            if !map.contains_key(&id) {
                break id;
            }
        };
        let value = make(id)?;
        map.insert(id, value);
        Ok(id)
    }

    pub fn lookup(&self, id: i32) -> Option<T> {
        self.map.read().get(&id).cloned()
    }

    pub fn remove(&self, id: i32) -> Option<T> {
        self.map.write().remove(&id)
    }

    pub fn drain(&self) -> Vec<T> {
        self.map.write().drain().map(|(_, v)| v).collect()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }
}

static TABLE: Lazy<Table<Arc<TagCore>>> = Lazy::new(Table::new);

pub(crate) fn insert_with<F>(make: F) -> crate::Result<i32>
where
    F: FnOnce(i32) -> crate::Result<Arc<TagCore>>,
{
    TABLE.insert_with(make)
}

pub(crate) fn lookup(id: i32) -> Option<Arc<TagCore>> {
    TABLE.lookup(id)
}

pub(crate) fn remove(id: i32) -> Option<Arc<TagCore>> {
    TABLE.remove(id)
}

/// destroy every live tag; used by [`crate::plc::shutdown`]
pub(crate) fn drain_all() {
    for tag in TABLE.drain() {
        tag.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_allocation() {
        let table: Table<&'static str> = Table::new();
        let a = table.insert_with(|_| Ok::<_, ()>("a")).unwrap();
        let b = table.insert_with(|_| Ok::<_, ()>("b")).unwrap();
        assert_eq!(b, a + 1);
        assert_eq!(table.lookup(a), Some("a"));
        assert_eq!(table.lookup(b), Some("b"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let table: Table<&'static str> = Table::new();
        let id = table.insert_with(|_| Ok::<_, ()>("x")).unwrap();
        assert_eq!(table.remove(id), Some("x"));
        assert_eq!(table.remove(id), None);
        assert_eq!(table.lookup(id), None);
    }

    #[test]
    fn test_wrap_skips_live_handles() {
        let table: Table<u8> = Table::new();
        let first = table.insert_with(|_| Ok::<_, ()>(1)).unwrap();
        // force the counter to the wrap point
        *table.next.lock() = i32::MAX - 1;
        let high = table.insert_with(|_| Ok::<_, ()>(2)).unwrap();
        assert_eq!(high, i32::MAX - 1);
        // next allocation wraps to 1, which is in use, and skips it
        let wrapped = table.insert_with(|_| Ok::<_, ()>(3)).unwrap();
        assert_eq!(wrapped, first + 1);
    }

    #[test]
    fn test_make_failure_allocates_nothing() {
        let table: Table<u8> = Table::new();
        let err = table.insert_with(|_| Err("nope")).unwrap_err();
        assert_eq!(err, "nope");
        assert_eq!(table.len(), 0);
    }
}

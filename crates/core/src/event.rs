// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! tag lifecycle event handling
//!
//! Listeners are registered per tag and invoked from the session worker
//! thread when an operation completes. Callbacks are cloned out of the
//! registry before invocation, so a callback may itself create or destroy
//! tags without deadlocking.

use crate::status::Status;

/// tag lifecycle events
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Event {
    /// the tag finished its initial setup and is ready for operations
    Created,
    /// a read operation completed (successfully or not)
    ReadCompleted,
    /// a write operation completed (successfully or not)
    WriteCompleted,
    /// a pending operation was aborted
    Aborted,
    /// the tag was destroyed; no further events will fire
    Destroyed,
}

#[cfg(feature = "event")]
pub use imp::{listen, Callback, Handler};

#[cfg(feature = "event")]
pub(crate) use imp::{emit, forget};

#[cfg(not(feature = "event"))]
pub(crate) fn emit(_tag: i32, _event: Event, _status: Status) {}

#[cfg(not(feature = "event"))]
pub(crate) fn forget(_tag: i32) {}

#[cfg(feature = "event")]
mod imp {
    use super::Event;
    use crate::raw::TagId;
    use crate::status::Status;
    use dyn_clone::DynClone;
    use once_cell::sync::Lazy;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// event callback; closures that are `Clone + Send + Sync` qualify
    pub trait Callback: DynClone + Send + Sync {
        /// invoked with the tag id, the event, and the status it completed with
        fn call(&mut self, id: TagId, event: Event, status: Status);
    }

    dyn_clone::clone_trait_object!(Callback);

    impl<F> Callback for F
    where
        F: FnMut(TagId, Event, Status) + Clone + Send + Sync,
    {
        fn call(&mut self, id: TagId, event: Event, status: Status) {
            self(id, event, status)
        }
    }

    struct Entry {
        key: u64,
        cb: Box<dyn Callback>,
    }

    static LISTENERS: Lazy<Mutex<HashMap<i32, Vec<Entry>>>> =
        Lazy::new(|| Mutex::new(HashMap::new()));
    static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

    /// listener registration; dropping it removes the listener
    #[must_use = "dropping the handler unregisters the listener"]
    pub struct Handler {
        tag: i32,
        key: u64,
    }

    impl Drop for Handler {
        fn drop(&mut self) {
            let mut map = LISTENERS.lock();
            if let Some(entries) = map.get_mut(&self.tag) {
                entries.retain(|e| e.key != self.key);
                if entries.is_empty() {
                    map.remove(&self.tag);
                }
            }
        }
    }

    /// register a listener for one tag; prefer `RawTag::listen`
    pub fn listen(tag: i32, cb: Box<dyn Callback>) -> Handler {
        let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        LISTENERS
            .lock()
            .entry(tag)
            .or_default()
            .push(Entry { key, cb });
        Handler { tag, key }
    }

    /// fire an event to every listener on `tag`
    pub fn emit(tag: i32, event: Event, status: Status) {
        let callbacks: Vec<Box<dyn Callback>> = {
            let map = LISTENERS.lock();
            match map.get(&tag) {
                Some(entries) => entries.iter().map(|e| e.cb.clone()).collect(),
                None => return,
            }
        };
        log::trace!("tag {}: event {:?} status {:?}", tag, event, status);
        for mut cb in callbacks {
            cb.call(TagId(tag), event, status);
        }
    }

    /// drop all listeners of a destroyed tag
    pub fn forget(tag: i32) {
        LISTENERS.lock().remove(&tag);
    }
}

#[cfg(all(test, feature = "event"))]
mod tests {
    use super::*;
    use crate::raw::TagId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_listen_and_emit() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        let handler = listen(
            9001,
            Box::new(move |id: TagId, event: Event, status: Status| {
                assert_eq!(id, TagId(9001));
                assert_eq!(event, Event::ReadCompleted);
                assert!(status.is_ok());
                hits2.fetch_add(1, Ordering::Relaxed);
            }),
        );
        emit(9001, Event::ReadCompleted, Status::Ok);
        emit(8999, Event::ReadCompleted, Status::Ok);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        drop(handler);
        emit(9001, Event::ReadCompleted, Status::Ok);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_forget_clears_listeners() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        let _handler = listen(
            9002,
            Box::new(move |_: TagId, _: Event, _: Status| {
                hits2.fetch_add(1, Ordering::Relaxed);
            }),
        );
        forget(9002);
        emit(9002, Event::Destroyed, Status::Ok);
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }
}

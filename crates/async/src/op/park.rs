// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

use abtag_core::event::{Event, Handler};
use abtag_core::{RawTag, Status, TagId};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy)]
pub enum Interest {
    Read,
    Write,
}

impl Interest {
    fn value(&self) -> u8 {
        match self {
            Interest::Read => 1,
            Interest::Write => 2,
        }
    }
}

struct Parker {
    tx: Option<oneshot::Sender<Status>>,
    interest: Interest,
    /// keeps the tag's event listener alive while parked
    _listener: Handler,
}

impl Parker {
    #[inline(always)]
    fn take(&mut self, mask: u8) -> Option<oneshot::Sender<Status>> {
        if self.interest.value() & mask != 0 {
            self.tx.take()
        } else {
            None
        }
    }
}

/// wait for the tag's next completion of the given kind
#[inline(always)]
pub(crate) fn park(tag: &RawTag, tx: oneshot::Sender<Status>, interest: Interest) {
    EVENTS.park(tag, tx, interest);
}

static EVENTS: Lazy<Registry> = Lazy::new(|| Registry(Mutex::new(Default::default())));

fn on_event(id: TagId, event: Event, status: Status) {
    EVENTS.dispatch(id, event, status);
}

struct Registry(Mutex<HashMap<TagId, Parker>>);

impl Registry {
    fn park(&self, tag: &RawTag, tx: oneshot::Sender<Status>, interest: Interest) {
        let mut state = self.0.lock();
        match state.entry(tag.id()) {
            Entry::Occupied(mut v) => {
                let parker = v.get_mut();
                parker.tx = Some(tx);
                parker.interest = interest;
            }
            Entry::Vacant(holder) => {
                let listener = tag.listen(on_event);
                holder.insert(Parker {
                    tx: Some(tx),
                    interest,
                    _listener: listener,
                });
            }
        }
    }

    fn dispatch(&self, id: TagId, event: Event, status: Status) {
        let interest = match event {
            Event::ReadCompleted => Interest::Read.value(),
            Event::WriteCompleted => Interest::Write.value(),
            Event::Aborted => Interest::Read.value() | Interest::Write.value(),
            Event::Destroyed => {
                let mut state = self.0.lock();
                state.remove(&id);
                return;
            }
            _ => return,
        };

        let tx = {
            let mut state = self.0.lock();
            let item = state.get_mut(&id);
            item.and_then(|v| v.take(interest))
        };
        if let Some(tx) = tx {
            let _ = tx.send(status);
        }
    }
}

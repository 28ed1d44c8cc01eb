// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

use crate::{asyncify, private::TagRef, Error, Result};
use abtag_core::{RawTag, Status};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const CREATE_POLL: Duration = Duration::from_millis(5);

#[doc(hidden)]
pub trait Initialize: Send + Sync + Sized + 'static {
    fn create(path: String) -> abtag_core::Result<Self>;
    fn status(&self) -> Status;
}

impl Initialize for RawTag {
    #[inline(always)]
    fn create(path: String) -> abtag_core::Result<Self> {
        RawTag::new(path, 0)
    }

    #[inline(always)]
    fn status(&self) -> Status {
        RawTag::status(self)
    }
}

/// tag pool; tags with the same attribute string are shared
#[derive(Debug)]
pub struct Pool<T: Initialize> {
    shared: Arc<Mutex<HashMap<String, Entry<T>>>>,
}

impl<T: Initialize> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Initialize> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Initialize> Pool<T> {
    /// create an empty pool
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// get or create the tag for `options`, waiting until it is usable
    pub async fn entry(&self, options: impl AsRef<str>) -> Result<Entry<T>> {
        let path = options.as_ref().to_owned();
        let entry = {
            let mut state = self.shared.lock().await;
            match state.get(&path) {
                Some(entry) => entry.clone(),
                None => {
                    debug!("pool: creating tag for {}", path);
                    let create_path = path.clone();
                    let tag = asyncify(move || T::create(create_path)).await?;
                    let entry = Entry {
                        tag: Arc::new(tag),
                        lock: Arc::new(Mutex::new(())),
                        ready: Arc::new(AtomicBool::new(false)),
                    };
                    state.insert(path.clone(), entry.clone());
                    entry
                }
            }
        };
        if entry.ready.load(Ordering::Acquire) {
            return Ok(entry);
        }
        // wait for first readiness outside the pool lock; later operation
        // errors do not re-gate pooled entries
        loop {
            let status = entry.tag.status();
            if !status.is_pending() {
                if let Err(status) = status.into_result() {
                    warn!("pool: tag for {} failed: {:?}", path, status);
                    self.shared.lock().await.remove(&path);
                    return Err(Error::TagError(status));
                }
                entry.ready.store(true, Ordering::Release);
                return Ok(entry);
            }
            tokio::time::sleep(CREATE_POLL).await;
        }
    }

    /// remove a tag from the pool; live [`Entry`] clones keep it usable
    pub async fn remove(&self, options: impl AsRef<str>) -> Option<Entry<T>> {
        self.shared.lock().await.remove(options.as_ref())
    }

    /// number of pooled tags
    pub async fn len(&self) -> usize {
        self.shared.lock().await.len()
    }

    /// true when nothing is pooled
    pub async fn is_empty(&self) -> bool {
        self.shared.lock().await.is_empty()
    }
}

/// one pooled tag; clones share the tag and its exclusivity lock
#[derive(Debug)]
pub struct Entry<T> {
    tag: Arc<T>,
    lock: Arc<Mutex<()>>,
    ready: Arc<AtomicBool>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            tag: Arc::clone(&self.tag),
            lock: Arc::clone(&self.lock),
            ready: Arc::clone(&self.ready),
        }
    }
}

impl<T> Entry<T> {
    /// take the exclusive reference; operations require it so concurrent
    /// users of one tag cannot interleave read/write state
    pub async fn get(&self) -> Result<TagRef<'_, T>> {
        let lock = self.lock.lock().await;
        Ok(TagRef {
            tag: self.tag.as_ref(),
            lock,
        })
    }
}

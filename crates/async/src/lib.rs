// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

extern crate abtag_core;
extern crate tokio;
#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;

mod entry;
mod op;
mod pool;

pub use entry::TagEntry;
pub use op::{AsRaw, AsyncTag};

use abtag_core::{RawTag, Status};
use std::fmt;
use tokio::task::{self, JoinError};

/// Tag instances will be put into pool for reuse.
///
/// # Note
/// - Tag instances will not drop as long as a [`PoolEntry`] or the [`Pool`]
///   itself is still alive
pub type Pool = pool::Pool<RawTag>;
/// Tag instance in the pool
pub type PoolEntry = pool::Entry<RawTag>;
/// Tag exclusive reference
pub type TagRef<'a> = private::TagRef<'a, RawTag>;
/// result for [`abtag-async`](crate)
pub type Result<T> = std::result::Result<T, Error>;

/// errors for [`abtag-async`](crate)
#[derive(Debug)]
pub enum Error {
    /// tag error
    TagError(Status),
    /// tokio task join error
    JoinError(JoinError),
    /// other error
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::TagError(_) => None,
            Error::JoinError(e) => Some(e),
            Error::Other(e) => Some(e.as_ref()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TagError(e) => write!(f, "TagError - {}", e),
            Error::JoinError(e) => write!(f, "{}", e),
            Error::Other(e) => write!(f, "{}", e),
        }
    }
}

impl From<Status> for Error {
    fn from(s: Status) -> Self {
        Error::TagError(s)
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Error::JoinError(e)
    }
}

/// run a blocking core call on the blocking thread pool
pub(crate) async fn asyncify<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> abtag_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(f).await {
        Ok(res) => res.map_err(Error::TagError),
        Err(e) => Err(Error::JoinError(e)),
    }
}

mod private {
    /// exclusive tag ref to ensure thread and operations safety
    pub struct TagRef<'a, T> {
        pub(crate) tag: &'a T,
        #[allow(dead_code)]
        pub(crate) lock: tokio::sync::MutexGuard<'a, ()>,
    }

    impl<T> AsRef<T> for TagRef<'_, T> {
        #[inline(always)]
        fn as_ref(&self) -> &T {
            self.tag
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use abtag_core::sim::Simulator;

    const TYPE_INT: u16 = 0xC3;

    fn attrs(sim: &Simulator, name: &str) -> String {
        format!(
            "protocol=ab_eip&gateway={}&path=1,0&cpu=LGX&name={}&elem_size=2",
            sim.gateway(),
            name
        )
    }

    #[test]
    fn test_entry() -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let sim = Simulator::start();
            sim.set_tag("Level", TYPE_INT, vec![4, 0]);

            let mut entry = TagEntry::create(attrs(&sim, "Level")).await?;
            entry.ready().await?;

            let level: i16 = entry.read_value(0).await?;
            assert_eq!(level, 4);

            entry.write_value(0, 1i16).await?;
            let level: i16 = entry.read_value(0).await?;
            assert_eq!(level, 1);
            Ok(())
        })
    }

    #[test]
    fn test_pool() -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let sim = Simulator::start();
            sim.set_tag("Shared", TYPE_INT, vec![4, 0]);
            let pool = Pool::new();
            let path = attrs(&sim, "Shared");

            //retrieve 1st
            {
                let entry = pool.entry(&path).await?;
                let tag = entry.get().await?;

                tag.read().await?;
                let value: i16 = tag.get_value(0)?;
                assert_eq!(value, 4);

                tag.set_value(0, 1i16)?;
                tag.write().await?;
            }

            //retrieve 2nd
            {
                let entry = pool.entry(&path).await?;
                let tag = entry.get().await?;

                let value: i16 = tag.read_value(0).await?;
                assert_eq!(value, 1);
            }
            assert_eq!(pool.len().await, 1);
            Ok(())
        })
    }
}

// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

use crate::handle;
use crate::status::{Status, ERR_NOT_FOUND, ERR_OUT_OF_BOUNDS, ERR_TIMEOUT};
use crate::tag::{self, TagCore};
use crate::Result;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "event")]
use crate::event::{self, Event, Handler};

/// Tag Identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(pub(crate) i32);

/// a tag in a PLC, identified by an attribute string
///
/// # Examples
/// ```rust,no_run
/// use abtag_core::RawTag;
///
/// let attrs = "protocol=ab_eip&gateway=192.168.1.120&path=1,0&cpu=LGX&name=MyTag1&elem_count=1";
/// let timeout = 100;
/// let tag = RawTag::new(attrs, timeout).unwrap();
/// ```
#[derive(Debug)]
pub struct RawTag {
    tag_id: i32,
}

macro_rules! accessor {
    ($get:ident, $set:ident, $ty:ty, $n:expr) => {
        #[doc = concat!("get `", stringify!($ty), "` value at the byte offset")]
        #[inline]
        pub fn $get(&self, byte_offset: u32) -> Result<$ty> {
            let core = self.core()?;
            core.with_payload(|p| {
                let off = byte_offset as usize;
                if off + $n > p.len() {
                    return Err(Status::Err(ERR_OUT_OF_BOUNDS));
                }
                let mut raw = [0u8; $n];
                raw.copy_from_slice(&p[off..off + $n]);
                Ok(<$ty>::from_le_bytes(raw))
            })
        }

        #[doc = concat!("set `", stringify!($ty), "` value at the byte offset")]
        #[inline]
        pub fn $set(&self, byte_offset: u32, value: $ty) -> Result<()> {
            let core = self.core()?;
            core.with_payload_mut(|p| {
                let off = byte_offset as usize;
                if off + $n > p.len() {
                    return Err(Status::Err(ERR_OUT_OF_BOUNDS));
                }
                p[off..off + $n].copy_from_slice(&value.to_le_bytes());
                Ok(())
            })
        }
    };
}

impl RawTag {
    /// create a new tag from its attribute string.
    /// - `timeout_ms > 0`: block until the tag is ready, or fail
    /// - `timeout_ms = 0`: return immediately; poll with [`RawTag::status`]
    ///
    /// You might want to use `builder::PathBuilder` to build the string.
    pub fn new(attrs: impl AsRef<str>, timeout_ms: u32) -> Result<Self> {
        let tag_id = tag::create(attrs.as_ref(), timeout_ms)?;
        Ok(Self { tag_id })
    }

    /// tag id
    #[inline(always)]
    pub fn id(&self) -> TagId {
        TagId(self.tag_id)
    }

    #[inline]
    fn core(&self) -> Result<Arc<TagCore>> {
        handle::lookup(self.tag_id).ok_or(Status::Err(ERR_NOT_FOUND))
    }

    /// perform read operation.
    /// - blocking read if timeout > 0
    /// - non-blocking read if timeout = 0
    #[inline]
    pub fn read(&self, timeout_ms: u32) -> Status {
        match self.core() {
            Ok(core) => core.read(timeout_ms),
            Err(status) => status,
        }
    }

    /// perform write operation.
    /// - blocking write if timeout > 0
    /// - non-blocking write if timeout = 0
    #[inline]
    pub fn write(&self, timeout_ms: u32) -> Status {
        match self.core() {
            Ok(core) => core.write(timeout_ms),
            Err(status) => status,
        }
    }

    /// poll tag status
    #[inline]
    pub fn status(&self) -> Status {
        match self.core() {
            Ok(core) => core.status(),
            Err(status) => status,
        }
    }

    /// wait until not pending, blocking
    /// # Note
    /// only for simple use cases
    #[inline]
    pub fn wait(&self, timeout: Option<Duration>) -> Status {
        let start = Instant::now();
        loop {
            if let Some(v) = timeout {
                if start.elapsed() > v {
                    return Status::Err(ERR_TIMEOUT);
                }
            }
            let status = self.status();
            if !status.is_pending() {
                return status;
            }
            thread::yield_now();
        }
    }

    /// Abort the pending operation.
    /// Required when a non-blocking read/write (timeout=0) should not run to
    /// completion; the eventual reply is discarded.
    #[inline]
    pub fn abort(&self) -> Result<()> {
        self.core()?.abort()
    }

    /// tag size in bytes
    #[inline]
    pub fn size(&self) -> Result<u32> {
        Ok(self.core()?.size() as u32)
    }

    /// element size in bytes
    #[inline]
    pub fn elem_size(&self) -> Result<i32> {
        Ok(self.core()?.elem_size() as i32)
    }

    /// element count
    #[inline]
    pub fn elem_count(&self) -> Result<i32> {
        Ok(self.core()?.elem_count() as i32)
    }

    /// get bit value.
    ///
    /// For a tag created with a bit-indexed name the tag's own bit is read
    /// and `bit_offset` is ignored.
    #[inline]
    pub fn get_bit(&self, bit_offset: u32) -> Result<bool> {
        let core = self.core()?;
        let bit = core
            .bit_index()
            .map(u32::from)
            .unwrap_or(bit_offset) as usize;
        core.with_payload(|p| {
            let byte = bit / 8;
            if byte >= p.len() {
                return Err(Status::Err(ERR_OUT_OF_BOUNDS));
            }
            Ok(p[byte] & (1 << (bit % 8)) != 0)
        })
    }

    /// set bit value.
    ///
    /// For a tag created with a bit-indexed name the tag's own bit is set
    /// and `bit_offset` is ignored.
    #[inline]
    pub fn set_bit(&self, bit_offset: u32, value: bool) -> Result<()> {
        let core = self.core()?;
        let bit = core
            .bit_index()
            .map(u32::from)
            .unwrap_or(bit_offset) as usize;
        core.with_payload_mut(|p| {
            let byte = bit / 8;
            if byte >= p.len() {
                return Err(Status::Err(ERR_OUT_OF_BOUNDS));
            }
            if value {
                p[byte] |= 1 << (bit % 8);
            } else {
                p[byte] &= !(1 << (bit % 8));
            }
            Ok(())
        })
    }

    /// get bool value
    #[inline]
    pub fn get_bool(&self, byte_offset: u32) -> Result<bool> {
        Ok(self.get_u8(byte_offset)? > 0)
    }

    /// set bool value
    #[inline]
    pub fn set_bool(&self, byte_offset: u32, value: bool) -> Result<()> {
        self.set_u8(byte_offset, if value { 1 } else { 0 })
    }

    accessor!(get_i8, set_i8, i8, 1);
    accessor!(get_u8, set_u8, u8, 1);
    accessor!(get_i16, set_i16, i16, 2);
    accessor!(get_u16, set_u16, u16, 2);
    accessor!(get_i32, set_i32, i32, 4);
    accessor!(get_u32, set_u32, u32, 4);
    accessor!(get_i64, set_i64, i64, 8);
    accessor!(get_u64, set_u64, u64, 8);
    accessor!(get_f32, set_f32, f32, 4);
    accessor!(get_f64, set_f64, f64, 8);

    /// get raw bytes.
    /// If the buffer would run past the end of the payload, an out of bounds
    /// error is returned
    #[inline]
    pub fn get_bytes_unchecked(&self, byte_offset: u32, buf: &mut [u8]) -> Result<usize> {
        let core = self.core()?;
        core.with_payload(|p| {
            let off = byte_offset as usize;
            if off + buf.len() > p.len() {
                return Err(Status::Err(ERR_OUT_OF_BOUNDS));
            }
            buf.copy_from_slice(&p[off..off + buf.len()]);
            Ok(buf.len())
        })
    }

    /// get raw bytes, clamped to the payload size
    #[inline]
    pub fn get_bytes(&self, byte_offset: u32, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let size = self.size()? as usize;
        if byte_offset as usize >= size {
            return Ok(0);
        }
        let avail = size - byte_offset as usize;
        let len = std::cmp::min(avail, buf.len());
        self.get_bytes_unchecked(byte_offset, &mut buf[..len])
    }

    /// set raw bytes.
    /// If the buffer would run past the end of the payload, an out of bounds
    /// error is returned
    #[inline]
    pub fn set_bytes_unchecked(&self, byte_offset: u32, buf: &[u8]) -> Result<usize> {
        let core = self.core()?;
        core.with_payload_mut(|p| {
            let off = byte_offset as usize;
            if off + buf.len() > p.len() {
                return Err(Status::Err(ERR_OUT_OF_BOUNDS));
            }
            p[off..off + buf.len()].copy_from_slice(buf);
            Ok(buf.len())
        })
    }

    /// set raw bytes, clamped to the payload size
    #[inline]
    pub fn set_bytes(&self, byte_offset: u32, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let size = self.size()? as usize;
        if byte_offset as usize >= size {
            return Ok(0);
        }
        let avail = size - byte_offset as usize;
        let len = std::cmp::min(avail, buf.len());
        self.set_bytes_unchecked(byte_offset, &buf[..len])
    }

    /// listen for events
    ///
    /// # Examples
    /// ```rust,ignore
    /// use abtag_core::event::Event;
    /// let tag: RawTag = ...;
    /// let listener = tag.listen(|id, event, status| {
    ///     println!("tag event: {:?}, status: {}", event, status);
    /// });
    ///
    /// //remove listener later
    /// drop(listener);
    /// ```
    #[cfg(feature = "event")]
    #[inline]
    pub fn listen<F>(&self, f: F) -> Handler
    where
        F: FnMut(TagId, Event, Status) + Clone + Send + Sync + 'static,
    {
        event::listen(self.tag_id, Box::new(f))
    }

    /// get tag value of `T` that implements [`crate::Decode`]
    #[cfg(feature = "value")]
    #[inline]
    pub fn get_value<T: crate::Decode>(&self, byte_offset: u32) -> Result<T> {
        T::decode(self, byte_offset)
    }

    /// set tag value that implements [`crate::Encode`]
    #[cfg(feature = "value")]
    #[inline]
    pub fn set_value<T: crate::Encode>(&self, byte_offset: u32, value: T) -> Result<()> {
        value.encode(self, byte_offset)
    }
}

impl Drop for RawTag {
    #[inline]
    fn drop(&mut self) {
        let _ = tag::destroy(self.tag_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ERR_BAD_PARAM;

    #[test]
    fn test_bad_attributes_fail_synchronously() {
        let err = RawTag::new("protocol=ab_eip&cpu=LGX&name=Tag", 0).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
        let err = RawTag::new("protocol=ab_eip&gateway=h&path=1,0&cpu=LGX&name=5bad", 0).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }
}

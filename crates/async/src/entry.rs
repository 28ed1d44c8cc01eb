// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

use crate::op::{AsRaw, AsyncTag};
use crate::{asyncify, Error, Result};
use abtag_core::status::ERR_TIMEOUT;
use abtag_core::{Decode, Encode, RawTag, Status};
use std::time::Duration;

/// polling interval while waiting for tag readiness
const READY_POLL: Duration = Duration::from_millis(5);

/// tag entry, represents a tag in a PLC controller
///
/// # Examples
/// ```rust,ignore
/// use abtag_async::TagEntry;
///
/// let attrs = "protocol=ab_eip&gateway=192.168.1.120&path=1,0&cpu=LGX&name=MyTag1&elem_count=1";
/// let mut tag = TagEntry::create(attrs).await?;
/// tag.ready().await?;
/// let value: u16 = tag.read_value(0).await?;
/// tag.write_value(0, value + 10).await?;
/// ```
#[derive(Debug)]
pub struct TagEntry {
    tag: RawTag,
    ready: bool,
}

impl TagEntry {
    /// create instance of [`TagEntry`].
    ///
    /// The tag is created non-blocking; await [`TagEntry::ready`] before the
    /// first operation, or let the first `read`/`write` do it for you.
    pub async fn create(options: impl Into<String>) -> Result<Self> {
        let path = options.into();
        let tag = asyncify(move || RawTag::new(path, 0)).await?;
        Ok(Self { tag, ready: false })
    }

    /// wait until the tag finished its initial setup; the outcome is cached
    /// so later operation errors do not re-gate the entry
    pub async fn ready(&mut self) -> Result<()> {
        if self.ready {
            return Ok(());
        }
        loop {
            let status = self.tag.status();
            if !status.is_pending() {
                status.into_result().map_err(Error::TagError)?;
                self.ready = true;
                return Ok(());
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    /// wait for readiness, but give up after `timeout`
    pub async fn ready_timeout(&mut self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.ready())
            .await
            .map_err(|_| Error::TagError(Status::Err(ERR_TIMEOUT)))?
    }

    /// perform read operation
    #[inline]
    pub async fn read(&mut self) -> Result<()> {
        self.ready().await?;
        AsyncTag::read(self).await
    }

    /// perform write operation
    #[inline]
    pub async fn write(&mut self) -> Result<()> {
        self.ready().await?;
        AsyncTag::write(self).await
    }

    /// perform read & return the value at the byte offset
    #[inline]
    pub async fn read_value<T: Decode>(&mut self, offset: u32) -> Result<T> {
        self.read().await?;
        Ok(self.tag.get_value(offset)?)
    }

    /// set the value at the byte offset and write it out
    #[inline]
    pub async fn write_value<T: Encode + Send>(&mut self, offset: u32, value: T) -> Result<()> {
        self.ready().await?;
        self.tag.set_value(offset, value)?;
        AsyncTag::write(self).await
    }

    /// poll status
    #[inline]
    pub fn status(&mut self) -> Status {
        self.tag.status()
    }

    /// element size
    #[inline]
    pub fn elem_size(&mut self) -> Result<i32> {
        Ok(self.tag.elem_size()?)
    }

    /// element count
    #[inline]
    pub fn elem_count(&mut self) -> Result<i32> {
        Ok(self.tag.elem_count()?)
    }

    /// tag size in bytes
    #[inline]
    pub fn size(&mut self) -> Result<u32> {
        Ok(self.tag.size()?)
    }

    /// get bit value
    #[inline]
    pub fn get_bit(&mut self, bit_offset: u32) -> Result<bool> {
        Ok(self.tag.get_bit(bit_offset)?)
    }

    /// set bit value
    #[inline]
    pub fn set_bit(&mut self, bit_offset: u32, value: bool) -> Result<()> {
        Ok(self.tag.set_bit(bit_offset, value)?)
    }

    /// get value from mem, you should call read() before this operation
    #[inline]
    pub fn get_value<T: Decode>(&mut self, byte_offset: u32) -> Result<T> {
        Ok(self.tag.get_value(byte_offset)?)
    }

    /// set value in mem, you should call write() later
    #[inline]
    pub fn set_value<T: Encode>(&mut self, byte_offset: u32, value: T) -> Result<()> {
        self.tag.set_value(byte_offset, value)?;
        Ok(())
    }

    /// get raw bytes
    #[inline]
    pub fn get_bytes(&mut self, byte_offset: u32, buf: &mut [u8]) -> Result<usize> {
        Ok(self.tag.get_bytes(byte_offset, buf)?)
    }

    /// set raw bytes
    #[inline]
    pub fn set_bytes(&mut self, byte_offset: u32, buf: &[u8]) -> Result<usize> {
        Ok(self.tag.set_bytes(byte_offset, buf)?)
    }

    /// take the inner tag
    pub fn into_inner(self) -> RawTag {
        self.tag
    }
}

impl AsRaw for TagEntry {
    #[inline(always)]
    fn as_raw(&self) -> &RawTag {
        &self.tag
    }
}

impl AsyncTag for TagEntry {}

// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

use crate::Result;
use std::fmt;

/// operation completed
pub const STATUS_OK: i32 = 0;
/// operation queued or in flight
pub const STATUS_PENDING: i32 = 1;

/// operation cancelled by abort or destroy
pub const ERR_ABORT: i32 = -1;
/// attribute string is syntactically valid but inconsistent
pub const ERR_BAD_CONFIG: i32 = -2;
/// TCP/ENIP connection failed or was lost
pub const ERR_BAD_CONNECTION: i32 = -3;
/// payload data malformed for the requested conversion
pub const ERR_BAD_DATA: i32 = -4;
/// gateway address did not resolve or refused the session
pub const ERR_BAD_GATEWAY: i32 = -6;
/// user-supplied parameter is invalid
pub const ERR_BAD_PARAM: i32 = -7;
/// reply frame does not parse or does not match a request
pub const ERR_BAD_REPLY: i32 = -8;
/// unable to create internal resources
pub const ERR_CREATE: i32 = -11;
/// duplicate resource
pub const ERR_DUPLICATE: i32 = -12;
/// request could not be encoded
pub const ERR_ENCODE: i32 = -13;
/// unknown tag handle
pub const ERR_NOT_FOUND: i32 = -19;
/// no data available
pub const ERR_NO_DATA: i32 = -21;
/// out of memory
pub const ERR_NO_MEM: i32 = -23;
/// out of internal resources (handles, sessions)
pub const ERR_NO_RESOURCES: i32 = -24;
/// offset outside the payload buffer
pub const ERR_OUT_OF_BOUNDS: i32 = -26;
/// read operation failed
pub const ERR_READ: i32 = -27;
/// the PLC returned a fault status
pub const ERR_REMOTE_ERR: i32 = -28;
/// operation did not complete in time
pub const ERR_TIMEOUT: i32 = -31;
/// request larger than the protocol allows
pub const ERR_TOO_LARGE: i32 = -32;
/// reply smaller than the protocol requires
pub const ERR_TOO_SMALL: i32 = -33;
/// operation not supported for this PLC family
pub const ERR_UNSUPPORTED: i32 = -34;
/// write operation failed
pub const ERR_WRITE: i32 = -36;
/// partial transfer, more fragments pending
pub const ERR_PARTIAL: i32 = -37;
/// an operation is already in flight on this tag
pub const ERR_BUSY: i32 = -38;

/// tag status / error code representations
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum Status {
    /// STATUS_OK = 0
    Ok,
    /// STATUS_PENDING = 1
    Pending,
    /// fault reported by the PLC itself: verbatim CIP general status and
    /// first extended status word (or PCCC STS/EXT-STS for the PCCC families)
    Plc(u8, u16),
    /// other error codes
    Err(i32),
}

impl Status {
    /// create [`Status`] from a raw return code
    #[inline(always)]
    pub fn new(rc: i32) -> Self {
        match rc {
            STATUS_OK => Status::Ok,
            STATUS_PENDING => Status::Pending,
            _ => Status::Err(rc),
        }
    }

    /// success or not?
    #[inline(always)]
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// has error?
    #[inline(always)]
    pub fn is_err(&self) -> bool {
        matches!(self, Status::Err(_) | Status::Plc(..))
    }

    /// has pending operations?
    #[inline(always)]
    pub fn is_pending(&self) -> bool {
        matches!(self, Status::Pending)
    }

    /// is timeout error?
    #[inline(always)]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Status::Err(ERR_TIMEOUT))
    }

    /// into [`Result`]
    #[inline(always)]
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// decode status to a static description
    ///
    /// # Examples
    /// ```rust
    /// use abtag_core::Status;
    ///
    /// let status = Status::Ok;
    /// assert_eq!(status.decode(), "STATUS_OK");
    /// ```
    pub fn decode(&self) -> &'static str {
        let rc: i32 = (*self).into();
        decode_error(rc)
    }
}

/// decode a raw status code to a static description
pub fn decode_error(rc: i32) -> &'static str {
    match rc {
        STATUS_OK => "STATUS_OK",
        STATUS_PENDING => "STATUS_PENDING",
        ERR_ABORT => "ERR_ABORT: operation aborted",
        ERR_BAD_CONFIG => "ERR_BAD_CONFIG: inconsistent tag attributes",
        ERR_BAD_CONNECTION => "ERR_BAD_CONNECTION: connection to the gateway failed",
        ERR_BAD_DATA => "ERR_BAD_DATA: malformed payload data",
        ERR_BAD_GATEWAY => "ERR_BAD_GATEWAY: gateway unusable",
        ERR_BAD_PARAM => "ERR_BAD_PARAM: invalid parameter",
        ERR_BAD_REPLY => "ERR_BAD_REPLY: unexpected or unparsable reply",
        ERR_CREATE => "ERR_CREATE: unable to create internal resource",
        ERR_DUPLICATE => "ERR_DUPLICATE: duplicate resource",
        ERR_ENCODE => "ERR_ENCODE: unable to encode request",
        ERR_NOT_FOUND => "ERR_NOT_FOUND: unknown tag handle",
        ERR_NO_DATA => "ERR_NO_DATA: no data available",
        ERR_NO_MEM => "ERR_NO_MEM: out of memory",
        ERR_NO_RESOURCES => "ERR_NO_RESOURCES: out of internal resources",
        ERR_OUT_OF_BOUNDS => "ERR_OUT_OF_BOUNDS: offset outside payload",
        ERR_READ => "ERR_READ: read failed",
        ERR_REMOTE_ERR => "ERR_REMOTE_ERR: PLC returned a fault",
        ERR_TIMEOUT => "ERR_TIMEOUT: operation timed out",
        ERR_TOO_LARGE => "ERR_TOO_LARGE: request too large",
        ERR_TOO_SMALL => "ERR_TOO_SMALL: reply too small",
        ERR_UNSUPPORTED => "ERR_UNSUPPORTED: not supported for this PLC family",
        ERR_WRITE => "ERR_WRITE: write failed",
        ERR_PARTIAL => "ERR_PARTIAL: partial transfer",
        ERR_BUSY => "ERR_BUSY: operation already in flight",
        _ => "ERR_UNKNOWN",
    }
}

impl From<i32> for Status {
    #[inline(always)]
    fn from(rc: i32) -> Status {
        Status::new(rc)
    }
}

impl From<Status> for i32 {
    #[inline(always)]
    fn from(status: Status) -> i32 {
        match status {
            Status::Ok => STATUS_OK,
            Status::Pending => STATUS_PENDING,
            Status::Plc(..) => ERR_REMOTE_ERR,
            Status::Err(rc) => rc,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Plc(general, extended) => write!(
                f,
                "ERR_REMOTE_ERR: PLC returned status {:#04x} (extended {:#06x})",
                general, extended
            ),
            _ => write!(f, "{}", self.decode()),
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rc: i32 = (*self).into();
        write!(f, "STATUS {}: {}", rc, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ok() {
        let status = Status::Ok;
        assert_eq!(status.decode(), "STATUS_OK");
        assert!(status.is_ok());
        assert!(status.into_result().is_ok());
    }

    #[test]
    fn test_status_pending() {
        let status = Status::Pending;
        assert_eq!(status.decode(), "STATUS_PENDING");
        assert!(status.is_pending());
        assert!(!status.is_err());
    }

    #[test]
    fn test_status_round_trip() {
        for rc in [ERR_BAD_PARAM, ERR_TIMEOUT, ERR_BUSY, STATUS_OK, STATUS_PENDING] {
            let status = Status::new(rc);
            let back: i32 = status.into();
            assert_eq!(back, rc);
        }
    }

    #[test]
    fn test_plc_status_projection() {
        let status = Status::Plc(0xFF, 0x2105);
        let rc: i32 = status.into();
        assert_eq!(rc, ERR_REMOTE_ERR);
        assert!(status.is_err());
        let text = format!("{}", status);
        assert!(text.contains("0xff"));
        assert!(text.contains("0x2105"));
    }

    #[test]
    fn test_timeout() {
        assert!(Status::Err(ERR_TIMEOUT).is_timeout());
        assert!(!Status::Err(ERR_ABORT).is_timeout());
    }
}

// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! PLC family dialects and library-level helpers

use crate::status::{Status, ERR_UNSUPPORTED};
use core::fmt;

/// library version, packed as `(major << 16) | (minor << 8) | patch`
pub const LIB_VERSION: u32 = (VERSION_MAJOR << 16) | (VERSION_MINOR << 8) | VERSION_PATCH;
/// library major version
pub const VERSION_MAJOR: u32 = 0;
/// library minor version
pub const VERSION_MINOR: u32 = 4;
/// library patch version
pub const VERSION_PATCH: u32 = 0;

/// PLC family; selects the wire dialect a tag speaks
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PlcKind {
    /// PLC/5 series, PCCC over CIP (optionally via a DH+ bridge)
    Plc5,
    /// SLC 500 series, PCCC over CIP
    Slc500,
    /// MicroLogix series, PCCC over CIP
    MicroLogix,
    /// ControlLogix / CompactLogix, symbolic CIP tags
    ControlLogix,
    /// Micro800 series, symbolic CIP tags, connected messaging only
    Micro800,
    /// Omron NJ/NX series speaking the CIP tag dialect
    OmronNjNx,
}

impl PlcKind {
    /// parse the `cpu=` attribute value, accepting the historical aliases
    pub fn parse(value: &str) -> Option<PlcKind> {
        let v = value.trim().to_ascii_lowercase();
        match v.as_str() {
            "plc" | "plc5" => Some(PlcKind::Plc5),
            "slc" | "slc500" => Some(PlcKind::Slc500),
            "micrologix" | "mlgx" => Some(PlcKind::MicroLogix),
            "lgx" | "logix" | "controllogix" | "contrologix" | "compactlogix" | "clgx" => {
                Some(PlcKind::ControlLogix)
            }
            "micro800" | "micro-800" => Some(PlcKind::Micro800),
            "omron-njnx" | "omron" | "njnx" => Some(PlcKind::OmronNjNx),
            _ => None,
        }
    }

    /// families that tunnel PCCC commands instead of symbolic CIP services
    #[inline]
    pub fn is_pccc(&self) -> bool {
        matches!(self, PlcKind::Plc5 | PlcKind::Slc500 | PlcKind::MicroLogix)
    }

    /// `elem_size` must be given explicitly for the PCCC families
    #[inline]
    pub fn requires_elem_size(&self) -> bool {
        self.is_pccc()
    }

    /// default for `use_connected_msg` when the attribute is omitted
    #[inline]
    pub fn default_connected(&self) -> bool {
        matches!(
            self,
            PlcKind::ControlLogix | PlcKind::Micro800 | PlcKind::OmronNjNx
        )
    }

    /// connected messaging is mandatory, not merely the default
    #[inline]
    pub fn connected_required(&self) -> bool {
        matches!(self, PlcKind::Micro800)
    }

    /// per-session cap on requests in flight
    #[inline]
    pub fn max_inflight(&self) -> usize {
        match self {
            PlcKind::ControlLogix | PlcKind::OmronNjNx => 4,
            _ => 1,
        }
    }

    /// default bytes per element when `elem_size` is omitted
    #[inline]
    pub(crate) fn default_elem_size(&self) -> usize {
        4
    }
}

impl fmt::Display for PlcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlcKind::Plc5 => write!(f, "plc5"),
            PlcKind::Slc500 => write!(f, "slc500"),
            PlcKind::MicroLogix => write!(f, "micrologix"),
            PlcKind::ControlLogix => write!(f, "controllogix"),
            PlcKind::Micro800 => write!(f, "micro800"),
            PlcKind::OmronNjNx => write!(f, "omron-njnx"),
        }
    }
}

/// packed library version, `(major << 16) | (minor << 8) | patch`
#[inline]
pub fn lib_version() -> u32 {
    LIB_VERSION
}

/// check that the running library is compatible with the version the caller
/// was built against: same major, and the required minor not newer than ours.
pub fn check_lib_version(required: u32) -> Status {
    let major = required >> 16;
    let minor = (required >> 8) & 0xFF;
    if major == VERSION_MAJOR && minor <= VERSION_MINOR {
        Status::Ok
    } else {
        Status::Err(ERR_UNSUPPORTED)
    }
}

/// tear down every live tag and session.
///
/// Intended for test harnesses that need deterministic teardown; normal
/// programs can simply drop their tags.
pub fn shutdown() {
    crate::handle::drain_all();
    crate::session::shutdown_all();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(PlcKind::parse("LGX"), Some(PlcKind::ControlLogix));
        assert_eq!(PlcKind::parse("controllogix"), Some(PlcKind::ControlLogix));
        assert_eq!(PlcKind::parse("PLC5"), Some(PlcKind::Plc5));
        assert_eq!(PlcKind::parse("slc"), Some(PlcKind::Slc500));
        assert_eq!(PlcKind::parse("MLGX"), Some(PlcKind::MicroLogix));
        assert_eq!(PlcKind::parse("Micro800"), Some(PlcKind::Micro800));
        assert_eq!(PlcKind::parse("OMRON-NJNX"), Some(PlcKind::OmronNjNx));
        assert_eq!(PlcKind::parse("s7-1200"), None);
    }

    #[test]
    fn test_family_defaults() {
        assert!(PlcKind::ControlLogix.default_connected());
        assert!(!PlcKind::Slc500.default_connected());
        assert!(PlcKind::Micro800.connected_required());
        assert!(PlcKind::Plc5.requires_elem_size());
        assert!(!PlcKind::ControlLogix.requires_elem_size());
        assert_eq!(PlcKind::ControlLogix.max_inflight(), 4);
        assert_eq!(PlcKind::MicroLogix.max_inflight(), 1);
    }

    #[test]
    fn test_version_check() {
        assert!(check_lib_version(LIB_VERSION).is_ok());
        assert!(check_lib_version((VERSION_MAJOR << 16) | (VERSION_MINOR << 8)).is_ok());
        assert!(check_lib_version((VERSION_MAJOR + 1) << 16).is_err());
        assert!(check_lib_version((VERSION_MAJOR << 16) | ((VERSION_MINOR + 1) << 8)).is_err());
    }
}

// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

use core::convert::From;
use std::sync::atomic::{AtomicU8, Ordering};

/// provides debugging output when enabled
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DebugLevel {
    /// 0 - disables debugging output
    None,
    /// 1 - only output errors. Generally these are fatal to the functioning of the library
    Error,
    /// 2 - outputs warnings such as error found when checking a malformed tag attribute string or when unexpected problems are reported from the PLC
    Warn,
    /// 3 - outputs diagnostic information about the internal calls within the library. Includes some packet dumps
    Info,
    /// 4 - outputs detailed diagnostic information about the code executing within the library including packet dumps
    Detail,
    /// 5 - outputs extremely detailed information. Do not use this unless you are trying to debug detailed information about every mutex lock and release. Will output many lines of output per millisecond. You have been warned!
    Spew,
}

impl From<u8> for DebugLevel {
    #[inline]
    fn from(val: u8) -> DebugLevel {
        match val {
            0 => DebugLevel::None,
            1 => DebugLevel::Error,
            2 => DebugLevel::Warn,
            3 => DebugLevel::Info,
            4 => DebugLevel::Detail,
            5 => DebugLevel::Spew,
            _ => DebugLevel::Spew,
        }
    }
}

impl From<DebugLevel> for log::LevelFilter {
    fn from(level: DebugLevel) -> log::LevelFilter {
        match level {
            DebugLevel::None => log::LevelFilter::Off,
            DebugLevel::Error => log::LevelFilter::Error,
            DebugLevel::Warn => log::LevelFilter::Warn,
            DebugLevel::Info => log::LevelFilter::Info,
            DebugLevel::Detail => log::LevelFilter::Debug,
            DebugLevel::Spew => log::LevelFilter::Trace,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(u8::MAX);

/// set the process-wide debug level and adjust the `log` max level to match
pub fn set_debug_level(level: DebugLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
    log::set_max_level(level.into());
}

/// current process-wide debug level.
///
/// Initialized lazily from the `ABTAG_DEBUG` environment variable (0..5);
/// defaults to [`DebugLevel::None`] when unset. An environment-supplied
/// level also raises the `log` max level, mirroring [`set_debug_level`].
pub fn debug_level() -> DebugLevel {
    let raw = LEVEL.load(Ordering::Relaxed);
    if raw != u8::MAX {
        return DebugLevel::from(raw);
    }
    match std::env::var("ABTAG_DEBUG")
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(DebugLevel::from)
    {
        Some(level) => {
            set_debug_level(level);
            level
        }
        None => {
            LEVEL.store(DebugLevel::None as u8, Ordering::Relaxed);
            DebugLevel::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_u8() {
        assert_eq!(DebugLevel::from(0), DebugLevel::None);
        assert_eq!(DebugLevel::from(4), DebugLevel::Detail);
        assert_eq!(DebugLevel::from(9), DebugLevel::Spew);
    }

    #[test]
    fn test_level_order() {
        assert!(DebugLevel::Error < DebugLevel::Spew);
    }
}

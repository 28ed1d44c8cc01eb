// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![deny(unsafe_code)]

mod attr;
#[cfg(feature = "builder")]
pub mod builder;
mod cip;
mod debug;
mod enip;
/// event handling
pub mod event;
mod handle;
mod pccc;
mod plc;
mod raw;
mod session;
#[doc(hidden)]
pub mod sim;
/// status and error codes
pub mod status;
mod tag;
#[cfg(feature = "value")]
mod value;

/// abtag result
pub type Result<T> = std::result::Result<T, Status>;

pub use debug::{debug_level, set_debug_level, DebugLevel};
pub use plc::{check_lib_version, lib_version, shutdown, PlcKind, LIB_VERSION};
pub use raw::{RawTag, TagId};
pub use status::{decode_error, Status};

#[cfg(feature = "value")]
pub use value::{Decode, Encode, ValueExt};

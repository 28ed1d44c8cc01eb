// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! builder for tag attribute strings

pub use crate::debug::DebugLevel;
pub use crate::plc::PlcKind;
use core::fmt;

type Result<T> = std::result::Result<T, Error>;

/// attribute builder error
#[derive(Debug)]
pub struct Error(&'static str);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Error {}

/// builder to build a tag attribute string
///
/// # Examples
/// ```rust,no_run
/// use abtag_core::builder::*;
/// use abtag_core::RawTag;
///
/// let timeout = 100;
/// let attrs = PathBuilder::default()
///     .gateway("192.168.1.120")
///     .plc(PlcKind::ControlLogix)
///     .name("MyTag1")
///     .element_count(1)
///     .path("1,0")
///     .build()
///     .unwrap();
/// let tag = RawTag::new(attrs, timeout).unwrap();
/// let status = tag.status();
/// assert!(status.is_ok());
/// ```
#[derive(Default, Debug)]
pub struct PathBuilder {
    debug: Option<DebugLevel>,
    elem_count: Option<usize>,
    elem_size: Option<usize>,
    plc: Option<PlcKind>,
    name: Option<String>,
    path: Option<String>,
    gateway: Option<String>,
    share_session: Option<bool>,
    use_connected_msg: Option<bool>,
}

impl PathBuilder {
    /// generic attribute.
    /// defines the debugging level for the whole library.
    #[inline]
    pub fn debug(&mut self, level: DebugLevel) -> &mut Self {
        self.debug = Some(level);
        self
    }

    /// generic attribute.
    /// Optional. All tags are treated as arrays. Tags that are not arrays are considered to have a length of one element. This attribute determines how many elements are in the tag. Defaults to one (1)
    #[inline]
    pub fn element_count(&mut self, count: usize) -> &mut Self {
        self.elem_count = Some(count);
        self
    }

    /// generic attribute.
    /// Required for the PCCC families (PLC/5, SLC 500, MicroLogix). Determines the size of a single element of the tag in bytes.
    #[inline]
    pub fn element_size(&mut self, size: usize) -> &mut Self {
        self.elem_size = Some(size);
        self
    }

    /// Required. Determines the type of the PLC
    #[inline]
    pub fn plc(&mut self, plc: PlcKind) -> &mut Self {
        self.plc = Some(plc);
        self
    }

    /// IP address or host name.
    /// This tells the library what host name or IP address to use for the PLC or the gateway to the PLC (in the case that the PLC is remote).
    #[inline]
    pub fn gateway(&mut self, gateway: impl AsRef<str>) -> &mut Self {
        self.gateway = Some(gateway.as_ref().to_owned());
        self
    }

    /// This is the full name of the tag. For program tags, prepend `Program:<program name>.` where `<program name>` is the name of the program in which the tag is created.
    /// For the PCCC families this is a data-file address such as `N7:0` or `F8:10`.
    #[inline]
    pub fn name(&mut self, name: impl AsRef<str>) -> &mut Self {
        self.name = Some(name.as_ref().to_owned());
        self
    }

    /// CIP route to the PLC CPU, e.g. `1,0`.
    /// Required for CompactLogix/ControlLogix tags and for tags reached across a DH+ bridge (the last hop is then a DH+ triple like `A:1:2`). Micro800 connections must not have a path attribute.
    #[inline]
    pub fn path(&mut self, path: impl AsRef<str>) -> &mut Self {
        self.path = Some(path.as_ref().to_owned());
        self
    }

    /// Optional 1 = use a CIP connection, 0 = use UCMM.
    /// Controls whether to use connected or unconnected messaging. Connected messaging is required on Micro800 and DH+ bridged links. Default is PLC-specific. Generally you do not need to set this.
    #[inline]
    pub fn use_connected_msg(&mut self, yes: bool) -> &mut Self {
        self.use_connected_msg = Some(yes);
        self
    }

    /// Optional, defaults to true. When true, tags with the same gateway,
    /// route and family multiplex over one ENIP session.
    #[inline]
    pub fn share_session(&mut self, yes: bool) -> &mut Self {
        self.share_session = Some(yes);
        self
    }

    /// check required attributes or conflicting attributes
    fn check(&self) -> Result<()> {
        let plc = match self.plc {
            Some(plc) => plc,
            None => return Err(Error("plc kind required")),
        };
        if self.gateway.is_none() {
            return Err(Error("gateway required"));
        }
        if self.name.is_none() {
            return Err(Error("name required"));
        }
        if plc == PlcKind::ControlLogix && self.path.is_none() {
            return Err(Error("path required for controllogix"));
        }
        if plc == PlcKind::Micro800 && self.path.is_some() {
            return Err(Error("path must not be provided for micro800"));
        }
        if plc.requires_elem_size() && self.elem_size.is_none() {
            return Err(Error("element size required"));
        }
        Ok(())
    }

    /// build the full attribute string
    pub fn build(&self) -> Result<String> {
        self.check()?;
        let mut buf = vec!["protocol=ab_eip".to_owned()];

        if let Some(plc) = self.plc {
            buf.push(format!("cpu={}", plc));
        }
        if let Some(yes) = self.use_connected_msg {
            buf.push(format!("use_connected_msg={}", yes as u8));
        }
        if let Some(yes) = self.share_session {
            buf.push(format!("share_session={}", yes as u8));
        }
        if let Some(ref gateway) = self.gateway {
            buf.push(format!("gateway={}", gateway));
        }
        if let Some(ref path) = self.path {
            buf.push(format!("path={}", path));
        }
        if let Some(ref name) = self.name {
            buf.push(format!("name={}", name));
        }
        if let Some(elem_count) = self.elem_count {
            buf.push(format!("elem_count={}", elem_count));
        }
        if let Some(elem_size) = self.elem_size {
            buf.push(format!("elem_size={}", elem_size));
        }
        if let Some(debug) = self.debug {
            buf.push(format!("debug={}", debug as u8));
        }
        Ok(buf.join("&"))
    }
}

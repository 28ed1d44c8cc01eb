// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! attribute string parsing
//!
//! A tag is described by a flat `key=value&key=value` string, e.g.
//! `protocol=ab_eip&gateway=192.168.1.10&path=1,0&cpu=LGX&name=MyTag&elem_count=10`.

use crate::debug::{set_debug_level, DebugLevel};
use crate::plc::PlcKind;
use crate::status::{Status, ERR_BAD_PARAM};
use crate::Result;

/// parsed and validated tag attributes
#[derive(Debug, Clone)]
pub(crate) struct TagOptions {
    pub gateway: String,
    pub path: String,
    pub plc: PlcKind,
    pub elem_size: usize,
    pub elem_count: usize,
    pub name: String,
    pub share_session: bool,
    pub use_connected_msg: bool,
}

fn bad_param(msg: &str, detail: &str) -> Status {
    log::warn!("tag attributes: {}: {}", msg, detail);
    Status::Err(ERR_BAD_PARAM)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// parse an attribute string into [`TagOptions`].
///
/// Whitespace around `=`, `&` and values is tolerated. Unknown keys are
/// rejected rather than ignored so that typos surface immediately.
pub(crate) fn parse(attrs: &str) -> Result<TagOptions> {
    let mut protocol = None;
    let mut gateway = None;
    let mut path = None;
    let mut plc = None;
    let mut elem_size = None;
    let mut elem_count = None;
    let mut name = None;
    let mut debug = None;
    let mut share_session = None;
    let mut use_connected_msg = None;

    for pair in attrs.split('&') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| bad_param("expected key=value", pair))?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        match key.as_str() {
            "protocol" => protocol = Some(value.to_ascii_lowercase()),
            "gateway" => gateway = Some(value.to_owned()),
            "path" => path = Some(value.to_owned()),
            "cpu" | "plc" => {
                plc = Some(PlcKind::parse(value).ok_or_else(|| bad_param("unknown cpu", value))?)
            }
            "elem_size" => {
                elem_size = Some(
                    value
                        .parse::<usize>()
                        .ok()
                        .filter(|v| *v > 0)
                        .ok_or_else(|| bad_param("elem_size must be a positive integer", value))?,
                )
            }
            "elem_count" => {
                elem_count = Some(
                    value
                        .parse::<usize>()
                        .ok()
                        .filter(|v| *v >= 1)
                        .ok_or_else(|| bad_param("elem_count must be >= 1", value))?,
                )
            }
            "name" => name = Some(value.to_owned()),
            "debug" => {
                let level = value
                    .parse::<u8>()
                    .ok()
                    .filter(|v| *v <= 5)
                    .ok_or_else(|| bad_param("debug must be in 0..5", value))?;
                debug = Some(DebugLevel::from(level));
            }
            "share_session" => {
                share_session =
                    Some(parse_bool(value).ok_or_else(|| bad_param("bad boolean", value))?)
            }
            "use_connected_msg" => {
                use_connected_msg =
                    Some(parse_bool(value).ok_or_else(|| bad_param("bad boolean", value))?)
            }
            _ => return Err(bad_param("unknown attribute", &key)),
        }
    }

    match protocol.as_deref() {
        Some("ab_eip") | Some("ab-eip") => {}
        Some(other) => return Err(bad_param("unsupported protocol", other)),
        None => return Err(bad_param("protocol required", attrs)),
    }

    let plc = plc.ok_or_else(|| bad_param("cpu required", attrs))?;
    let gateway = gateway.ok_or_else(|| bad_param("gateway required", attrs))?;
    if gateway.is_empty() {
        return Err(bad_param("gateway must not be empty", attrs));
    }
    let name = name.ok_or_else(|| bad_param("name required", attrs))?;
    if name.is_empty() {
        return Err(bad_param("name must not be empty", attrs));
    }

    let path = path.unwrap_or_default();
    if plc == PlcKind::Micro800 && !path.is_empty() {
        return Err(bad_param("path must not be provided for micro800", &path));
    }

    let elem_size = match elem_size {
        Some(v) => v,
        None if plc.requires_elem_size() => {
            return Err(bad_param("elem_size required for this cpu", attrs));
        }
        None => plc.default_elem_size(),
    };

    let mut connected = use_connected_msg.unwrap_or_else(|| plc.default_connected());
    if plc.connected_required() && !connected {
        log::warn!(
            "tag attributes: {} requires connected messaging, overriding use_connected_msg=0",
            plc
        );
        connected = true;
    }

    if let Some(level) = debug {
        set_debug_level(level);
    }

    Ok(TagOptions {
        gateway,
        path,
        plc,
        elem_size,
        elem_count: elem_count.unwrap_or(1),
        name,
        share_session: share_session.unwrap_or(true),
        use_connected_msg: connected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LGX: &str = "protocol=ab_eip&gateway=192.168.1.10&path=1,0&cpu=LGX&name=MyTag";

    #[test]
    fn test_parse_minimal_lgx() {
        let opts = parse(LGX).unwrap();
        assert_eq!(opts.plc, PlcKind::ControlLogix);
        assert_eq!(opts.gateway, "192.168.1.10");
        assert_eq!(opts.path, "1,0");
        assert_eq!(opts.name, "MyTag");
        assert_eq!(opts.elem_count, 1);
        assert!(opts.share_session);
        assert!(opts.use_connected_msg);
    }

    #[test]
    fn test_parse_whitespace_tolerant() {
        let opts = parse(
            " protocol = ab_eip & gateway = 10.0.0.2 & cpu = SLC & name = N7:0 & elem_size = 2 ",
        )
        .unwrap();
        assert_eq!(opts.plc, PlcKind::Slc500);
        assert_eq!(opts.name, "N7:0");
        assert_eq!(opts.elem_size, 2);
        assert!(!opts.use_connected_msg);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse(&format!("{}&bogus=1", LGX)).unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_elem_size_required_for_pccc() {
        let err =
            parse("protocol=ab_eip&gateway=10.0.0.2&cpu=PLC5&name=F8:10&elem_count=5").unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_micro800_rejects_path() {
        let err =
            parse("protocol=ab_eip&gateway=10.0.0.2&cpu=Micro800&path=1,0&name=T1").unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_micro800_forces_connected() {
        let opts =
            parse("protocol=ab_eip&gateway=10.0.0.2&cpu=Micro800&name=T1&use_connected_msg=0")
                .unwrap();
        assert!(opts.use_connected_msg);
    }

    #[test]
    fn test_protocol_required() {
        let err = parse("gateway=10.0.0.2&cpu=LGX&name=T1").unwrap_err();
        assert_eq!(i32::from(err), ERR_BAD_PARAM);
    }

    #[test]
    fn test_connected_opt_out() {
        let opts = parse(&format!("{}&use_connected_msg=0", LGX)).unwrap();
        assert!(!opts.use_connected_msg);
    }
}

// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! end-to-end tests against the in-process device simulator

use abtag_core::sim::{SimOptions, Simulator};
use abtag_core::status::{ERR_BUSY, ERR_REMOTE_ERR, ERR_TIMEOUT};
use abtag_core::{RawTag, Status};
use std::time::Duration;

/// CIP INT (16-bit integer)
const TYPE_INT: u16 = 0xC3;
/// CIP DINT (32-bit integer)
const TYPE_DINT: u16 = 0xC4;

const TIMEOUT: u32 = 5000;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn lgx_attrs(sim: &Simulator, rest: &str) -> String {
    format!(
        "protocol=ab_eip&gateway={}&path=1,0&cpu=LGX&{}",
        sim.gateway(),
        rest
    )
}

#[test]
fn test_connected_round_trip() {
    init_logs();
    let sim = Simulator::start();
    sim.set_tag("Counter", TYPE_INT, vec![0x2A, 0x00]);

    let tag = RawTag::new(lgx_attrs(&sim, "name=Counter&elem_size=2&elem_count=1"), TIMEOUT)
        .unwrap();
    assert!(tag.status().is_ok());
    assert_eq!(tag.size().unwrap(), 2);

    tag.read(TIMEOUT).into_result().unwrap();
    assert_eq!(tag.get_u16(0).unwrap(), 42);

    tag.set_u16(0, 1234).unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    assert_eq!(sim.tag_bytes("Counter").unwrap(), 1234u16.to_le_bytes());

    // the device changed the value behind our back
    sim.set_tag("Counter", TYPE_INT, vec![0x07, 0x00]);
    tag.read(TIMEOUT).into_result().unwrap();
    assert_eq!(tag.get_u16(0).unwrap(), 7);
}

#[test]
fn test_unconnected_round_trip() {
    init_logs();
    let sim = Simulator::start();
    sim.set_tag("Pressure", TYPE_DINT, vec![0, 0, 0, 0]);

    let attrs = lgx_attrs(&sim, "name=Pressure&elem_count=1&use_connected_msg=0");
    let tag = RawTag::new(attrs, TIMEOUT).unwrap();

    tag.read(TIMEOUT).into_result().unwrap();
    tag.set_i32(0, -55).unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    assert_eq!(sim.tag_bytes("Pressure").unwrap(), (-55i32).to_le_bytes());
}

#[test]
fn test_micro800_empty_path() {
    init_logs();
    let sim = Simulator::start();
    sim.set_tag("Speed", TYPE_INT, vec![9, 0]);

    let attrs = format!(
        "protocol=ab_eip&gateway={}&cpu=Micro800&name=Speed&elem_size=2",
        sim.gateway()
    );
    let tag = RawTag::new(attrs, TIMEOUT).unwrap();
    tag.read(TIMEOUT).into_result().unwrap();
    assert_eq!(tag.get_i16(0).unwrap(), 9);
}

#[test]
fn test_write_before_read_learns_type() {
    init_logs();
    let sim = Simulator::start();
    sim.set_tag("Setpoint", TYPE_INT, vec![0, 0]);

    let tag = RawTag::new(lgx_attrs(&sim, "name=Setpoint&elem_size=2"), TIMEOUT).unwrap();
    // no read ever issued; the write has to learn the type code first
    tag.set_u16(0, 777).unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    assert_eq!(sim.tag_bytes("Setpoint").unwrap(), 777u16.to_le_bytes());
}

#[test]
fn test_fragmented_round_trip() {
    init_logs();
    let sim = Simulator::start_with(SimOptions {
        read_chunk: 100,
        ..Default::default()
    });
    let pattern: Vec<u8> = (0..600u32).map(|i| (i * 7) as u8).collect();
    sim.set_tag("Big", TYPE_DINT, pattern.clone());

    let tag = RawTag::new(lgx_attrs(&sim, "name=Big&elem_size=4&elem_count=150"), TIMEOUT)
        .unwrap();

    // read re-assembles across fragments
    tag.read(TIMEOUT).into_result().unwrap();
    let mut buf = vec![0u8; 600];
    assert_eq!(tag.get_bytes(0, &mut buf).unwrap(), 600);
    assert_eq!(buf, pattern);

    // writes above the fragmentation threshold go out in chunks
    let reversed: Vec<u8> = pattern.iter().rev().copied().collect();
    tag.set_bytes(0, &reversed).unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    assert_eq!(sim.tag_bytes("Big").unwrap(), reversed);
}

#[test]
fn test_second_read_is_busy() {
    init_logs();
    let sim = Simulator::start_with(SimOptions {
        reply_delay: Duration::from_millis(300),
        ..Default::default()
    });
    sim.set_tag("Slow", TYPE_INT, vec![1, 0]);

    let tag = RawTag::new(lgx_attrs(&sim, "name=Slow&elem_size=2"), TIMEOUT).unwrap();
    assert!(tag.read(0).is_pending());
    let second = tag.read(0);
    assert_eq!(i32::from(second), ERR_BUSY);

    let status = tag.wait(Some(Duration::from_secs(3)));
    assert!(status.is_ok());
    assert_eq!(tag.get_u16(0).unwrap(), 1);
}

#[test]
fn test_read_timeout_then_recovery() {
    init_logs();
    let sim = Simulator::start_with(SimOptions {
        reply_delay: Duration::from_millis(800),
        ..Default::default()
    });
    sim.set_tag("Laggy", TYPE_INT, vec![3, 0]);

    let tag = RawTag::new(lgx_attrs(&sim, "name=Laggy&elem_size=2"), TIMEOUT).unwrap();
    let status = tag.read(150);
    assert_eq!(i32::from(status), ERR_TIMEOUT);
    // status is sticky until the next operation
    assert_eq!(i32::from(tag.status()), ERR_TIMEOUT);

    // the late reply for the timed out request is discarded, a fresh read
    // completes normally
    let status = tag.read(4000);
    assert!(status.is_ok(), "retry failed: {:?}", status);
    assert_eq!(tag.get_u16(0).unwrap(), 3);
}

#[test]
fn test_bit_tag_read_modify_write() {
    init_logs();
    let sim = Simulator::start();
    sim.set_tag("Flags", TYPE_INT, vec![0x00, 0x00]);

    let tag = RawTag::new(lgx_attrs(&sim, "name=Flags.3&elem_size=2"), TIMEOUT).unwrap();
    tag.read(TIMEOUT).into_result().unwrap();
    assert!(!tag.get_bit(0).unwrap());

    tag.set_bit(0, true).unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    assert_eq!(sim.tag_bytes("Flags").unwrap(), vec![0x08, 0x00]);

    tag.set_bit(0, false).unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    assert_eq!(sim.tag_bytes("Flags").unwrap(), vec![0x00, 0x00]);
}

#[test]
fn test_plc_fault_is_surfaced() {
    init_logs();
    let sim = Simulator::start();
    // "Missing" is never seeded, the device reports a path error

    let tag = RawTag::new(lgx_attrs(&sim, "name=Missing&elem_size=2"), TIMEOUT).unwrap();
    let status = tag.read(TIMEOUT);
    assert!(matches!(status, Status::Plc(0x04, _)), "got {:?}", status);
    assert_eq!(i32::from(status), ERR_REMOTE_ERR);
}

#[test]
fn test_slc_data_file_round_trip() {
    init_logs();
    let sim = Simulator::start();
    let mut file = vec![0u8; 20];
    file[4..8].copy_from_slice(&[5, 0, 7, 0]); // N7:2 = 5, N7:3 = 7
    sim.set_data_file(0x89, 7, file);

    let attrs = format!(
        "protocol=ab_eip&gateway={}&cpu=SLC&name=N7:2&elem_size=2&elem_count=2",
        sim.gateway()
    );
    let tag = RawTag::new(attrs, TIMEOUT).unwrap();

    tag.read(TIMEOUT).into_result().unwrap();
    assert_eq!(tag.get_i16(0).unwrap(), 5);
    assert_eq!(tag.get_i16(2).unwrap(), 7);

    tag.set_i16(0, -1).unwrap();
    tag.set_i16(2, 100).unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    let file = sim.data_file(0x89, 7).unwrap();
    assert_eq!(&file[4..8], &[0xFF, 0xFF, 100, 0]);
}

#[test]
fn test_slc_bit_write_uses_masks() {
    init_logs();
    let sim = Simulator::start();
    sim.set_data_file(0x85, 3, vec![0u8; 10]); // B3

    let attrs = format!(
        "protocol=ab_eip&gateway={}&cpu=SLC&name=B3:4/2&elem_size=2",
        sim.gateway()
    );
    let tag = RawTag::new(attrs, TIMEOUT).unwrap();
    tag.set_bit(0, true).unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    let file = sim.data_file(0x85, 3).unwrap();
    assert_eq!(&file[8..10], &[0x04, 0x00]); // bit 2 of word B3:4

    tag.set_bit(0, false).unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    let file = sim.data_file(0x85, 3).unwrap();
    assert_eq!(&file[8..10], &[0x00, 0x00]);
}

#[test]
fn test_shared_session() {
    init_logs();
    let sim = Simulator::start();
    sim.set_tag("A", TYPE_INT, vec![1, 0]);
    sim.set_tag("B", TYPE_INT, vec![2, 0]);

    let tag_a = RawTag::new(lgx_attrs(&sim, "name=A&elem_size=2"), TIMEOUT).unwrap();
    let tag_b = RawTag::new(lgx_attrs(&sim, "name=B&elem_size=2"), TIMEOUT).unwrap();

    assert!(tag_a.read(0).is_pending());
    assert!(tag_b.read(0).is_pending());
    assert!(tag_a.wait(Some(Duration::from_secs(3))).is_ok());
    assert!(tag_b.wait(Some(Duration::from_secs(3))).is_ok());
    assert_eq!(tag_a.get_u16(0).unwrap(), 1);
    assert_eq!(tag_b.get_u16(0).unwrap(), 2);
}

#[test]
fn test_destroy_discards_late_reply() {
    init_logs();
    let sim = Simulator::start_with(SimOptions {
        reply_delay: Duration::from_millis(400),
        ..Default::default()
    });
    sim.set_tag("Orphan", TYPE_INT, vec![1, 0]);

    let tag = RawTag::new(lgx_attrs(&sim, "name=Orphan&elem_size=2"), TIMEOUT).unwrap();
    assert!(tag.read(0).is_pending());
    drop(tag);
    // the reply arrives for a tag that no longer exists; nothing to observe
    // beyond "does not blow up", so create a fresh tag on the same device
    std::thread::sleep(Duration::from_millis(800));
    let tag = RawTag::new(lgx_attrs(&sim, "name=Orphan&elem_size=2"), TIMEOUT).unwrap();
    tag.read(TIMEOUT).into_result().unwrap();
    assert_eq!(tag.get_u16(0).unwrap(), 1);
}

#[test]
fn test_abort_cancels_pending_op() {
    init_logs();
    let sim = Simulator::start_with(SimOptions {
        reply_delay: Duration::from_millis(400),
        ..Default::default()
    });
    sim.set_tag("Cancelled", TYPE_INT, vec![1, 0]);

    let tag = RawTag::new(lgx_attrs(&sim, "name=Cancelled&elem_size=2"), TIMEOUT).unwrap();
    assert!(tag.read(0).is_pending());
    tag.abort().unwrap();
    assert!(tag.status().is_err());

    // aborted tags accept new operations
    let status = tag.read(3000);
    assert!(status.is_ok(), "got {:?}", status);
}

#[cfg(feature = "event")]
#[test]
fn test_event_listener() {
    use abtag_core::event::Event;
    use std::sync::{Arc, Mutex};

    init_logs();
    let sim = Simulator::start();
    sim.set_tag("Observed", TYPE_INT, vec![1, 0]);

    let tag = RawTag::new(lgx_attrs(&sim, "name=Observed&elem_size=2"), TIMEOUT).unwrap();
    let seen: Arc<Mutex<Vec<(Event, Status)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler = tag.listen(move |_id, event, status| {
        sink.lock().unwrap().push((event, status));
    });

    tag.read(TIMEOUT).into_result().unwrap();
    tag.write(TIMEOUT).into_result().unwrap();
    drop(handler);
    tag.read(TIMEOUT).into_result().unwrap();

    let events = seen.lock().unwrap();
    assert_eq!(
        events.as_slice(),
        &[
            (Event::ReadCompleted, Status::Ok),
            (Event::WriteCompleted, Status::Ok),
        ]
    );
}

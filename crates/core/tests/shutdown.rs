// abtag
//
// a pure-rust EtherNet/IP (CIP) tag client for Allen-Bradley PLCs,
// with rust style APIs and useful extensions.
// Copyright: 2024, the abtag developers
// License: MIT

//! library teardown; kept in its own test binary because `shutdown` is
//! process-wide and would race tests running in the same process

use abtag_core::sim::Simulator;
use abtag_core::status::ERR_NOT_FOUND;
use abtag_core::RawTag;

const TYPE_INT: u16 = 0xC3;
const TIMEOUT: u32 = 5000;

#[test]
fn test_shutdown_tears_everything_down() {
    let sim = Simulator::start();
    sim.set_tag("One", TYPE_INT, vec![1, 0]);
    sim.set_tag("Two", TYPE_INT, vec![2, 0]);

    let attrs = |name: &str| {
        format!(
            "protocol=ab_eip&gateway={}&path=1,0&cpu=LGX&name={}&elem_size=2",
            sim.gateway(),
            name
        )
    };
    let one = RawTag::new(attrs("One"), TIMEOUT).unwrap();
    let two = RawTag::new(attrs("Two"), TIMEOUT).unwrap();
    one.read(TIMEOUT).into_result().unwrap();
    two.read(TIMEOUT).into_result().unwrap();

    abtag_core::shutdown();

    // every handle is gone
    assert_eq!(i32::from(one.status()), ERR_NOT_FOUND);
    assert_eq!(i32::from(two.status()), ERR_NOT_FOUND);
    assert_eq!(i32::from(one.read(TIMEOUT)), ERR_NOT_FOUND);

    // the library re-initializes lazily after a shutdown
    let again = RawTag::new(attrs("One"), TIMEOUT).unwrap();
    again.read(TIMEOUT).into_result().unwrap();
    assert_eq!(again.get_u16(0).unwrap(), 1);
}

//! Integration tests against a real SideWinder X6.
//!
//! These require the keyboard to be plugged in and enough privileges to
//! detach the kernel driver (typically root).
//! Run with: cargo test -p sidewinder-usb --test live_device -- --ignored --nocapture

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use sidewinder_usb::Usb;

const PROFILE_COUNT: usize = 3;

#[test]
#[ignore] // requires hardware
fn claim_read_release() {
    let usb = Usb::init().expect("libusb context");
    let running = AtomicBool::new(true);
    let session = usb
        .acquire(&running)
        .expect("no keyboard found — plug in a SideWinder X6");

    // press state always starts clean on a fresh session
    assert_eq!(session.previous(), 0);

    // an idle keyboard times out; a touched one yields a report — either
    // way the transfer itself must not fail
    let read = session.read_report(Duration::from_millis(250));
    assert!(read.is_ok(), "interrupt read failed: {read:?}");

    drop(session); // interface back to the kernel driver
}

#[test]
#[ignore] // requires hardware
fn config_write_is_reflected_in_readback() {
    let usb = Usb::init().expect("libusb context");
    let running = AtomicBool::new(true);
    let session = usb
        .acquire(&running)
        .expect("no keyboard found — plug in a SideWinder X6");

    // light the P1 LED, macropad off, then ask the keyboard what it shows
    session.write_config([0x07, 1 << 2]);
    assert_eq!(session.read_active_profile(PROFILE_COUNT), Some(0));
}

//! USB session for the macro-key interface.
//!
//! The stock kernel HID driver claims the whole keyboard but ignores the
//! macro bank, so the session detaches it from the macro-key interface and
//! reads the interrupt endpoint directly. Everything here is built to be
//! lost and reacquired: the keyboard can vanish at any moment and the
//! driver must survive it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rusb::constants::LIBUSB_REQUEST_SET_CONFIGURATION;
use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType, UsbContext};
use tracing::{debug, info, warn};

use crate::error::UsbError;
use crate::protocol::{PressState, Report, REPORT_LEN};

/// Microsoft vendor ID
pub const VENDOR_ID: u16 = 0x045e;
/// SideWinder X6 product ID
pub const PRODUCT_ID: u16 = 0x074b;

/// Interface carrying the macro-key endpoint
const MACRO_KEY_INTERFACE: u8 = 1;
/// Interrupt-in endpoint for macro-key reports
const MACRO_KEY_ENDPOINT: u8 = 0x82;
/// Wait between enumeration attempts while the keyboard is absent
const REDISCOVER_DELAY: Duration = Duration::from_secs(5);
/// Bound on control transfers so a half-unplugged device cannot wedge the loop
const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

/// wValue selecting the profile/config feature report
const CONFIG_WVALUE: u16 = 0x307;
/// wIndex: the macro-key interface
const CONFIG_WINDEX: u16 = 0x1;
/// GET_REPORT, for the best-effort profile readback
const REQUEST_GET_REPORT: u8 = 0x01;

/// Handle on the USB subsystem. Creating it is the one USB operation whose
/// failure is fatal to the driver.
pub struct Usb {
    ctx: Context,
}

impl Usb {
    pub fn init() -> Result<Self, UsbError> {
        let ctx = Context::new().map_err(UsbError::Init)?;
        Ok(Self { ctx })
    }

    /// Find and claim the keyboard, retrying with a fixed backoff for as
    /// long as it takes. The accessory may simply not be plugged in yet.
    ///
    /// Returns `None` only when `running` is lowered while the keyboard is
    /// absent, so shutdown is not held hostage by a missing device.
    pub fn acquire(&self, running: &AtomicBool) -> Option<DeviceSession> {
        loop {
            if !running.load(Ordering::SeqCst) {
                return None;
            }
            match self.ctx.open_device_with_vid_pid(VENDOR_ID, PRODUCT_ID) {
                Some(handle) => match DeviceSession::claim(handle) {
                    Ok(session) => return Some(session),
                    Err(e) => warn!("could not claim the keyboard: {e}, will retry"),
                },
                None => info!(
                    "keyboard {VENDOR_ID:04x}:{PRODUCT_ID:04x} not found, will retry in {}s",
                    REDISCOVER_DELAY.as_secs()
                ),
            }
            thread::sleep(REDISCOVER_DELAY);
        }
    }
}

/// Exclusive ownership of the opened keyboard.
///
/// Holds the one retained piece of decoder state, the previously seen
/// packed report, so that it cannot survive a reconnection by accident.
/// Teardown runs on drop: release the claimed interface, hand the device
/// back to the kernel driver, close the handle.
pub struct DeviceSession {
    handle: DeviceHandle<Context>,
    previous: PressState,
}

impl DeviceSession {
    /// Detach the kernel driver and claim the macro-key interface.
    ///
    /// The device-level detach/reset/reattach cycle first puts the keyboard
    /// back into a known state, then the macro-key interface alone is taken
    /// away from the kernel for exclusive interrupt access.
    fn claim(handle: DeviceHandle<Context>) -> Result<Self, rusb::Error> {
        if let Err(e) = handle.detach_kernel_driver(0) {
            debug!("no kernel driver to detach on interface 0: {e}");
        }
        handle.reset()?;
        if let Err(e) = handle.attach_kernel_driver(0) {
            debug!("could not reattach kernel driver on interface 0: {e}");
        }
        if let Err(e) = handle.detach_kernel_driver(MACRO_KEY_INTERFACE) {
            debug!("no kernel driver to detach on interface {MACRO_KEY_INTERFACE}: {e}");
        }
        handle.claim_interface(MACRO_KEY_INTERFACE)?;
        info!("keyboard claimed on interface {MACRO_KEY_INTERFACE}");
        Ok(Self {
            handle,
            previous: 0,
        })
    }

    /// Packed state of the last report seen on this session. Zero right
    /// after acquisition.
    pub fn previous(&self) -> PressState {
        self.previous
    }

    /// Retain the packed state of a freshly decoded report.
    pub fn set_previous(&mut self, press: PressState) {
        self.previous = press;
    }

    /// One interrupt transfer from the macro-key endpoint.
    ///
    /// `Ok(None)` is a timeout: no data, device still present; this is the
    /// loop's chance to observe the stop flag. A zero-length read or any
    /// other transfer failure means the keyboard is gone (or as good as
    /// gone) and the caller must reacquire. Unplug and transient bus errors
    /// are deliberately indistinguishable here.
    pub fn read_report(&self, timeout: Duration) -> Result<Option<Report>, UsbError> {
        let mut buf = [0u8; REPORT_LEN];
        match self.handle.read_interrupt(MACRO_KEY_ENDPOINT, &mut buf, timeout) {
            Ok(0) => Err(UsbError::EmptyRead),
            Ok(_) => Ok(Some(buf)),
            Err(rusb::Error::Timeout) => Ok(None),
            Err(e) => Err(UsbError::Transfer(e)),
        }
    }

    /// Push the 2-byte profile/config payload.
    ///
    /// Fire-and-forget: the device may already be mid-disconnect, in which
    /// case the reconnect path re-applies the payload anyway.
    pub fn write_config(&self, payload: [u8; 2]) {
        let request_type = rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface);
        match self.handle.write_control(
            request_type,
            LIBUSB_REQUEST_SET_CONFIGURATION,
            CONFIG_WVALUE,
            CONFIG_WINDEX,
            &payload,
            CONTROL_TIMEOUT,
        ) {
            Ok(_) => debug!("wrote config {payload:02x?}"),
            Err(e) => warn!("config write {payload:02x?} failed: {e}"),
        }
    }

    /// Ask the keyboard which profile LED it currently shows.
    ///
    /// Best effort: the active profile is encoded as a single set bit among
    /// positions 2..2+count of byte 1, matching what [`write_config`]
    /// transmits. Any failure or unrecognized payload yields `None`.
    ///
    /// [`write_config`]: DeviceSession::write_config
    pub fn read_active_profile(&self, profile_count: usize) -> Option<usize> {
        let request_type = rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface);
        let mut buf = [0u8; 2];
        match self.handle.read_control(
            request_type,
            REQUEST_GET_REPORT,
            CONFIG_WVALUE,
            CONFIG_WINDEX,
            &mut buf,
            CONTROL_TIMEOUT,
        ) {
            Ok(2) => (0..profile_count).find(|&i| buf[1] >> (i + 2) & 1 == 1),
            Ok(n) => {
                debug!("profile readback returned {n} bytes");
                None
            }
            Err(e) => {
                debug!("profile readback failed: {e}");
                None
            }
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(MACRO_KEY_INTERFACE) {
            debug!("releasing interface {MACRO_KEY_INTERFACE}: {e}");
        }
        if let Err(e) = self.handle.attach_kernel_driver(MACRO_KEY_INTERFACE) {
            debug!("reattaching kernel driver on interface {MACRO_KEY_INTERFACE}: {e}");
        }
        info!("keyboard released");
    }
}

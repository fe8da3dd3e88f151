//! USB access and wire protocol for the Microsoft SideWinder X6 macro-key
//! interface.
//!
//! This crate owns the two device-facing concerns: the session (open,
//! claim, interrupt reads, config control writes, teardown) and the pure
//! report decoder. Policy — profiles, macros, synthetic output — lives in
//! the driver on top.

pub mod error;
pub mod protocol;
pub mod session;

pub use error::UsbError;
pub use protocol::{decode, pack, KeyEvent, MediaKey, PressState, Report, REPORT_LEN};
pub use session::{DeviceSession, Usb, PRODUCT_ID, VENDOR_ID};

//! USB session error types

use thiserror::Error;

/// Errors from the macro-key USB session
#[derive(Error, Debug)]
pub enum UsbError {
    /// The libusb context could not be created. Fatal to the caller; nothing
    /// else in the driver can run without it.
    #[error("USB subsystem initialization failed: {0}")]
    Init(#[source] rusb::Error),

    /// An interrupt or control transfer failed mid-session. The device is
    /// treated as lost and reacquired; unplug and transient bus errors take
    /// the same path.
    #[error("transfer failed: {0}")]
    Transfer(#[from] rusb::Error),

    /// The interrupt endpoint returned zero bytes, which the keyboard never
    /// does while healthy.
    #[error("zero-length interrupt read")]
    EmptyRead,
}

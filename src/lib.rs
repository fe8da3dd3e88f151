//! SideWinder X6 macro-key driver.
//!
//! Library half of the `sidewinderd` binary: profile state, macro actions,
//! the uinput output device, and the dispatch loop that ties them to the
//! USB session from `sidewinder-usb`.

pub mod action;
pub mod cli;
pub mod dispatcher;
pub mod profile;
pub mod virtual_keyboard;

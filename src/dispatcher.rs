//! The driver's main loop: read, decode, dispatch, reconnect.
//!
//! Everything after startup is a two-state machine — connected or not —
//! with device loss always feeding back into reacquisition. The only
//! unrecoverable failures are the two startup ones: no virtual keyboard,
//! no USB subsystem.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, trace, warn};

use sidewinder_usb::{decode, DeviceSession, KeyEvent, Usb, UsbError};

use crate::action::ActionRunner;
use crate::profile::{ConfigTarget, ProfileState, MACROPAD_SLOT, PROFILE_COUNT};
use crate::virtual_keyboard::{media_key_code, VirtualKeyboard};

/// How long one interrupt read may block before the stop flag is rechecked
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Failures that abort startup. Everything after the loop starts is
/// absorbed and retried instead.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("could not create the virtual keyboard: {0}")]
    VirtualKeyboard(#[from] std::io::Error),

    #[error("could not initialize the USB subsystem: {0}")]
    Usb(#[from] UsbError),
}

impl ConfigTarget for DeviceSession {
    fn write_config(&mut self, payload: [u8; 2]) {
        DeviceSession::write_config(self, payload);
    }
}

pub struct Dispatcher {
    usb: Usb,
    keyboard: VirtualKeyboard,
    profiles: ProfileState,
    actions: Box<dyn ActionRunner>,
    running: Arc<AtomicBool>,
    session: Option<DeviceSession>,
}

impl Dispatcher {
    pub fn new(
        profiles: ProfileState,
        actions: Box<dyn ActionRunner>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, StartupError> {
        let keyboard = VirtualKeyboard::new()?;
        let usb = Usb::init()?;
        Ok(Self {
            usb,
            keyboard,
            profiles,
            actions,
            running,
            session: None,
        })
    }

    /// Run until the stop flag is lowered. Session teardown is implicit in
    /// dropping the session, whichever state the loop stopped in.
    pub fn run(mut self) {
        while self.running.load(Ordering::SeqCst) {
            match self.session.take() {
                None => self.connect(),
                Some(session) => self.poll(session),
            }
        }
        info!("stopping");
    }

    fn connect(&mut self) {
        let Some(mut session) = self.usb.acquire(&self.running) else {
            return; // stop raised while the keyboard was absent
        };
        // Prefer the profile the keyboard already shows, falling back to
        // our own notion; either way the config payload is re-pushed so the
        // LED state matches again.
        let target = session
            .read_active_profile(PROFILE_COUNT)
            .unwrap_or_else(|| self.profiles.active());
        self.profiles
            .activate(target, &mut session, self.actions.as_ref());
        self.session = Some(session);
    }

    fn poll(&mut self, mut session: DeviceSession) {
        match session.read_report(READ_TIMEOUT) {
            Ok(Some(report)) => {
                let (events, press) = decode(&report, session.previous());
                session.set_previous(press);
                for event in events {
                    self.dispatch(event, &mut session);
                }
                self.session = Some(session);
            }
            // idle keyboard; back around to recheck the stop flag
            Ok(None) => self.session = Some(session),
            Err(e) => {
                warn!("device lost ({e}), reacquiring");
                // dropping the session hands the interface back
            }
        }
    }

    fn dispatch(&mut self, event: KeyEvent, session: &mut DeviceSession) {
        match event {
            KeyEvent::MacroKeyReleased(slot) => self.run_macro(slot),
            KeyEvent::MacroPadAction => self.run_macro(MACROPAD_SLOT),
            KeyEvent::ProfileAdvance => {
                let next = self.profiles.active() + 1;
                self.profiles
                    .activate(next, session, self.actions.as_ref());
            }
            KeyEvent::MediaKey(key) => self.keyboard.send_key(media_key_code(key)),
            KeyEvent::Ignored => trace!("ignoring report"),
        }
    }

    fn run_macro(&self, slot: u8) {
        let path = self.profiles.macro_path(slot);
        if path.exists() {
            self.actions.submit(&path);
        } else {
            info!("{} does not exist, macro {slot} skipped", path.display());
        }
    }
}

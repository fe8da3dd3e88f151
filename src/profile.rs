//! Profile state: which macro set is active and what the keyboard's
//! LED/config payload should say.
//!
//! A profile is a directory. `p1`..`p3` under the profile root each hold a
//! macropad flag file, an optional on-load executable, and optional per-slot
//! macro executables. Nothing in here ever fails hard; a missing or
//! unreadable file just means the corresponding feature is off.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::action::ActionRunner;

/// Number of on-device profiles (the P1..P3 bank)
pub const PROFILE_COUNT: usize = 3;

/// Macro slot wired to the dedicated macropad media key
pub const MACROPAD_SLOT: u8 = 255;

/// Flag file: first byte '1' enables the profile's macropad LED bank
const MACROPAD_FLAG_FILE: &str = "macro_numpad";
/// Executable run once each time its profile becomes active
const ON_LOAD_FILE: &str = "load.sh";

/// Anything that accepts the 2-byte profile/config payload. Implemented by
/// the USB session; tests substitute a recorder.
pub trait ConfigTarget {
    fn write_config(&mut self, payload: [u8; 2]);
}

/// Filesystem layout plus the active-profile state machine.
pub struct ProfileState {
    root: PathBuf,
    /// `None` until the first activation, so the first one always counts as
    /// a change and runs its on-load action.
    active: Option<usize>,
}

impl ProfileState {
    pub fn new(root: PathBuf) -> Self {
        Self { root, active: None }
    }

    /// Create the profile tree if missing. Not fatal when it cannot be:
    /// missing directories just mean no macros are configured.
    pub fn bootstrap(&self) {
        for profile in 0..PROFILE_COUNT {
            let dir = self.profile_dir(profile);
            if let Err(e) = fs::create_dir_all(&dir) {
                tracing::warn!("could not create {}: {e}", dir.display());
            }
        }
        info!("profile data under {}", self.root.display());
    }

    /// Currently active profile index; 0 before the first activation.
    pub fn active(&self) -> usize {
        self.active.unwrap_or(0)
    }

    fn profile_dir(&self, profile: usize) -> PathBuf {
        self.root.join(format!("p{}", profile + 1))
    }

    /// Path of a slot's macro executable in the active profile.
    pub fn macro_path(&self, slot: u8) -> PathBuf {
        self.profile_dir(self.active()).join(format!("S{slot}.sh"))
    }

    /// First byte of the profile's flag file decides; anything unreadable
    /// degrades to disabled.
    pub fn macropad_enabled(&self, profile: usize) -> bool {
        let path = self.profile_dir(profile).join(MACROPAD_FLAG_FILE);
        match fs::read(&path) {
            Ok(bytes) => bytes.first() == Some(&b'1'),
            Err(e) => {
                debug!("{} unreadable ({e}), macropad disabled", path.display());
                false
            }
        }
    }

    /// The 2-byte payload encoding the lit profile LED and the macropad bit.
    pub fn config_payload(&self, profile: usize) -> [u8; 2] {
        let mut data = 1u8 << (profile + 2);
        if self.macropad_enabled(profile) {
            data |= 0x1;
        }
        [0x07, data]
    }

    /// Switch to `requested`, reduced modulo the profile count.
    ///
    /// The config payload is pushed on every call so that a reconnect
    /// restores the keyboard's LED state; the on-load action runs only when
    /// the index actually changed, keeping re-activations free of
    /// user-visible side effects.
    pub fn activate(
        &mut self,
        requested: usize,
        device: &mut dyn ConfigTarget,
        actions: &dyn ActionRunner,
    ) {
        let profile = requested % PROFILE_COUNT;
        let changed = self.active != Some(profile);
        self.active = Some(profile);
        info!("activating profile {}", profile + 1);
        device.write_config(self.config_payload(profile));
        if changed {
            let load = self.profile_dir(profile).join(ON_LOAD_FILE);
            if load.exists() {
                actions.submit(&load);
            } else {
                info!("{} does not exist, nothing to run on load", load.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::Path;

    #[derive(Default)]
    struct RecordingTarget {
        payloads: Vec<[u8; 2]>,
    }

    impl ConfigTarget for RecordingTarget {
        fn write_config(&mut self, payload: [u8; 2]) {
            self.payloads.push(payload);
        }
    }

    #[derive(Default)]
    struct RecordingRunner {
        submitted: RefCell<Vec<PathBuf>>,
    }

    impl ActionRunner for RecordingRunner {
        fn submit(&self, path: &Path) {
            self.submitted.borrow_mut().push(path.to_path_buf());
        }
    }

    fn state_in(dir: &tempfile::TempDir) -> ProfileState {
        let state = ProfileState::new(dir.path().to_path_buf());
        state.bootstrap();
        state
    }

    #[test]
    fn test_macropad_flag_file_controls_enablement() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);
        assert!(!state.macropad_enabled(0)); // file absent
        fs::write(dir.path().join("p1").join(MACROPAD_FLAG_FILE), "1").unwrap();
        assert!(state.macropad_enabled(0));
        fs::write(dir.path().join("p1").join(MACROPAD_FLAG_FILE), "0").unwrap();
        assert!(!state.macropad_enabled(0));
    }

    #[test]
    fn test_activation_reduces_modulo_profile_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let mut device = RecordingTarget::default();
        let runner = RecordingRunner::default();

        state.activate(4, &mut device, &runner);
        assert_eq!(state.active(), 1);
        assert_eq!(device.payloads, vec![[0x07, 1 << 3]]);
    }

    #[test]
    fn test_redundant_activation_rewrites_config_but_skips_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let mut device = RecordingTarget::default();
        let runner = RecordingRunner::default();
        let load = dir.path().join("p2").join(ON_LOAD_FILE);
        fs::write(&load, "#!/bin/sh\n").unwrap();

        state.activate(1, &mut device, &runner);
        state.activate(1, &mut device, &runner);

        assert_eq!(device.payloads.len(), 2, "config goes out on every call");
        assert_eq!(*runner.submitted.borrow(), vec![load], "on-load fires once");
    }

    #[test]
    fn test_advancing_past_the_last_profile_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let mut device = RecordingTarget::default();
        let runner = RecordingRunner::default();

        state.activate(2, &mut device, &runner);
        state.activate(state.active() + 1, &mut device, &runner);
        assert_eq!(state.active(), 0);
    }

    #[test]
    fn test_config_payload_combines_led_and_macropad_bit() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);
        fs::write(dir.path().join("p3").join(MACROPAD_FLAG_FILE), "1").unwrap();

        assert_eq!(state.config_payload(2), [0x07, 1 << 4 | 0x1]);
        assert_eq!(state.config_payload(0), [0x07, 1 << 2]);
    }

    #[test]
    fn test_macro_path_follows_the_active_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let mut device = RecordingTarget::default();
        let runner = RecordingRunner::default();

        assert_eq!(state.macro_path(3), dir.path().join("p1").join("S3.sh"));
        state.activate(2, &mut device, &runner);
        assert_eq!(
            state.macro_path(MACROPAD_SLOT),
            dir.path().join("p3").join("S255.sh")
        );
    }
}

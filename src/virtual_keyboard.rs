//! Synthetic keyboard output via uinput.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AttributeSet, EventType, InputEvent, KeyCode, SynchronizationCode, SynchronizationEvent,
};
use tracing::{debug, warn};

use sidewinder_usb::MediaKey;

/// Name the virtual device registers under
const DEVICE_NAME: &str = "sidewinderd";

/// One past the highest key code enabled on the virtual device
const KEY_CODE_END: u16 = 0x2ff;

/// Key code emitted for each of the keyboard's media keys.
pub fn media_key_code(key: MediaKey) -> KeyCode {
    match key {
        MediaKey::PlayPause => KeyCode::KEY_PLAYPAUSE,
        MediaKey::PreviousTrack => KeyCode::KEY_PREVIOUSSONG,
        MediaKey::NextTrack => KeyCode::KEY_NEXTSONG,
        MediaKey::Mute => KeyCode::KEY_MUTE,
        MediaKey::VolumeDown => KeyCode::KEY_VOLUMEDOWN,
        MediaKey::VolumeUp => KeyCode::KEY_VOLUMEUP,
        MediaKey::Calculator => KeyCode::KEY_CALC,
    }
}

/// A uinput keyboard that can type any key code.
pub struct VirtualKeyboard {
    device: VirtualDevice,
}

impl VirtualKeyboard {
    /// Create the uinput device. Failure is fatal to the driver: without an
    /// output device the media keys have nowhere to go.
    pub fn new() -> std::io::Result<Self> {
        let mut keys = AttributeSet::<KeyCode>::new();
        for code in 0..KEY_CODE_END {
            keys.insert(KeyCode::new(code));
        }
        let device = VirtualDeviceBuilder::new()?
            .name(DEVICE_NAME)
            .with_keys(&keys)?
            .build()?;
        Ok(Self { device })
    }

    /// Press and release `key`, then sync.
    pub fn send_key(&mut self, key: KeyCode) {
        debug!("sending {key:?}");
        let events = [
            InputEvent::new(EventType::KEY.0, key.0, 1),
            InputEvent::new(EventType::KEY.0, key.0, 0),
            SynchronizationEvent::new(SynchronizationCode::SYN_REPORT, 0).into(),
        ];
        if let Err(e) = self.device.emit(&events) {
            warn!("emitting {key:?} failed: {e}");
        }
    }
}

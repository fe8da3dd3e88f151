//! Wire protocol for the SideWinder X6 macro-key interface.
//!
//! The keyboard delivers 8-byte reports on the macro-key interrupt endpoint.
//! Byte 0 tags the report; the rest is either a bitmask of held macro keys
//! or a consumer-control payload for the media cluster. Reports are packed
//! little-endian into a single integer and decoded by comparing against the
//! previous packed value, so only edges produce events.

/// Length of one interrupt report.
pub const REPORT_LEN: usize = 8;

/// One raw interrupt report.
pub type Report = [u8; REPORT_LEN];

/// Little-endian packed report: which bits the keyboard currently asserts.
/// Byte 0 of the report occupies the low 8 bits.
pub type PressState = u64;

/// Report tag bytes (byte 0 of every report).
pub mod tag {
    /// Macro-key bank state
    pub const MACRO_KEY_EVENT: u8 = 0x08;
    /// Media / profile command
    pub const MEDIA_KEY_EVENT: u8 = 0x01;
}

/// Media command payloads, matched against the packed report shifted right
/// by 8 bits to drop the tag byte.
///
/// The two 48-bit codes are opaque: they are what the hardware sends for the
/// profile key and the dedicated macropad key, with no documented derivation.
/// The remaining values are standard USB consumer-control usages.
pub mod media {
    pub const PROFILE_ADVANCE: u64 = 0x140000000000;
    pub const MACROPAD_ACTION: u64 = 0x100000000000;
    pub const PLAY_PAUSE: u64 = 0xcd;
    pub const PREVIOUS_TRACK: u64 = 0xb6;
    pub const NEXT_TRACK: u64 = 0xb5;
    pub const MUTE: u64 = 0xe2;
    pub const VOLUME_DOWN: u64 = 0xea;
    pub const VOLUME_UP: u64 = 0xe9;
    pub const CALCULATOR: u64 = 0x192;
}

/// Media keys the keyboard can emit. The mapping to output key codes is the
/// consumer's concern; this crate only names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    PlayPause,
    PreviousTrack,
    NextTrack,
    Mute,
    VolumeDown,
    VolumeUp,
    Calculator,
}

/// A decoded keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Macro key `1..=64` went from held to released. Presses are
    /// deliberately silent: acting on release gives the user a last chance
    /// to abort before the macro fires.
    MacroKeyReleased(u8),
    /// One of the media cluster keys.
    MediaKey(MediaKey),
    /// The profile key: advance to the next profile.
    ProfileAdvance,
    /// The dedicated macropad key, bound to the reserved macro slot.
    MacroPadAction,
    /// Unrecognized tag or payload.
    Ignored,
}

/// Pack a report into its bit-asserted form.
pub fn pack(report: &Report) -> PressState {
    u64::from_le_bytes(*report)
}

/// Decode one report against the previously seen packed state.
///
/// Returns the decoded events plus the new packed state the caller must
/// retain for the next report. The first report after (re)acquiring the
/// device must be decoded against `previous = 0`: keys already held at
/// connect time then show up as pressed, not as spurious releases.
pub fn decode(report: &Report, previous: PressState) -> (Vec<KeyEvent>, PressState) {
    let current = pack(report);
    let events = match report[0] {
        tag::MACRO_KEY_EVENT => decode_macro_keys(current, previous),
        tag::MEDIA_KEY_EVENT => vec![decode_media_key(current)],
        _ => vec![KeyEvent::Ignored],
    };
    (events, current)
}

/// Walk the changed bits of the macro bank, emitting releases in ascending
/// slot order. Both values are shifted by 8 first to drop the tag byte.
fn decode_macro_keys(current: PressState, previous: PressState) -> Vec<KeyEvent> {
    let changed = (current ^ previous) >> 8;
    let held = current >> 8;
    let mut events = Vec::new();
    for slot in 0..64u8 {
        let transitioned = changed >> slot & 1 == 1;
        let released = held >> slot & 1 == 0;
        if transitioned && released {
            events.push(KeyEvent::MacroKeyReleased(slot + 1));
        }
    }
    events
}

/// Media payloads are matched on absolute value, not on transitions.
fn decode_media_key(current: PressState) -> KeyEvent {
    match current >> 8 {
        media::PROFILE_ADVANCE => KeyEvent::ProfileAdvance,
        media::MACROPAD_ACTION => KeyEvent::MacroPadAction,
        media::PLAY_PAUSE => KeyEvent::MediaKey(MediaKey::PlayPause),
        media::PREVIOUS_TRACK => KeyEvent::MediaKey(MediaKey::PreviousTrack),
        media::NEXT_TRACK => KeyEvent::MediaKey(MediaKey::NextTrack),
        media::MUTE => KeyEvent::MediaKey(MediaKey::Mute),
        media::VOLUME_DOWN => KeyEvent::MediaKey(MediaKey::VolumeDown),
        media::VOLUME_UP => KeyEvent::MediaKey(MediaKey::VolumeUp),
        media::CALCULATOR => KeyEvent::MediaKey(MediaKey::Calculator),
        _ => KeyEvent::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a macro-bank report from a slot bitmask (bit 0 = slot 1).
    fn macro_report(mask: u64) -> Report {
        (mask << 8 | tag::MACRO_KEY_EVENT as u64).to_le_bytes()
    }

    /// Build a media report from the post-shift payload value.
    fn media_report(payload: u64) -> Report {
        (payload << 8 | tag::MEDIA_KEY_EVENT as u64).to_le_bytes()
    }

    #[test]
    fn test_no_transitions_no_events() {
        let (events, press) = decode(&macro_report(0), 0);
        assert!(events.is_empty());
        assert_eq!(press, tag::MACRO_KEY_EVENT as u64);
    }

    #[test]
    fn test_release_of_slot_one() {
        let previous = pack(&macro_report(0b1));
        let (events, _) = decode(&macro_report(0), previous);
        assert_eq!(events, vec![KeyEvent::MacroKeyReleased(1)]);
    }

    #[test]
    fn test_press_is_silent() {
        let (events, press) = decode(&macro_report(0b1), 0);
        assert!(events.is_empty());
        // the press is still retained for the next edge
        assert_eq!(press >> 8 & 1, 1);
    }

    #[test]
    fn test_simultaneous_releases_ascend() {
        let previous = pack(&macro_report(0b1010_0010));
        let (events, _) = decode(&macro_report(0), previous);
        assert_eq!(
            events,
            vec![
                KeyEvent::MacroKeyReleased(2),
                KeyEvent::MacroKeyReleased(6),
                KeyEvent::MacroKeyReleased(8),
            ]
        );
    }

    #[test]
    fn test_same_report_twice_is_idempotent() {
        let report = macro_report(0b110);
        let (_, press) = decode(&report, 0);
        let (events, _) = decode(&report, press);
        assert!(events.is_empty());
    }

    #[test]
    fn test_keys_held_at_connect_do_not_fire() {
        // previous == 0 after every (re)acquisition, so a fully held bank
        // decodes as presses, never as releases
        let all_held = macro_report((1 << 56) - 1);
        let (events, _) = decode(&all_held, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_partial_release_keeps_held_keys_quiet() {
        let previous = pack(&macro_report(0b11));
        let (events, _) = decode(&macro_report(0b10), previous);
        assert_eq!(events, vec![KeyEvent::MacroKeyReleased(1)]);
    }

    #[test]
    fn test_media_play_pause() {
        let report: Report = [tag::MEDIA_KEY_EVENT, 0xcd, 0, 0, 0, 0, 0, 0];
        let (events, _) = decode(&report, 0);
        assert_eq!(events, vec![KeyEvent::MediaKey(MediaKey::PlayPause)]);
    }

    #[test]
    fn test_media_is_matched_on_absolute_value() {
        let report = media_report(media::VOLUME_UP);
        let (_, press) = decode(&report, 0);
        // unlike the macro bank, repeating the report repeats the event
        let (events, _) = decode(&report, press);
        assert_eq!(events, vec![KeyEvent::MediaKey(MediaKey::VolumeUp)]);
    }

    #[test]
    fn test_profile_advance_payload() {
        let (events, _) = decode(&media_report(media::PROFILE_ADVANCE), 0);
        assert_eq!(events, vec![KeyEvent::ProfileAdvance]);
    }

    #[test]
    fn test_macropad_action_payload() {
        let (events, _) = decode(&media_report(media::MACROPAD_ACTION), 0);
        assert_eq!(events, vec![KeyEvent::MacroPadAction]);
    }

    #[test]
    fn test_unknown_media_payload_ignored() {
        let (events, _) = decode(&media_report(0x9999), 0);
        assert_eq!(events, vec![KeyEvent::Ignored]);
    }

    #[test]
    fn test_unknown_tag_ignored() {
        let report: Report = [0x42, 0xff, 0, 0, 0, 0, 0, 0];
        let (events, _) = decode(&report, 0);
        assert_eq!(events, vec![KeyEvent::Ignored]);
    }
}

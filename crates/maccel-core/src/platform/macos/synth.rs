// Maccel macOS - Key synthesis
// Posts marked keyboard events at the HID level

use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, CGEventType, EventField};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

use super::ffi;
use crate::input::SYNTHETIC_EVENT_MARKER;
use crate::modifier;
use crate::output::{InjectionFailure, KeySynthesizer, SyntheticKey};

/// Posts through a private event source so synthetic modifiers never leak
/// into the combined keyboard state
#[derive(Debug, Default)]
pub struct QuartzSynthesizer;

impl QuartzSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl KeySynthesizer for QuartzSynthesizer {
    fn post(&self, key: SyntheticKey) -> Result<(), InjectionFailure> {
        let code = key
            .key
            .to_native()
            .ok_or(InjectionFailure::KeyOutOfRange(key.key))?;
        let source = CGEventSource::new(CGEventSourceStateID::Private)
            .map_err(|_| InjectionFailure::EventSource)?;
        let event = CGEvent::new_keyboard_event(source, code, key.down)
            .map_err(|_| InjectionFailure::EventCreation(key.key))?;

        if key.key.is_modifier() {
            event.set_type(CGEventType::FlagsChanged);
            // SAFETY: plain query of the session's modifier state
            let current = unsafe { ffi::CGEventSourceFlagsState(ffi::kCGEventSourceStateCombinedSessionState) };
            let flags = modifier::with_key(current, key.key, key.down);
            event.set_flags(CGEventFlags::from_bits_retain(flags));
        }

        event.set_integer_value_field(EventField::EVENT_SOURCE_USER_DATA, SYNTHETIC_EVENT_MARKER);
        event.post(CGEventTapLocation::HID);
        log::trace!("Posted {}", key);
        Ok(())
    }
}

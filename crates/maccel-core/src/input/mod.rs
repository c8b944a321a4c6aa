// Maccel Input Layer
// Raw event snapshots and classification

pub mod classifier;
pub mod event;

pub use classifier::{classify, extract_key_code, is_synthetic, key_action, EventCategory};
pub use event::{decode_key_text, event_type, RawKeyEvent, SYNTHETIC_EVENT_MARKER};

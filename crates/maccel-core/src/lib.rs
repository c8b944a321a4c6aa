// Maccel Core Library
// Event tap keyboard remapping engine for macOS

pub mod action;
pub mod config;
pub mod engine;
pub mod hid;
pub mod input;
pub mod input_source;
pub mod key;
pub mod mapping;
pub mod modifier;
pub mod output;
pub mod platform;
pub mod shortpress;
pub mod sim;
pub mod tap;
pub mod transform;

pub use action::Action;
pub use config::{Config, ConfigError, Strategy};
pub use engine::{EngineConfig, EngineContext, EngineError};
pub use input::{RawKeyEvent, SYNTHETIC_EVENT_MARKER};
pub use input_source::{InputSourceError, InputSourceSelector};
pub use key::{key_from_name, key_name, named_keys, KeyCode};
pub use mapping::{RemappingPair, RemappingTable, SharedTable};
pub use modifier::Modifiers;
pub use output::{InjectionFailure, KeySynthesizer, SyntheticKey};
pub use shortpress::ShortPressDetector;
pub use tap::{
    DisableReason, EngineNotice, EventListener, EventTap, TapBackend, TapConfig, TapError,
    TapState, TapVerdict,
};
pub use transform::{transform, HeldRemaps, TransformResult};

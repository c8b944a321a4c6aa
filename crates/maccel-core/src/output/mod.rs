// Maccel Output Layer
// Synthetic key posting and deferred side effects

mod dispatch;
mod synth;

pub use dispatch::{ActionQueue, DeferredAction, Dispatcher, DEFAULT_QUEUE_CAPACITY};
pub use synth::{InjectionFailure, KeySynthesizer, SyntheticKey};

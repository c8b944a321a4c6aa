// Maccel macOS Platform
// Quartz event tap backend, key synthesis and input source selection

mod ffi;
mod input_source;
mod synth;
mod tap;

pub use input_source::TisInputSources;
pub use synth::QuartzSynthesizer;
pub use tap::{has_accessibility_permission, QuartzTapBackend, QuartzTapPort};

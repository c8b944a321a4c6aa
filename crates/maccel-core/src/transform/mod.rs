// Maccel Transform Module
// Core transformation logic for keyboard event processing

pub mod held;
pub mod transformer;

pub use held::HeldRemaps;
pub use transformer::{remap, transform, RemapStrategy, TransformResult};

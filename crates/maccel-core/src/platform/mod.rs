// Maccel Platform Backends

#[cfg(target_os = "macos")]
pub mod macos;

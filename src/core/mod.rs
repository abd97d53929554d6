//! Compilation configuration and toolchain identity.

pub mod config;
pub mod platform;
pub mod toolchain;

pub use config::{ConfigError, Configuration, OptimizeLevel, WarningToggle};
pub use platform::Platform;
pub use toolchain::{ConfiguredToolchain, Toolchain};

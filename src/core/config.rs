//! Compilation configuration.
//!
//! A `Configuration` is an additive set of compiler knobs. It is a plain
//! value type: `clone()` yields a deep, independent copy, and `merge`
//! always returns a new value, so a scoped override can never leak into
//! an ancestor or sibling scope.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised before any graph construction begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An unrecognized build configuration name was requested.
    #[error("unknown build configuration `{0}`\nrecognized configurations: debug, release")]
    UnknownConfig(String),

    /// An unrecognized platform name was requested.
    #[error("unknown platform `{0}`\nrecognized platforms: host, linux, macos, windows, raspi")]
    UnknownPlatform(String),

    /// No usable C compiler was found for the requested platform.
    #[error("no C compiler found for platform `{platform}`\n\
             set the CC environment variable or install {hint}")]
    NoCompilerFound { platform: String, hint: String },
}

/// Optimization level for compiled code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeLevel {
    /// No optimization (`-O0`).
    #[default]
    None,
    /// Maximum optimization (`-O3`).
    Maximum,
}

/// An individual warning switched on or off by name (e.g. `all`, `unused-parameter`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningToggle {
    pub name: String,
    pub enabled: bool,
}

impl WarningToggle {
    pub fn enable(name: impl Into<String>) -> Self {
        WarningToggle {
            name: name.into(),
            enabled: true,
        }
    }

    pub fn disable(name: impl Into<String>) -> Self {
        WarningToggle {
            name: name.into(),
            enabled: false,
        }
    }

    /// Render as a GCC-style flag (`-W<name>` or `-Wno-<name>`).
    pub fn to_flag(&self) -> String {
        if self.enabled {
            format!("-W{}", self.name)
        } else {
            format!("-Wno-{}", self.name)
        }
    }
}

/// An additive set of compilation knobs.
///
/// List fields concatenate on merge; earlier entries win where order
/// matters (include-path precedence). Scalar fields are taken from the
/// receiver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Optimization level.
    pub optimize: OptimizeLevel,

    /// Whether to emit debug symbols.
    pub include_symbols: bool,

    /// Preprocessor defines (`NAME` or `NAME=VALUE`).
    pub defines: Vec<String>,

    /// Include directories, in precedence order.
    pub include_dirs: Vec<PathBuf>,

    /// System libraries to link (without `-l` prefix).
    pub system_libraries: Vec<String>,

    /// Static library files to link (full paths).
    pub static_libraries: Vec<PathBuf>,

    /// Per-warning toggles.
    pub warnings: Vec<WarningToggle>,
}

impl Configuration {
    /// Look up a named build configuration.
    ///
    /// `debug` is unoptimized with symbols; `release` is maximally
    /// optimized without symbols. Anything else fails fast, before any
    /// graph construction proceeds.
    pub fn named(name: &str) -> Result<Configuration, ConfigError> {
        match name {
            "debug" => Ok(Configuration {
                optimize: OptimizeLevel::None,
                include_symbols: true,
                ..Configuration::default()
            }),
            "release" => Ok(Configuration {
                optimize: OptimizeLevel::Maximum,
                include_symbols: false,
                ..Configuration::default()
            }),
            other => Err(ConfigError::UnknownConfig(other.to_string())),
        }
    }

    /// Merge two configurations into a new one.
    ///
    /// List fields are concatenated with `self`'s entries first; scalar
    /// fields are taken from `self`. Neither input is modified.
    pub fn merge(&self, other: &Configuration) -> Configuration {
        let mut merged = self.clone();
        merged.defines.extend(other.defines.iter().cloned());
        merged
            .include_dirs
            .extend(other.include_dirs.iter().cloned());
        merged
            .system_libraries
            .extend(other.system_libraries.iter().cloned());
        merged
            .static_libraries
            .extend(other.static_libraries.iter().cloned());
        merged.warnings.extend(other.warnings.iter().cloned());
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_debug() {
        let config = Configuration::named("debug").unwrap();
        assert_eq!(config.optimize, OptimizeLevel::None);
        assert!(config.include_symbols);
    }

    #[test]
    fn test_named_release() {
        let config = Configuration::named("release").unwrap();
        assert_eq!(config.optimize, OptimizeLevel::Maximum);
        assert!(!config.include_symbols);
    }

    #[test]
    fn test_named_unknown_fails() {
        let err = Configuration::named("profile").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownConfig(name) if name == "profile"));
    }

    #[test]
    fn test_merge_concatenates_self_first() {
        let mut a = Configuration::named("debug").unwrap();
        a.defines.push("A".to_string());
        a.include_dirs.push(PathBuf::from("a/include"));

        let mut b = Configuration::default();
        b.defines.push("B".to_string());
        b.include_dirs.push(PathBuf::from("b/include"));

        let merged = a.merge(&b);
        assert_eq!(merged.defines, ["A", "B"]);
        assert_eq!(
            merged.include_dirs,
            [PathBuf::from("a/include"), PathBuf::from("b/include")]
        );
        // Scalars come from the receiver.
        assert_eq!(merged.optimize, OptimizeLevel::None);
        assert!(merged.include_symbols);
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let mut a = Configuration::default();
        a.defines.push("A".to_string());
        let mut b = Configuration::default();
        b.defines.push("B".to_string());

        let _ = a.merge(&b);
        assert_eq!(a.defines, ["A"]);
        assert_eq!(b.defines, ["B"]);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = Configuration::default();
        original.defines.push("KEEP".to_string());

        let mut scoped = original.clone();
        scoped.defines.push("SCOPED".to_string());

        assert_eq!(original.defines, ["KEEP"]);
        assert_eq!(scoped.defines, ["KEEP", "SCOPED"]);
    }

    #[test]
    fn test_warning_toggle_flags() {
        assert_eq!(WarningToggle::enable("all").to_flag(), "-Wall");
        assert_eq!(
            WarningToggle::disable("unused-parameter").to_flag(),
            "-Wno-unused-parameter"
        );
    }
}

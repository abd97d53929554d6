//! Target platform selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::config::ConfigError;

/// A concrete target platform.
///
/// `host` is not a variant: it is resolved to the running system by
/// [`Platform::parse`] before any graph construction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Macos,
    Windows,
    /// Embedded single-board ARM target, cross-compiled.
    Raspi,
}

impl Platform {
    /// The platform of the running system.
    pub fn host() -> Platform {
        if cfg!(target_os = "macos") {
            Platform::Macos
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    /// Parse a platform name, resolving `host` to the running system.
    pub fn parse(name: &str) -> Result<Platform, ConfigError> {
        match name {
            "host" => Ok(Platform::host()),
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::Macos),
            "windows" => Ok(Platform::Windows),
            "raspi" => Ok(Platform::Raspi),
            other => Err(ConfigError::UnknownPlatform(other.to_string())),
        }
    }

    /// Whether this platform differs from the running system.
    pub fn is_cross(&self) -> bool {
        *self != Platform::host()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Macos => "macos",
            Platform::Windows => "windows",
            Platform::Raspi => "raspi",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_resolves_to_running_system() {
        let platform = Platform::parse("host").unwrap();
        assert_eq!(platform, Platform::host());
        assert!(!platform.is_cross());
    }

    #[test]
    fn test_parse_raspi() {
        assert_eq!(Platform::parse("raspi").unwrap(), Platform::Raspi);
    }

    #[test]
    fn test_parse_unknown_fails() {
        let err = Platform::parse("amiga").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlatform(name) if name == "amiga"));
    }

    #[test]
    fn test_display_round_trips() {
        for name in ["linux", "macos", "windows", "raspi"] {
            assert_eq!(Platform::parse(name).unwrap().to_string(), name);
        }
    }
}

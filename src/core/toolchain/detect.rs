//! Toolchain discovery.

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config::ConfigError;
use crate::core::platform::Platform;
use crate::util::process::find_executable;

use super::{GccToolchain, Toolchain};

/// Discover the toolchain for the running system.
///
/// Priority: the `CC` environment variable, then `cc`, `gcc`, and
/// `clang` on PATH. The C++ compiler and archiver are taken from `CXX`
/// and `AR` when set, otherwise inferred.
pub fn discover_host_toolchain() -> Result<Arc<dyn Toolchain>, ConfigError> {
    let cc = std::env::var("CC")
        .ok()
        .and_then(|cc| find_executable(&cc))
        .or_else(|| {
            ["cc", "gcc", "clang"]
                .iter()
                .find_map(|name| find_executable(name))
        })
        .ok_or_else(|| ConfigError::NoCompilerFound {
            platform: Platform::host().to_string(),
            hint: "gcc or clang".to_string(),
        })?;

    let cxx = std::env::var("CXX")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| GccToolchain::infer_cxx(&cc));

    let ar = std::env::var("AR")
        .ok()
        .and_then(|ar| find_executable(&ar))
        .or_else(|| find_executable("ar"))
        .unwrap_or_else(|| PathBuf::from("ar"));

    let name = cc
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cc".to_string());

    tracing::debug!("discovered host toolchain: {}", cc.display());

    Ok(Arc::new(GccToolchain::new(name, cc, cxx, ar)))
}

/// The toolchain for a selected platform.
///
/// The embedded ARM target wires its cross triple explicitly; every
/// other platform resolves to the running system's toolchain.
pub fn toolchain_for_platform(platform: Platform) -> Result<Arc<dyn Toolchain>, ConfigError> {
    match platform {
        Platform::Raspi => Ok(Arc::new(GccToolchain::cross("arm-linux-gnueabihf"))),
        _ => discover_host_toolchain(),
    }
}

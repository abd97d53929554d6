//! Build descriptions for the bundled demo project.
//!
//! The demo mirrors a small C project: a core static library with a
//! public include tree, a vendored checksum library behind an external
//! description boundary, a host-built header generator whose output is
//! a hard dependency of the application, and the application itself.
//! Every description is an ordinary function invoked through the
//! registry, so shared subtrees (the core library is requested from
//! both the build and the package entry points) are constructed once.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use gantry::core::toolchain::{toolchain_for_platform, CommandSpec, ConfiguredToolchain};
use gantry::core::WarningToggle;
use gantry::{Configuration, ModuleId, ModuleSpec, Platform, Registry};

/// Resolved path of the vendored checksum description.
pub const CHECKSUM_DESCRIPTION: &str = "demos/vendor/checksum";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectParams {
    /// Project root containing the demo sources.
    pub root: PathBuf,
    /// Configuration-specific output directory.
    pub out_dir: PathBuf,
    /// Target platform name.
    pub platform: String,
    /// Configuration name (debug, release).
    pub config: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageParams {
    pub project: ProjectParams,
    pub package_dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct ChecksumParams {
    root: PathBuf,
    out_dir: PathBuf,
    platform: String,
    config: String,
}

#[derive(Serialize, Deserialize)]
struct ChecksumOutput {
    module: ModuleId,
}

/// Register the demo's external build descriptions.
pub fn register_vendor_descriptions(registry: &mut Registry) {
    registry.register_external(CHECKSUM_DESCRIPTION, "build", checksum_entry);
}

/// Entry point for a plain build: constructs the application subtree
/// and requests its artifacts.
pub fn start_builds(registry: &mut Registry, params: &ProjectParams) -> Result<Vec<PathBuf>> {
    let app = registry.invoke(build_app, params)?;
    let goals = registry.output_files(app).to_vec();
    for goal in &goals {
        registry.request_build(goal.clone());
    }
    Ok(goals)
}

/// Entry point for packaging: constructs the application subtree,
/// attaches the distributable files, and requests the package stamp.
pub fn start_package_build(registry: &mut Registry, params: &PackageParams) -> Result<PathBuf> {
    let app = registry.invoke(build_app, &params.project)?;
    let libcore = registry.invoke(build_libcore, &params.project)?;

    for artifact in registry.output_files(app).to_vec() {
        registry.attach_package_file(app, artifact);
    }
    for artifact in registry.output_files(libcore).to_vec() {
        registry.attach_package_file(libcore, artifact);
    }
    registry.attach_package_dir(libcore, params.project.root.join("demos/libcore/include"));

    let stamp = registry.copy_package_files(app, params.package_dir.clone())?;
    registry.request_build(stamp.clone());
    Ok(stamp)
}

/// The demo application: depends on the core library, the vendored
/// checksum library, and a generated version header.
fn build_app(registry: &mut Registry, params: &ProjectParams) -> Result<ModuleId> {
    let libcore = registry.invoke(build_libcore, params)?;
    let checksum: ChecksumOutput = registry.invoke_external(
        CHECKSUM_DESCRIPTION,
        "build",
        &ChecksumParams {
            root: params.root.join("demos/vendor/checksum"),
            out_dir: params.out_dir.join("checksum"),
            platform: params.platform.clone(),
            config: params.config.clone(),
        },
    )?;
    let backend = registry.invoke(build_backend, params)?;
    let version_header = registry.invoke(generate_version_header, params)?;

    let tc = configured(&params.platform, &params.config)?;
    let spec = ModuleSpec::executable("app", params.out_dir.join("app"))
        .sources([params.root.join("demos/app/main.c")])
        .private_include_dirs([params.out_dir.join("gen")])
        .dependencies([libcore, backend, checksum.module])
        .hard_dependencies([version_header]);
    Ok(registry.define_module(spec, &tc)?)
}

/// The display backend. Each platform selects exactly one source set;
/// the match is exhaustive, and unknown platform names were already
/// rejected by [`Platform::parse`].
fn backend_source(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "demos/backend/src/backend_win32.c",
        Platform::Raspi => "demos/backend/src/backend_dispmanx.c",
        Platform::Linux | Platform::Macos => "demos/backend/src/backend_sdl.c",
    }
}

fn build_backend(registry: &mut Registry, params: &ProjectParams) -> Result<ModuleId> {
    let platform = Platform::parse(&params.platform)?;
    let tc = configured(&params.platform, &params.config)?;
    let src = params.root.join("demos/backend");
    let spec = ModuleSpec::static_lib("backend", params.out_dir.join("backend"))
        .sources([
            params.root.join(backend_source(platform)),
            src.join("include/backend/backend.h"),
        ])
        .public_include_dirs([src.join("include")]);
    Ok(registry.define_module(spec, &tc)?)
}

/// The core static library with its public include tree. Warnings are
/// raised for this subtree only; siblings are unaffected.
fn build_libcore(registry: &mut Registry, params: &ProjectParams) -> Result<ModuleId> {
    let mut strict = Configuration::default();
    strict.warnings.push(WarningToggle::enable("all"));
    let tc = configured(&params.platform, &params.config)?.extended(&strict);
    let src = params.root.join("demos/libcore");
    let spec = ModuleSpec::static_lib("core", params.out_dir.join("libcore"))
        .sources([src.join("src/core.c"), src.join("include/libcore/core.h")])
        .public_include_dirs([src.join("include")])
        .public_defines(["LIBCORE_API=1"]);
    Ok(registry.define_module(spec, &tc)?)
}

/// The header generator tool. Always built with the host toolchain so
/// it stays runnable during cross builds.
fn build_mkheader(registry: &mut Registry, params: &ProjectParams) -> Result<PathBuf> {
    let tc = configured("host", &params.config)?;
    let spec = ModuleSpec::executable("mkheader", params.out_dir.join("tools"))
        .sources([params.root.join("demos/tools/mkheader.c")]);
    let id = registry.define_module(spec, &tc)?;
    Ok(registry.output_files(id)[0].clone())
}

/// Run the generator to produce the version header. Consumers list the
/// header as a hard dependency, which orders them after this command.
fn generate_version_header(registry: &mut Registry, params: &ProjectParams) -> Result<PathBuf> {
    let mkheader = registry.invoke(build_mkheader, params)?;
    let header = params.out_dir.join("gen/version.h");
    registry.system_command(
        [mkheader.clone()],
        [header.clone()],
        CommandSpec::new(&mkheader)
            .arg(header.display().to_string())
            .arg("GANTRY_DEMO_VERSION")
            .arg("\"0.1.0\""),
    )?;
    Ok(header)
}

fn checksum_entry(
    registry: &mut Registry,
    params: serde_json::Value,
) -> Result<serde_json::Value> {
    let params: ChecksumParams = serde_json::from_value(params)?;
    let tc = configured(&params.platform, &params.config)?;
    let spec = ModuleSpec::static_lib("checksum", params.out_dir)
        .sources([
            params.root.join("checksum.c"),
            params.root.join("checksum.h"),
        ])
        .public_include_dirs([params.root]);
    let module = registry.define_module(spec, &tc)?;
    Ok(serde_json::to_value(ChecksumOutput { module })?)
}

fn configured(platform: &str, config: &str) -> Result<ConfiguredToolchain> {
    let platform = Platform::parse(platform)?;
    let toolchain = toolchain_for_platform(platform)?;
    Ok(ConfiguredToolchain::new(
        toolchain,
        Configuration::named(config)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use gantry::graph::RuleAction;

    fn raspi_params() -> ProjectParams {
        ProjectParams {
            root: PathBuf::from("proj"),
            out_dir: PathBuf::from("out/debug"),
            platform: "raspi".to_string(),
            config: "debug".to_string(),
        }
    }

    #[test]
    fn test_each_platform_selects_exactly_one_backend() {
        assert_eq!(
            backend_source(Platform::Windows),
            "demos/backend/src/backend_win32.c"
        );
        assert_eq!(
            backend_source(Platform::Raspi),
            "demos/backend/src/backend_dispmanx.c"
        );
        assert_eq!(
            backend_source(Platform::Linux),
            "demos/backend/src/backend_sdl.c"
        );
        assert_eq!(
            backend_source(Platform::Macos),
            "demos/backend/src/backend_sdl.c"
        );
    }

    #[test]
    fn test_raspi_wires_cross_toolchain_and_one_backend() {
        let mut registry = Registry::new();
        let id = registry.invoke(build_backend, &raspi_params()).unwrap();

        let compiles: Vec<_> = registry
            .rules()
            .iter()
            .filter(|r| r.description.starts_with("compile"))
            .collect();
        assert_eq!(compiles.len(), 1, "exactly one backend source compiles");
        assert!(compiles[0]
            .inputs[0]
            .ends_with("demos/backend/src/backend_dispmanx.c"));

        let RuleAction::Process(cmd) = &compiles[0].action else {
            panic!("compile rule is a process rule");
        };
        assert!(cmd
            .program
            .to_string_lossy()
            .starts_with("arm-linux-gnueabihf"));

        assert!(registry.output_files(id)[0].ends_with("backend/libbackend.a"));
    }

    #[test]
    fn test_unknown_platform_rejected_before_construction() {
        let mut params = raspi_params();
        params.platform = "amiga".to_string();

        let mut registry = Registry::new();
        assert!(registry.invoke(build_backend, &params).is_err());
        assert!(registry.rules().is_empty());
    }
}

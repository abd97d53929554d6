//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use crate::core::config::{Configuration, OptimizeLevel};

use super::{ArchiveInput, CommandSpec, CompileInput, LinkInput, Toolchain};

/// GCC-style toolchain (gcc, clang, or a cross triple thereof).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Stable identity, e.g. "gcc", "clang", "arm-linux-gnueabihf-gcc"
    name: String,
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Path to the archiver
    pub ar: PathBuf,
}

impl GccToolchain {
    /// Create a new GCC-style toolchain from explicit tool paths.
    pub fn new(name: impl Into<String>, cc: PathBuf, cxx: PathBuf, ar: PathBuf) -> Self {
        GccToolchain {
            name: name.into(),
            cc,
            cxx,
            ar,
        }
    }

    /// The conventional host toolchain, without PATH discovery.
    pub fn host_default() -> Self {
        GccToolchain::new(
            "gcc",
            PathBuf::from("cc"),
            PathBuf::from("c++"),
            PathBuf::from("ar"),
        )
    }

    /// A cross toolchain for the given target triple prefix
    /// (e.g. `arm-linux-gnueabihf`).
    pub fn cross(prefix: &str) -> Self {
        GccToolchain::new(
            format!("{prefix}-gcc"),
            PathBuf::from(format!("{prefix}-gcc")),
            PathBuf::from(format!("{prefix}-g++")),
            PathBuf::from(format!("{prefix}-ar")),
        )
    }

    /// Infer a C++ compiler path from a C compiler path.
    ///
    /// Handles common patterns:
    /// - gcc, arm-linux-gnueabihf-gcc -> g++, arm-linux-gnueabihf-g++
    /// - clang -> clang++
    /// - cc, /usr/bin/cc -> c++, /usr/bin/c++
    pub fn infer_cxx(cc: &Path) -> PathBuf {
        let cc_str = cc.to_string_lossy();

        if cc_str.ends_with("gcc") {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 2]));
        }

        if cc_str.ends_with("clang") {
            return PathBuf::from(format!("{cc_str}++"));
        }

        let is_standalone_cc = cc_str == "cc"
            || cc_str.ends_with("/cc")
            || cc_str.ends_with("\\cc")
            || cc_str.ends_with("-cc");

        if is_standalone_cc {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 1]));
        }

        PathBuf::from(format!("{cc_str}++"))
    }

    fn configuration_flags(&self, config: &Configuration) -> Vec<String> {
        let mut flags = Vec::new();

        flags.push(match config.optimize {
            OptimizeLevel::None => "-O0".to_string(),
            OptimizeLevel::Maximum => "-O3".to_string(),
        });

        if config.include_symbols {
            flags.push("-g".to_string());
        }

        for toggle in &config.warnings {
            flags.push(toggle.to_flag());
        }

        for dir in &config.include_dirs {
            flags.push(format!("-I{}", dir.display()));
        }

        for define in &config.defines {
            flags.push(format!("-D{define}"));
        }

        flags
    }
}

/// C++ source extensions; `.C` (uppercase) is C++ on case-sensitive systems.
fn is_cpp_source(path: &Path) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    let ext = ext.to_string_lossy();
    matches!(ext.as_ref(), "cpp" | "cc" | "cxx" | "c++") || ext == "C"
}

impl Toolchain for GccToolchain {
    fn name(&self) -> &str {
        &self.name
    }

    fn object_extension(&self) -> &'static str {
        "o"
    }

    fn static_lib_filename(&self, name: &str) -> String {
        format!("lib{name}.a")
    }

    fn shared_lib_filename(&self, name: &str) -> String {
        if cfg!(target_os = "macos") {
            format!("lib{name}.dylib")
        } else {
            format!("lib{name}.so")
        }
    }

    fn executable_filename(&self, name: &str) -> String {
        name.to_string()
    }

    fn compile_command(&self, input: &CompileInput, config: &Configuration) -> CommandSpec {
        let compiler = if is_cpp_source(&input.source) {
            &self.cxx
        } else {
            &self.cc
        };

        let mut cmd = CommandSpec::new(compiler).arg("-c");

        if input.pic {
            cmd = cmd.arg("-fPIC");
        }

        cmd = cmd.args(self.configuration_flags(config));

        cmd.arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.output.display().to_string())
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.ar)
            .arg("rcs")
            .arg(input.output.display().to_string());

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        cmd
    }

    fn link_shared_command(&self, input: &LinkInput, config: &Configuration) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cxx)
            .arg("-shared")
            .arg("-o")
            .arg(input.output.display().to_string());

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        // Dependency archives before system libraries, in dependency order.
        for lib in &input.static_libraries {
            cmd = cmd.arg(lib.display().to_string());
        }

        for lib in input
            .system_libraries
            .iter()
            .chain(config.system_libraries.iter())
        {
            cmd = cmd.arg(format!("-l{lib}"));
        }

        cmd
    }

    fn link_exe_command(&self, input: &LinkInput, config: &Configuration) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cxx)
            .arg("-o")
            .arg(input.output.display().to_string());

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        for lib in &input.static_libraries {
            cmd = cmd.arg(lib.display().to_string());
        }

        for lib in input
            .system_libraries
            .iter()
            .chain(config.system_libraries.iter())
        {
            cmd = cmd.arg(format!("-l{lib}"));
        }

        cmd
    }
}

//! Toolchain abstraction.
//!
//! A `Toolchain` is the platform/compiler identity that lowers a
//! `Configuration` into concrete invocation commands. The host toolchain
//! is discovered automatically; cross targets (e.g. the ARM single-board
//! target) are constructed explicitly.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::core::config::Configuration;

mod detect;
mod gcc;

pub use detect::{discover_host_toolchain, toolchain_for_platform};
pub use gcc::GccToolchain;

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandSpec {
    /// The program to run (e.g. "gcc", "arm-linux-gnueabihf-gcc")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Display the full command line for error messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Source file to compile
    pub source: PathBuf,
    /// Output object file
    pub output: PathBuf,
    /// Emit position-independent code (shared library members)
    pub pic: bool,
}

/// Input for an archive step (creating a static library).
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    /// Object files to archive
    pub objects: Vec<PathBuf>,
    /// Output archive file
    pub output: PathBuf,
}

/// Input for a link step.
#[derive(Debug, Clone)]
pub struct LinkInput {
    /// Object files to link
    pub objects: Vec<PathBuf>,
    /// Output file (executable or shared library)
    pub output: PathBuf,
    /// Static library files to link, dependency order
    pub static_libraries: Vec<PathBuf>,
    /// System libraries to link (without `-l` prefix)
    pub system_libraries: Vec<String>,
}

/// Platform/compiler identity that turns a `Configuration` into concrete
/// invocation commands. Immutable once discovered or constructed.
pub trait Toolchain: fmt::Debug + Send + Sync {
    /// Stable identity for this toolchain (participates in memo keys).
    fn name(&self) -> &str;

    /// Object file extension (without dot).
    fn object_extension(&self) -> &'static str;

    /// Filename for a static library with the given module name.
    fn static_lib_filename(&self, name: &str) -> String;

    /// Filename for a shared library with the given module name.
    fn shared_lib_filename(&self, name: &str) -> String;

    /// Filename for an executable with the given module name.
    fn executable_filename(&self, name: &str) -> String;

    /// Lower a compile step into a concrete command.
    fn compile_command(&self, input: &CompileInput, config: &Configuration) -> CommandSpec;

    /// Lower an archive step into a concrete command.
    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec;

    /// Lower a shared-library link step into a concrete command.
    fn link_shared_command(&self, input: &LinkInput, config: &Configuration) -> CommandSpec;

    /// Lower an executable link step into a concrete command.
    fn link_exe_command(&self, input: &LinkInput, config: &Configuration) -> CommandSpec;
}

/// A toolchain paired with the configuration threaded through a build
/// subtree. Each subtree may clone and extend its copy without leaking
/// changes upward or sideways.
#[derive(Debug, Clone)]
pub struct ConfiguredToolchain {
    pub toolchain: Arc<dyn Toolchain>,
    pub configuration: Configuration,
}

impl ConfiguredToolchain {
    pub fn new(toolchain: Arc<dyn Toolchain>, configuration: Configuration) -> Self {
        ConfiguredToolchain {
            toolchain,
            configuration,
        }
    }

    /// A copy of this pairing with a different configuration.
    pub fn with_configuration(&self, configuration: Configuration) -> Self {
        ConfiguredToolchain {
            toolchain: Arc::clone(&self.toolchain),
            configuration,
        }
    }

    /// A scoped copy whose configuration is extended by `extra`.
    /// The receiver is unaffected.
    pub fn extended(&self, extra: &Configuration) -> Self {
        self.with_configuration(self.configuration.merge(extra))
    }
}

// Memo keys need a stable rendition of the pairing: the toolchain
// contributes its name, the configuration its full value.
impl Serialize for ConfiguredToolchain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ConfiguredToolchain", 2)?;
        state.serialize_field("toolchain", self.toolchain.name())?;
        state.serialize_field("configuration", &self.configuration)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::OptimizeLevel;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("gcc")
            .arg("-c")
            .args(["main.c", "-o", "main.o"])
            .env("LANG", "C");

        assert_eq!(spec.program, PathBuf::from("gcc"));
        assert_eq!(spec.args, ["-c", "main.c", "-o", "main.o"]);
        assert_eq!(spec.env, [("LANG".to_string(), "C".to_string())]);
        assert_eq!(spec.display(), "gcc -c main.c -o main.o");
    }

    #[test]
    fn test_extended_does_not_leak_upward() {
        let toolchain: Arc<dyn Toolchain> = Arc::new(GccToolchain::host_default());
        let base = ConfiguredToolchain::new(toolchain, Configuration::named("debug").unwrap());

        let mut extra = Configuration::default();
        extra.defines.push("SCOPED".to_string());
        let scoped = base.extended(&extra);

        assert!(scoped.configuration.defines.contains(&"SCOPED".to_string()));
        assert!(base.configuration.defines.is_empty());
        assert_eq!(scoped.configuration.optimize, OptimizeLevel::None);
    }

    #[test]
    fn test_serialize_uses_toolchain_name() {
        let toolchain: Arc<dyn Toolchain> = Arc::new(GccToolchain::host_default());
        let configured = ConfiguredToolchain::new(toolchain, Configuration::default());

        let json = serde_json::to_value(&configured).unwrap();
        assert_eq!(json["toolchain"], "gcc");
        assert!(json["configuration"].is_object());
    }
}

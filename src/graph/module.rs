//! Module types.
//!
//! A module is a named compilation unit: a static library, shared
//! library, or executable with sources, include paths, and dependencies
//! on other modules. Modules are mutated only while the graph is being
//! constructed and are immutable afterward.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Handle to a module constructed in a [`Registry`](crate::graph::Registry).
///
/// Serializable so that description results carrying module handles can
/// flow through the memo table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The kind of compilation unit a module produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Static library (`lib<name>.a`)
    StaticLib,
    /// Shared library (`lib<name>.so` / `lib<name>.dylib`)
    SharedLib,
    /// Executable binary
    Executable,
}

impl ModuleKind {
    /// Whether dependents link this module's artifact.
    pub fn is_linkable(&self) -> bool {
        matches!(self, ModuleKind::StaticLib | ModuleKind::SharedLib)
    }
}

impl Default for ModuleKind {
    fn default() -> Self {
        ModuleKind::StaticLib
    }
}

/// Parameters for constructing a module.
///
/// Built with one of the kind constructors plus the chained setters,
/// then passed to [`Registry::define_module`](crate::graph::Registry::define_module).
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    pub kind: ModuleKind,
    pub name: String,
    pub out_dir: PathBuf,
    /// Ordered source list. Headers are tracked as inputs; only
    /// `.c`/`.cc`/`.cpp`/`.cxx` files get compile rules.
    pub sources: Vec<PathBuf>,
    /// Include paths visible to this module and to its dependents.
    pub public_include_dirs: Vec<PathBuf>,
    /// Include paths visible only to this module's own compilation.
    pub private_include_dirs: Vec<PathBuf>,
    /// Defines visible to this module and to its dependents.
    pub public_defines: Vec<String>,
    /// System libraries required when linking this module in.
    pub system_libraries: Vec<String>,
    /// Prebuilt archives linked into this module's artifact.
    pub static_libraries: Vec<PathBuf>,
    /// Other modules this one depends on, in declaration order.
    pub dependencies: Vec<ModuleId>,
    /// Files that must exist before this module compiles
    /// (e.g. generated headers).
    pub hard_dependencies: Vec<PathBuf>,
}

impl ModuleSpec {
    fn with_kind(kind: ModuleKind, name: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        ModuleSpec {
            kind,
            name: name.into(),
            out_dir: out_dir.into(),
            ..ModuleSpec::default()
        }
    }

    pub fn static_lib(name: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self::with_kind(ModuleKind::StaticLib, name, out_dir)
    }

    pub fn shared_lib(name: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self::with_kind(ModuleKind::SharedLib, name, out_dir)
    }

    pub fn executable(name: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self::with_kind(ModuleKind::Executable, name, out_dir)
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.sources.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn public_include_dirs(
        mut self,
        dirs: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.public_include_dirs
            .extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn private_include_dirs(
        mut self,
        dirs: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.private_include_dirs
            .extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn public_defines(
        mut self,
        defines: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.public_defines
            .extend(defines.into_iter().map(Into::into));
        self
    }

    pub fn system_libraries(
        mut self,
        libs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.system_libraries
            .extend(libs.into_iter().map(Into::into));
        self
    }

    pub fn static_libraries(
        mut self,
        libs: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.static_libraries
            .extend(libs.into_iter().map(Into::into));
        self
    }

    pub fn dependencies(mut self, deps: impl IntoIterator<Item = ModuleId>) -> Self {
        self.dependencies.extend(deps);
        self
    }

    pub fn hard_dependencies(
        mut self,
        deps: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.hard_dependencies
            .extend(deps.into_iter().map(Into::into));
        self
    }
}

/// The settings a module exposes to its dependents. Private settings
/// never appear here.
#[derive(Debug, Clone, Default)]
pub struct PublicSurface {
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub system_libraries: Vec<String>,
    /// Prebuilt archives the module requires; linked into any dependent
    /// artifact, after the module's own.
    pub static_libraries: Vec<PathBuf>,
}

/// A constructed module. Identity is (name, out_dir).
#[derive(Debug)]
pub struct Module {
    pub kind: ModuleKind,
    pub name: String,
    pub out_dir: PathBuf,
    /// Concrete artifact paths this module produces.
    pub(crate) output_files: Vec<PathBuf>,
    /// The artifact dependents link against, if any.
    pub(crate) link_artifact: Option<PathBuf>,
    /// Settings propagated to dependents.
    pub(crate) public: PublicSurface,
    /// Direct dependencies, declaration order.
    pub(crate) dependencies: Vec<ModuleId>,
    /// Distributable files, deduplicated.
    pub(crate) package_files: BTreeSet<PathBuf>,
    /// Distributable directories (possibly build outputs), deduplicated.
    pub(crate) package_dirs: BTreeSet<PathBuf>,
}

impl Module {
    /// The concrete artifact paths this module produces.
    pub fn output_files(&self) -> &[PathBuf] {
        &self.output_files
    }

    /// The artifact dependents link against (`None` for executables).
    pub fn link_artifact(&self) -> Option<&PathBuf> {
        self.link_artifact.as_ref()
    }

    /// Settings this module exposes to dependents.
    pub fn public_surface(&self) -> &PublicSurface {
        &self.public
    }

    /// Direct dependencies, declaration order.
    pub fn dependencies(&self) -> &[ModuleId] {
        &self.dependencies
    }

    /// Attached distributable files.
    pub fn package_files(&self) -> &BTreeSet<PathBuf> {
        &self.package_files
    }

    /// Attached distributable directories.
    pub fn package_dirs(&self) -> &BTreeSet<PathBuf> {
        &self.package_dirs
    }
}

/// Whether a source file gets a compile rule (headers do not).
pub(crate) fn is_compilable(path: &PathBuf) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    let ext = ext.to_string_lossy();
    matches!(ext.as_ref(), "c" | "cc" | "cpp" | "cxx") || ext == "C"
}

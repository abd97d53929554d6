//! The build graph registry.
//!
//! A `Registry` is created once per run and threaded by reference
//! through every construction call; there is no process-wide state.
//! It owns the memo table for description invocations, the module
//! arena with its dependency graph, the declared build rules, and the
//! set of requested goals.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Result;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::config::Configuration;
use crate::core::toolchain::{
    ArchiveInput, CompileInput, ConfiguredToolchain, CommandSpec, LinkInput,
};
use crate::graph::error::GraphError;
use crate::graph::memo::MemoKey;
use crate::graph::module::{is_compilable, Module, ModuleId, ModuleKind, ModuleSpec, PublicSurface};
use crate::graph::rule::{BuildRule, RuleAction, RuleId};

/// Entry signature for an external build description.
///
/// Parameters and results cross the vendor boundary as JSON values so
/// that descriptions with different parameter structs share one table.
pub type ExternalEntry = fn(&mut Registry, serde_json::Value) -> Result<serde_json::Value>;

/// The build graph registry.
#[derive(Default)]
pub struct Registry {
    /// Memo table: append-only; a populated key is never recomputed.
    memo: HashMap<MemoKey, serde_json::Value>,

    /// Module arena; `ModuleId` indexes into it.
    modules: Vec<Module>,

    /// Module dependency graph. Edges point dependent -> dependency.
    dep_graph: DiGraph<usize, ()>,
    node_of: Vec<NodeIndex>,

    /// Declared build rules.
    rules: Vec<BuildRule>,

    /// Single-producer map: output file -> producing rule.
    producers: HashMap<PathBuf, RuleId>,

    /// Best-effort outputs -> producing rule.
    soft_producers: HashMap<PathBuf, RuleId>,

    /// Requested build goals.
    goals: BTreeSet<PathBuf>,

    /// External build descriptions keyed by (path, entry name).
    externals: HashMap<(String, String), ExternalEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    // ------------------------------------------------------------------
    // Memoized invocation

    /// Recursively invoke a build description, memoized.
    ///
    /// The memo key is the function's identity plus a stable
    /// serialization of `params`; if that key was already computed in
    /// this run, the cached result is returned and `build_fn` is not
    /// re-invoked. This is what allows the same shared subtree to be
    /// requested from multiple places and constructed exactly once.
    pub fn invoke<P, R>(
        &mut self,
        build_fn: fn(&mut Registry, &P) -> Result<R>,
        params: &P,
    ) -> Result<R>
    where
        P: Serialize,
        R: Serialize + DeserializeOwned,
    {
        let key = MemoKey::function(build_fn as usize, params)?;

        if let Some(cached) = self.memo.get(&key) {
            tracing::debug!(callee = ?key.callee, "memo hit");
            return Ok(serde_json::from_value(cached.clone()).map_err(GraphError::Memo)?);
        }

        let result = build_fn(self, params)?;
        let value = serde_json::to_value(&result).map_err(GraphError::Memo)?;
        self.memo.insert(key, value);
        Ok(result)
    }

    /// Register an external build description (a vendor boundary).
    pub fn register_external(&mut self, path: &str, entry: &str, f: ExternalEntry) {
        self.externals
            .insert((path.to_string(), entry.to_string()), f);
    }

    /// Invoke a named entry of an external build description, memoized.
    ///
    /// The memo key additionally includes the resolved path, so two
    /// different vendor locations are never conflated.
    pub fn invoke_external<P, R>(&mut self, path: &str, entry: &str, params: &P) -> Result<R>
    where
        P: Serialize,
        R: Serialize + DeserializeOwned,
    {
        let key = MemoKey::external(path, entry, params)?;

        if let Some(cached) = self.memo.get(&key) {
            tracing::debug!(path, entry, "memo hit (external)");
            return Ok(serde_json::from_value(cached.clone()).map_err(GraphError::Memo)?);
        }

        let f = *self
            .externals
            .get(&(path.to_string(), entry.to_string()))
            .ok_or_else(|| GraphError::UnknownDescription {
                path: path.to_string(),
                entry: entry.to_string(),
            })?;

        let params_value = serde_json::to_value(params).map_err(GraphError::Memo)?;
        let value = f(self, params_value)?;
        self.memo.insert(key, value.clone());
        Ok(serde_json::from_value(value).map_err(GraphError::Memo)?)
    }

    // ------------------------------------------------------------------
    // Rules and goals

    /// Declare an external-tool invocation as a graph edge.
    pub fn system_command(
        &mut self,
        inputs: impl IntoIterator<Item = impl Into<PathBuf>>,
        outputs: impl IntoIterator<Item = impl Into<PathBuf>>,
        command: CommandSpec,
    ) -> Result<(), GraphError> {
        self.system_command_with_soft_outputs(inputs, outputs, [] as [PathBuf; 0], command)
    }

    /// Like [`system_command`](Registry::system_command), with
    /// best-effort outputs that downstream consumers may soft-depend on.
    pub fn system_command_with_soft_outputs(
        &mut self,
        inputs: impl IntoIterator<Item = impl Into<PathBuf>>,
        outputs: impl IntoIterator<Item = impl Into<PathBuf>>,
        soft_outputs: impl IntoIterator<Item = impl Into<PathBuf>>,
        command: CommandSpec,
    ) -> Result<(), GraphError> {
        let description = format!(
            "run {}",
            command
                .program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| command.program.display().to_string())
        );
        self.add_rule(BuildRule {
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            soft_outputs: soft_outputs.into_iter().map(Into::into).collect(),
            action: RuleAction::Process(command),
            description,
        })?;
        Ok(())
    }

    /// Mark an output file as a requested build goal.
    pub fn request_build(&mut self, output: impl Into<PathBuf>) {
        self.goals.insert(output.into());
    }

    /// The requested goals, in deterministic order.
    pub fn goals(&self) -> impl Iterator<Item = &Path> {
        self.goals.iter().map(PathBuf::as_path)
    }

    /// All declared rules.
    pub fn rules(&self) -> &[BuildRule] {
        &self.rules
    }

    /// The rule producing `output`, if any.
    pub fn producer(&self, output: &Path) -> Option<RuleId> {
        self.producers.get(output).copied()
    }

    /// The rule producing `output` as a best-effort output, if any.
    pub fn soft_producer(&self, output: &Path) -> Option<RuleId> {
        self.soft_producers.get(output).copied()
    }

    pub fn rule(&self, id: RuleId) -> &BuildRule {
        &self.rules[id.0]
    }

    pub(crate) fn add_rule(&mut self, rule: BuildRule) -> Result<RuleId, GraphError> {
        for output in &rule.outputs {
            if self.producers.contains_key(output) {
                return Err(GraphError::DuplicateOutput {
                    path: output.clone(),
                });
            }
        }

        let id = RuleId(self.rules.len());
        for output in &rule.outputs {
            self.producers.insert(output.clone(), id);
        }
        for output in &rule.soft_outputs {
            self.soft_producers.entry(output.clone()).or_insert(id);
        }
        tracing::debug!(rule = %rule.description, "registered rule");
        self.rules.push(rule);
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Modules

    /// Construct a module and register its compile and link rules.
    ///
    /// Validates that `spec.dependencies` exist and that the new edges
    /// keep the global module graph acyclic; computes the module's
    /// effective configuration by propagating its dependencies' public
    /// surfaces; and registers one compile rule per compilable source
    /// plus an archive or link rule for the artifact.
    pub fn define_module(
        &mut self,
        spec: ModuleSpec,
        configured: &ConfiguredToolchain,
    ) -> Result<ModuleId, GraphError> {
        for dep in &spec.dependencies {
            if dep.0 >= self.modules.len() {
                return Err(GraphError::MissingDependencyModule {
                    name: spec.name.clone(),
                    index: dep.0,
                });
            }
        }

        let id = ModuleId(self.modules.len());
        let node = self.dep_graph.add_node(id.0);
        self.node_of.push(node);
        for dep in &spec.dependencies {
            self.dep_graph.add_edge(node, self.node_of[dep.0], ());
        }

        if let Some(cycle) = self.find_cycle_through(node, &spec.name) {
            self.dep_graph.remove_node(node);
            self.node_of.pop();
            return Err(GraphError::Cycle { path: cycle });
        }

        let toolchain = &configured.toolchain;
        let artifact_name = match spec.kind {
            ModuleKind::StaticLib => toolchain.static_lib_filename(&spec.name),
            ModuleKind::SharedLib => toolchain.shared_lib_filename(&spec.name),
            ModuleKind::Executable => toolchain.executable_filename(&spec.name),
        };
        let artifact = spec.out_dir.join(artifact_name);

        let effective = self.effective_configuration(&spec, configured);
        let deps_closure = self.transitive_dependencies(&spec.dependencies);

        // Headers listed in the source list are inputs to every compile.
        let headers: Vec<PathBuf> = spec
            .sources
            .iter()
            .filter(|s| !is_compilable(s))
            .cloned()
            .collect();

        let obj_dir = spec.out_dir.join("obj");
        let obj_ext = toolchain.object_extension();
        let pic = spec.kind == ModuleKind::SharedLib;

        let mut objects = Vec::new();
        for source in spec.sources.iter().filter(|s| is_compilable(s)) {
            let obj_name = match source.file_name() {
                Some(name) if source.is_absolute() => PathBuf::from(name),
                _ => source.clone(),
            }
            .with_extension(obj_ext);
            let object = obj_dir.join(obj_name);

            let mut inputs = vec![source.clone()];
            inputs.extend(headers.iter().cloned());
            inputs.extend(spec.hard_dependencies.iter().cloned());

            let command = toolchain.compile_command(
                &CompileInput {
                    source: source.clone(),
                    output: object.clone(),
                    pic,
                },
                &effective,
            );

            self.add_rule(BuildRule {
                inputs,
                outputs: vec![object.clone()],
                soft_outputs: Vec::new(),
                action: RuleAction::Process(command),
                description: format!("compile {}", source.display()),
            })?;

            objects.push(object);
        }

        let mut output_files = Vec::new();
        let mut link_artifact = None;

        if !objects.is_empty() {
            match spec.kind {
                ModuleKind::StaticLib => {
                    let command = toolchain.archive_command(&ArchiveInput {
                        objects: objects.clone(),
                        output: artifact.clone(),
                    });
                    self.add_rule(BuildRule {
                        inputs: objects.clone(),
                        outputs: vec![artifact.clone()],
                        soft_outputs: Vec::new(),
                        action: RuleAction::Process(command),
                        description: format!("archive {}", spec.name),
                    })?;
                }
                ModuleKind::SharedLib | ModuleKind::Executable => {
                    // Own prebuilt archives first, then each dependency's
                    // artifact followed by the archives it requires, in
                    // dependent-before-dependency order.
                    let mut static_libraries = spec.static_libraries.clone();
                    for dep in &deps_closure {
                        let module = &self.modules[dep.0];
                        static_libraries.extend(module.link_artifact.iter().cloned());
                        static_libraries
                            .extend(module.public.static_libraries.iter().cloned());
                    }

                    let mut system_libraries = spec.system_libraries.clone();
                    for dep in &deps_closure {
                        system_libraries
                            .extend(self.modules[dep.0].public.system_libraries.iter().cloned());
                    }

                    let mut inputs = objects.clone();
                    inputs.extend(static_libraries.iter().cloned());

                    let input = LinkInput {
                        objects: objects.clone(),
                        output: artifact.clone(),
                        static_libraries,
                        system_libraries,
                    };
                    let command = if spec.kind == ModuleKind::SharedLib {
                        toolchain.link_shared_command(&input, &effective)
                    } else {
                        toolchain.link_exe_command(&input, &effective)
                    };
                    self.add_rule(BuildRule {
                        inputs,
                        outputs: vec![artifact.clone()],
                        soft_outputs: Vec::new(),
                        action: RuleAction::Process(command),
                        description: format!("link {}", spec.name),
                    })?;
                }
            }

            output_files.push(artifact.clone());
            if spec.kind.is_linkable() {
                link_artifact = Some(artifact);
            }
        }

        self.modules.push(Module {
            kind: spec.kind,
            name: spec.name,
            out_dir: spec.out_dir,
            output_files,
            link_artifact,
            public: PublicSurface {
                include_dirs: spec.public_include_dirs,
                defines: spec.public_defines,
                system_libraries: spec.system_libraries,
                static_libraries: spec.static_libraries,
            },
            dependencies: spec.dependencies,
            package_files: BTreeSet::new(),
            package_dirs: BTreeSet::new(),
        });

        Ok(id)
    }

    /// A constructed module.
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    /// The concrete artifact paths a module produces.
    pub fn output_files(&self, id: ModuleId) -> &[PathBuf] {
        self.modules[id.0].output_files()
    }

    /// Record a distributable file on a module. Duplicates collapse.
    pub fn attach_package_file(&mut self, id: ModuleId, path: impl Into<PathBuf>) {
        self.modules[id.0].package_files.insert(path.into());
    }

    /// Record a distributable directory (possibly itself a build
    /// output) on a module. Duplicates collapse.
    pub fn attach_package_dir(&mut self, id: ModuleId, path: impl Into<PathBuf>) {
        self.modules[id.0].package_dirs.insert(path.into());
    }

    /// The transitive dependency closure of `deps`, in declaration
    /// order (depth-first, duplicates dropped).
    pub fn transitive_dependencies(&self, deps: &[ModuleId]) -> Vec<ModuleId> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        self.visit_dependencies(deps, &mut order, &mut seen);
        order
    }

    fn visit_dependencies(
        &self,
        deps: &[ModuleId],
        order: &mut Vec<ModuleId>,
        seen: &mut BTreeSet<ModuleId>,
    ) {
        for &dep in deps {
            if seen.insert(dep) {
                order.push(dep);
                let nested = self.modules[dep.0].dependencies.clone();
                self.visit_dependencies(&nested, order, seen);
            }
        }
    }

    /// The effective compile configuration for a module: its own
    /// public and private settings first, then the public surfaces of
    /// its direct and transitive dependencies in declaration order,
    /// then the ambient configuration of the subtree's toolchain.
    /// Private settings of a dependency are never visible here.
    pub fn effective_configuration(
        &self,
        spec: &ModuleSpec,
        configured: &ConfiguredToolchain,
    ) -> Configuration {
        let ambient = &configured.configuration;

        let mut own = Configuration {
            optimize: ambient.optimize,
            include_symbols: ambient.include_symbols,
            ..Configuration::default()
        };
        own.include_dirs.extend(spec.public_include_dirs.iter().cloned());
        own.include_dirs
            .extend(spec.private_include_dirs.iter().cloned());
        own.defines.extend(spec.public_defines.iter().cloned());

        for dep in self.transitive_dependencies(&spec.dependencies) {
            let public = &self.modules[dep.0].public;
            own.include_dirs.extend(public.include_dirs.iter().cloned());
            own.defines.extend(public.defines.iter().cloned());
        }

        own.merge(ambient)
    }

    /// Check whether the freshly added `node` participates in a cycle;
    /// if so, return the cycle as a module name path.
    fn find_cycle_through(&self, node: NodeIndex, name: &str) -> Option<Vec<String>> {
        for edge in self.dep_graph.edges(node) {
            if let Some(mut path) = self.find_path(edge.target(), node) {
                let mut names = vec![name.to_string()];
                names.append(&mut path);
                names.push(name.to_string());
                return Some(names);
            }
        }
        None
    }

    /// Depth-first search for a dependency path from `from` to `to`,
    /// returned as module names (including `from`, excluding `to`).
    fn find_path(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<String>> {
        if from == to {
            return Some(Vec::new());
        }
        for edge in self.dep_graph.edges(from) {
            if let Some(mut rest) = self.find_path(edge.target(), to) {
                let mut path = vec![self.modules[self.dep_graph[from]].name.clone()];
                path.append(&mut rest);
                return Some(path);
            }
        }
        None
    }
}

//! Packaging: staging distributable files into a package tree.
//!
//! Packaging is expressed with ordinary build rules, so staged files
//! that are themselves build outputs are produced before they are
//! copied, and an unchanged package is not re-staged.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::graph::error::GraphError;
use crate::graph::module::ModuleId;
use crate::graph::registry::Registry;
use crate::graph::rule::{BuildRule, RuleAction};

impl Registry {
    /// Stage the distributable files of a module and its transitive
    /// dependencies into `package_dir`.
    ///
    /// Every attached package file and directory, across the whole
    /// dependency closure, gets a copy rule into `package_dir`;
    /// duplicate attachments collapse to a single copy. A final stamp
    /// rule depends on all staged destinations, so the returned stamp
    /// path is satisfied only once the package tree is complete.
    pub fn copy_package_files(
        &mut self,
        id: ModuleId,
        package_dir: impl Into<PathBuf>,
    ) -> Result<PathBuf, GraphError> {
        let package_dir = package_dir.into();

        let mut closure = vec![id];
        closure.extend(self.transitive_dependencies(&[id]));

        // Deduplicate by destination so the same file attached from two
        // places becomes one copy rule. Two distinct sources claiming
        // the same destination is a conflict, not a silent overwrite.
        let mut files: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        let mut dirs: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        for member in &closure {
            let module = self.module(*member);
            for src in module.package_files() {
                let dst = package_dir.join(file_component(src));
                stage(&mut files, dst, src)?;
            }
            for src in module.package_dirs() {
                let dst = package_dir.join(file_component(src));
                stage(&mut dirs, dst, src)?;
            }
        }

        let mut staged = Vec::new();

        for (dst, src) in files {
            self.add_rule(BuildRule {
                inputs: vec![src.clone()],
                outputs: vec![dst.clone()],
                soft_outputs: Vec::new(),
                action: RuleAction::CopyFile {
                    src,
                    dst: dst.clone(),
                },
                description: format!("stage {}", dst.display()),
            })?;
            staged.push(dst);
        }

        for (dst, src) in dirs {
            // A staged directory may itself be a best-effort build
            // output; the copy then tolerates its absence.
            let soft_src =
                self.producer(&src).is_none() && self.soft_producer(&src).is_some();
            self.add_rule(BuildRule {
                inputs: vec![src.clone()],
                outputs: vec![dst.clone()],
                soft_outputs: Vec::new(),
                action: RuleAction::CopyDir {
                    src,
                    dst: dst.clone(),
                    soft_src,
                },
                description: format!("stage {}", dst.display()),
            })?;
            staged.push(dst);
        }

        let stamp = package_dir.join(format!(".{}.stamp", self.module(id).name));
        self.add_rule(BuildRule {
            inputs: staged,
            outputs: vec![stamp.clone()],
            soft_outputs: Vec::new(),
            action: RuleAction::Stamp,
            description: format!("package {}", self.module(id).name),
        })?;

        Ok(stamp)
    }
}

/// The final path component, used as the name inside the package tree.
fn file_component(path: &PathBuf) -> PathBuf {
    match path.file_name() {
        Some(name) => PathBuf::from(name),
        None => path.clone(),
    }
}

/// Record a staging destination. A repeated attachment of the same
/// source collapses; a different source claiming the same destination
/// is rejected.
fn stage(
    staged: &mut BTreeMap<PathBuf, PathBuf>,
    dst: PathBuf,
    src: &PathBuf,
) -> Result<(), GraphError> {
    match staged.entry(dst) {
        Entry::Vacant(vacant) => {
            vacant.insert(src.clone());
            Ok(())
        }
        Entry::Occupied(occupied) if occupied.get() == src => Ok(()),
        Entry::Occupied(occupied) => Err(GraphError::DuplicateOutput {
            path: occupied.key().clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::config::Configuration;
    use crate::core::toolchain::{CommandSpec, ConfiguredToolchain, GccToolchain};
    use crate::graph::module::ModuleSpec;

    fn configured() -> ConfiguredToolchain {
        ConfiguredToolchain::new(
            Arc::new(GccToolchain::host_default()),
            Configuration::named("debug").unwrap(),
        )
    }

    #[test]
    fn test_package_covers_dependency_closure() {
        let mut registry = Registry::new();
        let tc = configured();

        let base = registry
            .define_module(ModuleSpec::static_lib("base", "out/base").sources(["base.c"]), &tc)
            .unwrap();
        registry.attach_package_file(base, "assets/base.cfg");

        let app = registry
            .define_module(
                ModuleSpec::executable("app", "out/app")
                    .sources(["main.c"])
                    .dependencies([base]),
                &tc,
            )
            .unwrap();
        registry.attach_package_file(app, "out/app/app");
        registry.attach_package_file(app, "assets/app.cfg");

        let stamp = registry.copy_package_files(app, "out/package").unwrap();
        assert_eq!(stamp, PathBuf::from("out/package/.app.stamp"));

        let stamp_rule = registry.rule(registry.producer(&stamp).unwrap());
        let mut staged: Vec<_> = stamp_rule
            .inputs
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        staged.sort();
        assert_eq!(
            staged,
            [
                "out/package/app",
                "out/package/app.cfg",
                "out/package/base.cfg"
            ]
        );
    }

    #[test]
    fn test_duplicate_attachments_collapse() {
        let mut registry = Registry::new();
        let tc = configured();

        let base = registry
            .define_module(ModuleSpec::static_lib("base", "out/base").sources(["base.c"]), &tc)
            .unwrap();
        registry.attach_package_file(base, "assets/shared.dat");
        // Attached twice on the same module.
        registry.attach_package_file(base, "assets/shared.dat");

        let app = registry
            .define_module(
                ModuleSpec::executable("app", "out/app")
                    .sources(["main.c"])
                    .dependencies([base]),
                &tc,
            )
            .unwrap();
        // And once more on the dependent.
        registry.attach_package_file(app, "assets/shared.dat");

        let stamp = registry.copy_package_files(app, "pkg").unwrap();

        let copies: Vec<_> = registry
            .rules()
            .iter()
            .filter(|r| matches!(r.action, RuleAction::CopyFile { .. }))
            .collect();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].outputs, [PathBuf::from("pkg/shared.dat")]);

        let stamp_rule = registry.rule(registry.producer(&stamp).unwrap());
        assert_eq!(stamp_rule.inputs, [PathBuf::from("pkg/shared.dat")]);
    }

    #[test]
    fn test_distinct_sources_with_same_name_rejected() {
        let mut registry = Registry::new();
        let tc = configured();

        let base = registry
            .define_module(ModuleSpec::static_lib("base", "out/base").sources(["base.c"]), &tc)
            .unwrap();
        registry.attach_package_file(base, "base/README");

        let app = registry
            .define_module(
                ModuleSpec::executable("app", "out/app")
                    .sources(["main.c"])
                    .dependencies([base]),
                &tc,
            )
            .unwrap();
        registry.attach_package_file(app, "app/README");

        let err = registry.copy_package_files(app, "pkg").unwrap_err();
        assert!(matches!(
            err,
            crate::graph::GraphError::DuplicateOutput { path } if path == PathBuf::from("pkg/README")
        ));
    }

    #[test]
    fn test_generated_directory_staged_as_soft_copy() {
        let mut registry = Registry::new();
        let tc = configured();

        // A docs directory produced as a best-effort output.
        registry
            .system_command_with_soft_outputs(
                ["src/lib.c"],
                ["out/docs/.done"],
                ["out/docs/html"],
                CommandSpec::new("docgen"),
            )
            .unwrap();

        let lib = registry
            .define_module(ModuleSpec::static_lib("lib", "out/lib").sources(["src/lib.c"]), &tc)
            .unwrap();
        registry.attach_package_dir(lib, "out/docs/html");

        registry.copy_package_files(lib, "pkg").unwrap();

        let copy = registry
            .rules()
            .iter()
            .find_map(|r| match &r.action {
                RuleAction::CopyDir { soft_src, .. } => Some(*soft_src),
                _ => None,
            })
            .unwrap();
        assert!(copy, "copy of a soft output tolerates absence");
    }
}

//! Build rules: the edges of the build graph.
//!
//! A rule declares that its outputs are produced from its inputs by an
//! action. External-tool invocations, file staging, and stamp writes
//! all use the same rule type, so packaging participates in the same
//! ordering and caching discipline as compilation.

use std::path::PathBuf;

use crate::core::toolchain::CommandSpec;

/// Index of a rule within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What running a rule actually does.
#[derive(Debug, Clone)]
pub enum RuleAction {
    /// Run an external tool.
    Process(CommandSpec),
    /// Copy a single file into the package tree.
    CopyFile { src: PathBuf, dst: PathBuf },
    /// Recursively copy a directory into the package tree.
    /// `soft_src` marks a source that is itself a best-effort output
    /// and is allowed to be absent.
    CopyDir {
        src: PathBuf,
        dst: PathBuf,
        soft_src: bool,
    },
    /// Write the rule's first output as a completion stamp.
    Stamp,
}

impl RuleAction {
    /// The command line, for failure reports. Internal actions render a
    /// shorthand.
    pub fn display(&self) -> String {
        match self {
            RuleAction::Process(spec) => spec.display(),
            RuleAction::CopyFile { src, dst } => {
                format!("<copy {} {}>", src.display(), dst.display())
            }
            RuleAction::CopyDir { src, dst, .. } => {
                format!("<copy-dir {} {}>", src.display(), dst.display())
            }
            RuleAction::Stamp => "<stamp>".to_string(),
        }
    }
}

/// One edge of the build graph.
#[derive(Debug, Clone)]
pub struct BuildRule {
    /// Files that must be satisfied before this rule may run.
    pub inputs: Vec<PathBuf>,
    /// Files this rule produces. Subject to the single-producer rule.
    pub outputs: Vec<PathBuf>,
    /// Best-effort outputs, permitted to be missing after success.
    pub soft_outputs: Vec<PathBuf>,
    /// The action to perform.
    pub action: RuleAction,
    /// Short human-readable description for logs and progress.
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_display_process() {
        let action = RuleAction::Process(CommandSpec::new("protoc").arg("defs.proto"));
        assert_eq!(action.display(), "protoc defs.proto");
    }

    #[test]
    fn test_action_display_copy() {
        let action = RuleAction::CopyFile {
            src: PathBuf::from("a.jl"),
            dst: PathBuf::from("pkg/a.jl"),
        };
        assert_eq!(action.display(), "<copy a.jl pkg/a.jl>");
    }
}

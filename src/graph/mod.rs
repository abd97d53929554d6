//! Build graph construction.
//!
//! Graph construction is single-threaded and synchronous: build
//! descriptions are ordinary functions invoked depth-first through the
//! [`Registry`], which memoizes every invocation so that a shared
//! subtree (e.g. a vendored library requested from multiple places) is
//! constructed exactly once.

pub mod error;
pub mod memo;
pub mod module;
pub mod package;
pub mod registry;
pub mod rule;

pub use error::GraphError;
pub use module::{Module, ModuleId, ModuleKind, ModuleSpec};
pub use registry::Registry;
pub use rule::{BuildRule, RuleAction, RuleId};

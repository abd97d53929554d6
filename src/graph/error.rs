//! Errors raised during graph construction.
//!
//! Every variant here is detected eagerly, before any execution starts:
//! a malformed graph never reaches the executor.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while constructing the build graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A module dependency edge would close a cycle in the global
    /// module graph.
    #[error("module dependency cycle: {}", .path.join(" -> "))]
    Cycle {
        /// Module names along the offending cycle, first repeated last.
        path: Vec<String>,
    },

    /// Two rules claim the same output file (single-producer rule).
    #[error("output `{}` is already produced by another rule", .path.display())]
    DuplicateOutput { path: PathBuf },

    /// A module dependency references a module that was never constructed.
    #[error("module `{name}` depends on module #{index}, which was never constructed")]
    MissingDependencyModule { name: String, index: usize },

    /// An external build description was requested but never registered.
    #[error("no build description registered at `{path}` with entry `{entry}`")]
    UnknownDescription { path: String, entry: String },

    /// A memoized parameter struct or result failed to serialize.
    #[error("failed to serialize memoized value: {0}")]
    Memo(#[from] serde_json::Error),
}

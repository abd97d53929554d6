//! Gantry - a build graph registry and module composition system for C/C++
//!
//! This crate provides the core library functionality for Gantry:
//! memoized build-description invocation, module composition with
//! public/private configuration propagation, and parallel execution of
//! the resulting build graph.

pub mod core;
pub mod exec;
pub mod graph;
pub mod util;

pub use core::{ConfigError, Configuration, ConfiguredToolchain, Platform, Toolchain};
pub use exec::{ExecError, ExecReport, Executor};
pub use graph::{GraphError, Module, ModuleId, ModuleKind, ModuleSpec, Registry};

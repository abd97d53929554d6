//! Build graph execution.
//!
//! The executor takes a fully constructed [`Registry`](crate::graph::Registry),
//! resolves the requested goals to the rules that produce them, and runs
//! those rules in dependency order. Independent rules within a wave run
//! concurrently on a worker pool; a rule whose outputs are already newer
//! than all of its inputs is skipped.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;

use crate::graph::{BuildRule, Registry, RuleAction};
use crate::util::fs::{copy_dir_all, copy_file, ensure_dir, mtime, write_string};
use crate::util::process::ProcessBuilder;

/// One failed build step, reported with enough context to rerun it
/// by hand.
#[derive(Debug)]
pub struct RuleFailure {
    /// Short description of the step (e.g. "compile src/core.c").
    pub description: String,
    /// The full command line that failed.
    pub command: String,
    /// Exit code, if the process ran at all.
    pub exit_code: Option<i32>,
    /// Captured stderr, or the spawn error.
    pub stderr: String,
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed", self.description)?;
        if let Some(code) = self.exit_code {
            write!(f, " (exit code {code})")?;
        }
        write!(f, "\n  command: {}", self.command)?;
        if !self.stderr.is_empty() {
            write!(f, "\n{}", self.stderr.trim_end())?;
        }
        Ok(())
    }
}

/// Errors raised while executing the build graph.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A requested goal has no producing rule and does not exist on disk.
    #[error("no rule produces `{}` and it does not exist on disk", .0.display())]
    UnresolvableGoal(PathBuf),

    /// One or more build steps failed. Steps already running when the
    /// first failure occurred were allowed to finish.
    #[error("{} build step(s) failed", .0.len())]
    Failed(Vec<RuleFailure>),

    /// The worker pool could not be initialized.
    #[error("failed to initialize worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// What a run actually did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecReport {
    /// Rules that ran.
    pub executed: usize,
    /// Rules skipped because their outputs were up to date.
    pub cached: usize,
}

enum Outcome {
    Executed,
    Cached,
    Failed(RuleFailure),
}

/// Runs the rules a registry's goals require, in dependency order.
#[derive(Debug, Default)]
pub struct Executor {
    jobs: Option<usize>,
    quiet: bool,
}

impl Executor {
    pub fn new() -> Self {
        Executor::default()
    }

    /// Cap the worker pool. Defaults to one worker per core.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Suppress the progress bar.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Execute every rule the registry's goals transitively require.
    pub fn run(&self, registry: &Registry) -> Result<ExecReport, ExecError> {
        let needed = self.resolve_goals(registry)?;
        if needed.is_empty() {
            return Ok(ExecReport::default());
        }

        // Rule-to-rule edges: a rule waits on the producers of its inputs.
        let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut indegree: HashMap<usize, usize> = needed.iter().map(|&r| (r, 0)).collect();
        for &r in &needed {
            let rule = &registry.rules()[r];
            let mut waits_on = HashSet::new();
            for input in &rule.inputs {
                let producer = registry
                    .producer(input)
                    .or_else(|| registry.soft_producer(input));
                if let Some(p) = producer {
                    if p.index() != r && waits_on.insert(p.index()) {
                        successors.entry(p.index()).or_default().push(r);
                        *indegree.entry(r).or_default() += 1;
                    }
                }
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs.unwrap_or(0))
            .build()?;

        let progress = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(needed.len() as u64)
        };
        progress.set_style(
            ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let mut ready: Vec<usize> = needed
            .iter()
            .copied()
            .filter(|r| indegree[r] == 0)
            .collect();
        let mut failures = Vec::new();
        let mut report = ExecReport::default();

        while !ready.is_empty() {
            let outcomes: Vec<(usize, Outcome)> = pool.install(|| {
                ready
                    .par_iter()
                    .map(|&r| (r, self.run_rule(registry, r, &progress)))
                    .collect()
            });

            let mut next = Vec::new();
            for (r, outcome) in outcomes {
                match outcome {
                    Outcome::Executed => report.executed += 1,
                    Outcome::Cached => report.cached += 1,
                    Outcome::Failed(failure) => {
                        tracing::error!(rule = %failure.description, "build step failed");
                        failures.push(failure);
                        continue;
                    }
                }
                if let Some(succ) = successors.get(&r) {
                    for &s in succ {
                        let remaining = indegree.get_mut(&s);
                        if let Some(remaining) = remaining {
                            *remaining -= 1;
                            if *remaining == 0 {
                                next.push(s);
                            }
                        }
                    }
                }
            }

            // Steps in this wave finished; nothing further is scheduled
            // after a failure.
            if !failures.is_empty() {
                break;
            }
            ready = next;
        }

        progress.finish_and_clear();

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(ExecError::Failed(failures))
        }
    }

    /// Resolve the goal set to the rule indices that must run, in
    /// discovery order. A goal with no producer must already exist.
    fn resolve_goals(&self, registry: &Registry) -> Result<Vec<usize>, ExecError> {
        let mut needed = Vec::new();
        let mut seen_rules = HashSet::new();
        let mut seen_paths: HashSet<PathBuf> = HashSet::new();
        let mut pending: Vec<PathBuf> = registry.goals().map(PathBuf::from).collect();

        while let Some(path) = pending.pop() {
            if !seen_paths.insert(path.clone()) {
                continue;
            }
            let producer = registry
                .producer(&path)
                .or_else(|| registry.soft_producer(&path));
            match producer {
                Some(rule_id) => {
                    if seen_rules.insert(rule_id.index()) {
                        needed.push(rule_id.index());
                        let rule = &registry.rules()[rule_id.index()];
                        pending.extend(rule.inputs.iter().cloned());
                    }
                }
                None => {
                    if !path.exists() {
                        return Err(ExecError::UnresolvableGoal(path));
                    }
                }
            }
        }

        Ok(needed)
    }

    fn run_rule(&self, registry: &Registry, index: usize, progress: &ProgressBar) -> Outcome {
        let rule = &registry.rules()[index];
        progress.set_message(rule.description.clone());

        if up_to_date(rule) {
            tracing::debug!(rule = %rule.description, "up to date");
            progress.inc(1);
            return Outcome::Cached;
        }

        tracing::info!(rule = %rule.description, "running");
        let result = match &rule.action {
            RuleAction::Process(command) => self.run_process(rule, command),
            RuleAction::CopyFile { src, dst } => {
                copy_file(src, dst).map_err(|e| internal_failure(rule, &e))
            }
            RuleAction::CopyDir { src, dst, soft_src } => {
                if *soft_src && !src.exists() {
                    tracing::warn!(
                        src = %src.display(),
                        "best-effort source directory absent, skipping copy"
                    );
                    Ok(())
                } else {
                    copy_dir_all(src, dst).map_err(|e| internal_failure(rule, &e))
                }
            }
            RuleAction::Stamp => match rule.outputs.first() {
                Some(stamp) => {
                    write_string(stamp, "").map_err(|e| internal_failure(rule, &e))
                }
                None => Ok(()),
            },
        };
        progress.inc(1);

        match result {
            Ok(()) => {
                for soft in &rule.soft_outputs {
                    if !soft.exists() {
                        tracing::warn!(
                            output = %soft.display(),
                            rule = %rule.description,
                            "best-effort output was not produced"
                        );
                    }
                }
                Outcome::Executed
            }
            Err(failure) => Outcome::Failed(failure),
        }
    }

    fn run_process(
        &self,
        rule: &BuildRule,
        command: &crate::core::toolchain::CommandSpec,
    ) -> Result<(), RuleFailure> {
        for output in rule.outputs.iter().chain(rule.soft_outputs.iter()) {
            if let Some(parent) = output.parent() {
                ensure_dir(parent).map_err(|e| internal_failure(rule, &e))?;
            }
        }

        let mut builder = ProcessBuilder::new(&command.program);
        builder = builder.args(command.args.iter().cloned());
        for (key, value) in &command.env {
            builder = builder.env(key, value);
        }

        let output = builder.exec().map_err(|e| internal_failure(rule, &e))?;
        if !output.status.success() {
            return Err(RuleFailure {
                description: rule.description.clone(),
                command: rule.action.display(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        for declared in &rule.outputs {
            if !declared.exists() {
                return Err(RuleFailure {
                    description: rule.description.clone(),
                    command: rule.action.display(),
                    exit_code: output.status.code(),
                    stderr: format!(
                        "command succeeded but did not produce declared output `{}`",
                        declared.display()
                    ),
                });
            }
        }

        Ok(())
    }
}

fn internal_failure(rule: &BuildRule, err: &anyhow::Error) -> RuleFailure {
    RuleFailure {
        description: rule.description.clone(),
        command: rule.action.display(),
        exit_code: None,
        stderr: format!("{err:#}"),
    }
}

/// A rule is up to date when every output exists and is at least as new
/// as every input.
fn up_to_date(rule: &BuildRule) -> bool {
    if rule.outputs.is_empty() {
        return false;
    }
    let mut oldest_output = None;
    for output in &rule.outputs {
        match mtime(output) {
            Some(t) => {
                if oldest_output.map_or(true, |o| t < o) {
                    oldest_output = Some(t);
                }
            }
            None => return false,
        }
    }
    let Some(oldest) = oldest_output else {
        return false;
    };
    rule.inputs
        .iter()
        .all(|input| matches!(mtime(input), Some(t) if t <= oldest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::core::toolchain::CommandSpec;

    fn copy_rule(src: &std::path::Path, dst: &std::path::Path) -> BuildRule {
        BuildRule {
            inputs: vec![src.to_path_buf()],
            outputs: vec![dst.to_path_buf()],
            soft_outputs: Vec::new(),
            action: RuleAction::CopyFile {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
            },
            description: "copy".to_string(),
        }
    }

    #[test]
    fn test_up_to_date_requires_existing_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, "x").unwrap();

        let rule = copy_rule(&src, &dir.path().join("missing.txt"));
        assert!(!up_to_date(&rule));
    }

    #[test]
    fn test_up_to_date_when_output_newer() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, "x").unwrap();
        fs::write(&dst, "x").unwrap();

        let rule = copy_rule(&src, &dst);
        assert!(up_to_date(&rule));
    }

    #[test]
    fn test_stale_when_input_missing() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("dst.txt");
        fs::write(&dst, "x").unwrap();

        let rule = copy_rule(&dir.path().join("gone.txt"), &dst);
        assert!(!up_to_date(&rule));
    }

    #[test]
    fn test_failure_display_includes_command_and_stderr() {
        let failure = RuleFailure {
            description: "compile src/core.c".to_string(),
            command: "cc -c src/core.c -o out/core.o".to_string(),
            exit_code: Some(1),
            stderr: "core.c:3: error: expected ';'".to_string(),
        };

        let text = failure.to_string();
        assert!(text.contains("compile src/core.c failed (exit code 1)"));
        assert!(text.contains("cc -c src/core.c"));
        assert!(text.contains("expected ';'"));
    }

    #[test]
    fn test_unresolvable_goal() {
        let registry = Registry::new();
        let mut registry = registry;
        registry.request_build("/nonexistent/goal.bin");

        let err = Executor::new().quiet(true).run(&registry).unwrap_err();
        assert!(matches!(err, ExecError::UnresolvableGoal(_)));
    }

    #[test]
    fn test_goal_satisfied_by_existing_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("already-there.txt");
        fs::write(&src, "x").unwrap();

        let mut registry = Registry::new();
        registry.request_build(&src);

        let report = Executor::new().quiet(true).run(&registry).unwrap();
        assert_eq!(report, ExecReport::default());
    }

    #[test]
    fn test_failed_process_reports_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let mid = dir.path().join("mid.txt");
        let end = dir.path().join("end.txt");

        let mut registry = Registry::new();
        registry
            .system_command(
                [] as [PathBuf; 0],
                [mid.clone()],
                CommandSpec::new("definitely-not-a-real-tool-7f3a"),
            )
            .unwrap();
        registry
            .system_command([mid], [end.clone()], CommandSpec::new("also-unused"))
            .unwrap();
        registry.request_build(&end);

        let err = Executor::new().quiet(true).run(&registry).unwrap_err();
        let ExecError::Failed(failures) = err else {
            panic!("expected Failed");
        };
        // Only the first step ran; its dependent was never scheduled.
        assert_eq!(failures.len(), 1);
        assert!(!end.exists());
    }
}

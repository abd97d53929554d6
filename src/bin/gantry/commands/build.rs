//! `gantry build` command

use anyhow::Result;

use gantry::{ExecError, Executor, Registry};

use crate::cli::BuildArgs;
use crate::project;

pub fn execute(args: BuildArgs) -> Result<()> {
    let mut registry = Registry::new();
    project::register_vendor_descriptions(&mut registry);

    let params = project::ProjectParams {
        root: gantry::util::fs::normalize_path(&args.root),
        out_dir: args.out.join(&args.config),
        platform: args.platform.clone(),
        config: args.config.clone(),
    };
    let goals = registry.invoke(project::start_builds, &params)?;

    let report = run_executor(&registry, args.jobs)?;
    eprintln!(
        "Finished: {} step(s) run, {} up to date",
        report.executed, report.cached
    );
    for goal in &goals {
        eprintln!("  {}", goal.display());
    }
    Ok(())
}

pub(crate) fn run_executor(
    registry: &Registry,
    jobs: Option<usize>,
) -> Result<gantry::ExecReport> {
    let mut executor = Executor::new();
    if let Some(jobs) = jobs {
        executor = executor.jobs(jobs);
    }

    match executor.run(registry) {
        Ok(report) => Ok(report),
        Err(ExecError::Failed(failures)) => {
            for failure in &failures {
                eprintln!("{failure}\n");
            }
            anyhow::bail!("{} build step(s) failed", failures.len())
        }
        Err(e) => Err(e.into()),
    }
}

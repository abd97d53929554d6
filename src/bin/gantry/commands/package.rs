//! `gantry package` command

use anyhow::Result;

use gantry::Registry;

use crate::cli::PackageArgs;
use crate::commands::build::run_executor;
use crate::project;

pub fn execute(args: PackageArgs) -> Result<()> {
    let build = args.build;
    let out_dir = build.out.join(&build.config);
    let package_dir = args
        .package_dir
        .unwrap_or_else(|| out_dir.join("package"));

    let mut registry = Registry::new();
    project::register_vendor_descriptions(&mut registry);

    let params = project::PackageParams {
        project: project::ProjectParams {
            root: gantry::util::fs::normalize_path(&build.root),
            out_dir,
            platform: build.platform.clone(),
            config: build.config.clone(),
        },
        package_dir: package_dir.clone(),
    };
    registry.invoke(project::start_package_build, &params)?;

    let report = run_executor(&registry, build.jobs)?;
    eprintln!(
        "Finished: {} step(s) run, {} up to date",
        report.executed, report.cached
    );
    eprintln!("  package staged in {}", package_dir.display());
    Ok(())
}

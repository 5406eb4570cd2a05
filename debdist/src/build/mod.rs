//! Compiling Things
//!
//! The build matrix runs the build tool once per target, strictly in table
//! order, and stops at the first target that fails. Only a fully successful
//! matrix records its targets for the publisher.

use axoasset::LocalAsset;
use debdist_schema::{BuildReport, BuiltTarget};
use tracing::{error, info};

use crate::{
    config::BuildConfig,
    env::{BuildEnvironment, BuildLayout},
    errors::{DistError, DistResult},
    SortedMap,
};

pub mod fake;
pub mod make;

/// Clean the tree once, before any target is built
#[derive(Debug, Clone)]
pub struct CleanStep {
    /// The command to run
    pub command: Vec<String>,
    /// The complete environment it runs with
    pub vars: SortedMap<String, String>,
}

/// Build (and package) a single target
#[derive(Debug, Clone)]
pub struct TargetBuildStep {
    /// The command to run
    pub command: Vec<String>,
    /// The complete environment it runs with
    pub env: BuildEnvironment,
}

/// A step the build runner is asked to perform
#[derive(Debug, Clone)]
pub enum BuildStep {
    /// Clean the tree
    Clean(CleanStep),
    /// Build a target
    Target(TargetBuildStep),
}

impl BuildStep {
    /// The argv of the step
    pub fn command(&self) -> &[String] {
        match self {
            BuildStep::Clean(step) => &step.command,
            BuildStep::Target(step) => &step.command,
        }
    }

    /// Every variable the step's process gets
    pub fn vars(&self) -> &SortedMap<String, String> {
        match self {
            BuildStep::Clean(step) => &step.vars,
            BuildStep::Target(step) => step.env.vars(),
        }
    }

    /// Short human description, used in logs and errors
    pub fn describe(&self) -> String {
        match self {
            BuildStep::Clean(_) => "clean".to_owned(),
            BuildStep::Target(step) => format!("build for {}", step.env.target.friendly_name),
        }
    }
}

/// Something that can execute build steps
///
/// [`make::MakeRunner`][] runs the real build tool, [`fake::FakeRunner`][]
/// only logs what would happen.
pub trait BuildRunner {
    /// Execute a step, returning the exit code the tool reported
    ///
    /// Errors are for when the tool couldn't be run at all.
    fn run_step(&mut self, step: &BuildStep) -> DistResult<i32>;
}

fn run_checked(runner: &mut dyn BuildRunner, step: &BuildStep) -> DistResult<()> {
    let code = runner.run_step(step)?;
    if code == 0 {
        Ok(())
    } else {
        Err(DistError::ToolFailed {
            tool: step.describe(),
            code,
        })
    }
}

/// Compute every step a build would run, in order
pub fn plan_steps(cfg: &BuildConfig) -> Vec<BuildStep> {
    let mut steps = Vec::with_capacity(cfg.targets.len() + 1);
    if let Some(command) = &cfg.clean_command {
        steps.push(BuildStep::Clean(CleanStep {
            command: command.clone(),
            vars: cfg.ambient.vars().clone(),
        }));
    }
    for target in &cfg.targets {
        steps.push(BuildStep::Target(TargetBuildStep {
            command: cfg.build_command.clone(),
            env: BuildEnvironment::for_target(&cfg.ambient, target, &cfg.tag, &cfg.layout),
        }));
    }
    steps
}

/// Run the whole matrix with the given runner
///
/// The first step that fails ends the run: no later target is attempted and
/// the failing tool's exit code comes back in [`DistError::ToolFailed`][].
pub fn run_all(cfg: &BuildConfig, runner: &mut dyn BuildRunner) -> DistResult<BuildReport> {
    let mut built = vec![];
    for step in plan_steps(cfg) {
        info!("running {}", step.describe());
        if let Err(e) = run_checked(runner, &step) {
            error!("{} failed, skipping the remaining targets", step.describe());
            return Err(e);
        }
        if let BuildStep::Target(step) = step {
            built.push(BuiltTarget {
                friendly_name: step.env.target.friendly_name.to_owned(),
                deb_arch: step.env.target.deb_arch().to_owned(),
                output: step.env.output.to_string(),
            });
        }
    }

    if !cfg.dry_run {
        let names = built
            .iter()
            .map(|t| t.friendly_name.as_str())
            .collect::<Vec<_>>();
        write_targets_manifest(&cfg.layout, &names)?;
    }

    Ok(BuildReport {
        tag: cfg.tag.raw.clone(),
        version: cfg.tag.version.clone(),
        release: cfg.tag.release.clone(),
        targets: built,
    })
}

/// Record which targets were built, comma-separated
pub fn write_targets_manifest(layout: &BuildLayout, names: &[&str]) -> DistResult<()> {
    let path = layout.targets_manifest_path();
    info!("recording built targets in {path}");
    LocalAsset::write_new_all(&names.join(","), &path)?;
    Ok(())
}

/// Pick the runner a config asks for
pub fn runner_for(cfg: &BuildConfig) -> Box<dyn BuildRunner> {
    if cfg.dry_run {
        Box::new(fake::FakeRunner::default())
    } else {
        Box::new(make::MakeRunner::default())
    }
}


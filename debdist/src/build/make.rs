//! Running the real build tool

use axoprocess::Cmd;
use tracing::warn;

use super::{BuildRunner, BuildStep};
use crate::errors::{DistError, DistResult};

/// Runs each step as a subprocess
///
/// The process gets a cleared environment plus exactly the step's variables.
/// Its stdout is folded into our stderr so that reports on stdout stay clean.
#[derive(Debug, Default)]
pub struct MakeRunner {}

impl BuildRunner for MakeRunner {
    fn run_step(&mut self, step: &BuildStep) -> DistResult<i32> {
        let (program, args) = step
            .command()
            .split_first()
            .ok_or(DistError::EmptyCommand { what: "build" })?;

        let mut cmd = Cmd::new(program, step.describe());
        for arg in args {
            cmd.arg(arg);
        }
        cmd.env_clear();
        cmd.envs(step.vars());
        cmd.stdout_to_stderr();
        cmd.check(false);
        let status = cmd.status()?;

        Ok(exit_code(status, &step.describe()))
    }
}

/// Turn a finished process into the exit code we report for it
///
/// A process killed by a signal has no code of its own, so it counts as 1.
pub fn exit_code(status: std::process::ExitStatus, what: &str) -> i32 {
    match status.code() {
        Some(code) => code,
        None => {
            warn!("{what} was terminated by a signal");
            1
        }
    }
}

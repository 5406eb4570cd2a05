//! real fake builds, no substance, all style
//!
//! used by --dry-run to resolve and show everything a build would do
//! without running the build tool

use tracing::info;

use super::{BuildRunner, BuildStep};
use crate::errors::DistResult;

/// Logs each step instead of running it, and always succeeds
#[derive(Debug, Default)]
pub struct FakeRunner {
    /// Every step we were asked to run, in order
    pub seen: Vec<BuildStep>,
}

impl BuildRunner for FakeRunner {
    fn run_step(&mut self, step: &BuildStep) -> DistResult<i32> {
        info!("(dry run) would run: {}", step.command().join(" "));
        if let BuildStep::Target(target) = step {
            for (key, val) in target.env.target_vars() {
                info!("(dry run)   {key}={val}");
            }
        }
        self.seen.push(step.clone());
        Ok(0)
    }
}

//! Mock testing utils: scratch directories, environments, configs,
//! and a build runner that fails on command

use camino::{Utf8Path, Utf8PathBuf};
use temp_dir::TempDir;

use crate::{
    build::{BuildRunner, BuildStep},
    config::{BuildConfig, PublishConfig, RetryPolicy},
    env::{AmbientEnv, BuildLayout},
    errors::DistResult,
    tag::VersionTag,
    targets::TARGETS,
};

pub const BIN_NAME: &str = "zramd";
pub const TAG: &str = "v1.2.3-4";
pub const OWNER: &str = "axolotl";
pub const REPO: &str = "zramd";
pub const TOKEN: &str = "hunter2";

/// A scratch directory plus its path, as utf8
pub fn scratch() -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();
    (tmp, path)
}

/// An environment with a working PATH plus whatever else you ask for
pub fn ambient(pairs: &[(&str, &str)]) -> AmbientEnv {
    let path = std::env::var("PATH").unwrap_or_default();
    AmbientEnv::from_pairs([("PATH", path.as_str())]).overlay(pairs.iter().copied())
}

pub fn layout(out_dir: &Utf8Path) -> BuildLayout {
    BuildLayout {
        out_dir: out_dir.to_owned(),
        binary_name: BIN_NAME.to_owned(),
    }
}

pub fn build_config(out_dir: &Utf8Path) -> BuildConfig {
    BuildConfig {
        tag: VersionTag::parse(TAG).unwrap(),
        layout: layout(out_dir),
        targets: TARGETS.to_vec(),
        build_command: vec!["make".to_owned(), "release".to_owned()],
        clean_command: Some(vec!["make".to_owned(), "clean".to_owned()]),
        dry_run: false,
        ambient: ambient(&[]),
    }
}

pub fn publish_config(api_server: &str, out_dir: &Utf8Path, arches: &[&str]) -> PublishConfig {
    PublishConfig {
        api_server: api_server.to_owned(),
        owner: OWNER.to_owned(),
        repo: REPO.to_owned(),
        token: TOKEN.to_owned(),
        tag: VersionTag::parse(TAG).unwrap(),
        layout: layout(out_dir),
        arches: arches.iter().map(|a| (*a).to_owned()).collect(),
        retry: RetryPolicy {
            max_retries: 2,
            delay: std::time::Duration::from_millis(1),
        },
    }
}

/// Touch the `.deb` and `.tar.gz` a build would leave behind for each arch
pub fn fake_artifacts(out_dir: &Utf8Path, arches: &[&str]) {
    let layout = layout(out_dir);
    for arch in arches {
        std::fs::write(layout.deb_path(arch), format!("deb for {arch}")).unwrap();
        std::fs::write(layout.tarball_path(arch), format!("tarball for {arch}")).unwrap();
    }
}

/// A runner that records what it was asked to do and fails where told
#[derive(Default)]
pub struct ScriptedRunner {
    /// (step description, exit code) pairs; anything not listed succeeds
    pub failures: Vec<(String, i32)>,
    /// Descriptions of every step that ran
    pub ran: Vec<String>,
}

impl ScriptedRunner {
    pub fn failing(step: &str, code: i32) -> Self {
        Self {
            failures: vec![(step.to_owned(), code)],
            ran: vec![],
        }
    }
}

impl BuildRunner for ScriptedRunner {
    fn run_step(&mut self, step: &BuildStep) -> DistResult<i32> {
        let describe = step.describe();
        self.ran.push(describe.clone());
        Ok(self
            .failures
            .iter()
            .find(|(name, _)| *name == describe)
            .map(|(_, code)| *code)
            .unwrap_or(0))
    }
}

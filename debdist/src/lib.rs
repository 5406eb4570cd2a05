#![deny(missing_docs)]
#![allow(clippy::result_large_err)]

//! # debdist
//!
//! This is the library at the core of the `debdist` CLI: build a Go project for
//! every architecture we ship, assemble Debian packages out of the staged
//! trees, and publish the results as a release. It mostly exists for the sake
//! of internal documentation/testing.
//!
//! Like the CLI, it happily writes to stderr (through `tracing` and the tools
//! it runs) whenever it pleases.

use debdist_schema::{BuildReport, PackageReport, PublishReport, ReleaseReport};
use tracing::info;

use config::{BuildConfig, PackageConfig, PublishConfig};
use errors::DistResult;

pub mod build;
pub mod config;
pub mod env;
pub mod errors;
pub mod net;
pub mod package;
pub mod publish;
pub mod tag;
pub mod targets;
pub mod templates;
#[cfg(test)]
mod tests;

/// A map with a stable iteration order, so environments and reports are deterministic
pub type SortedMap<K, V> = std::collections::BTreeMap<K, V>;

/// debdist build -- run the build matrix
pub fn do_build(cfg: &BuildConfig) -> DistResult<BuildReport> {
    info!(
        "building {} for {} target(s)",
        cfg.tag,
        cfg.targets.len()
    );
    let mut runner = build::runner_for(cfg);
    build::run_all(cfg, runner.as_mut())
}

/// debdist package -- assemble a .deb from a staged prefix
pub fn do_package(cfg: &PackageConfig) -> DistResult<PackageReport> {
    package::assemble(cfg)
}

/// debdist publish -- create the release and upload every asset
pub fn do_publish(cfg: &PublishConfig) -> DistResult<PublishReport> {
    let client = publish::client::ReleaseClient::new(cfg, &net::ClientSettings::new())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(publish::publish(cfg, &client))
}

/// debdist release -- build, then publish what was built
///
/// Both configs are resolved up front, so a missing credential is noticed
/// before anything gets built.
pub fn do_release(build: &BuildConfig, publish: &PublishConfig) -> DistResult<ReleaseReport> {
    let build = do_build(build)?;
    let publish = do_publish(publish)?;
    Ok(ReleaseReport { build, publish })
}

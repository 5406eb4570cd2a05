//! Config types
//!
//! Each pipeline step gets one fully-resolved record here. Resolution is the
//! only place that looks at the [`AmbientEnv`][], and it happens before any
//! step touches the filesystem or network, so a missing variable fails the
//! run before anything has been changed.

use std::time::Duration;

use axoasset::{LocalAsset, SourceFile};
use camino::{Utf8Path, Utf8PathBuf};
use debdist_schema::PackageManifest;
use tracing::{info, warn};

use crate::{
    env::{AmbientEnv, BuildLayout, ENV_PREFIX},
    errors::{DistError, DistResult},
    tag::VersionTag,
    targets::{select_targets, TargetDescriptor},
};

/// release tag being built/published
pub const ENV_CURRENT_TAG: &str = "CURRENT_TAG";
/// legacy worker count
pub const ENV_PROCESSES: &str = "PROCESSES";
/// path to the package manifest
pub const ENV_CONFIG_FILE: &str = "CONFIG_FILE";
/// owner of the repository releases are published to
pub const ENV_REPO_OWNER: &str = "REPO_OWNER";
/// name of the repository releases are published to
pub const ENV_REPO_NAME: &str = "REPO_NAME";
/// token for the release API
pub const ENV_RELEASE_TOKEN: &str = "GH_RELEASE_TOKEN";
/// base url of the release API (set by GitHub Actions runners)
pub const ENV_API_URL: &str = "GITHUB_API_URL";

/// Name of the binary we ship, unless told otherwise
pub const DEFAULT_BINARY_NAME: &str = "zramd";
/// Where build outputs go, unless told otherwise
pub const DEFAULT_OUT_DIR: &str = "build";
/// Command that builds and packages one target
pub const DEFAULT_BUILD_CMD: &[&str] = &["make", "release", "package"];
/// Command that cleans the tree before the matrix runs
pub const DEFAULT_CLEAN_CMD: &[&str] = &["make", "clean"];
/// Command that turns a staged prefix into a .deb
pub const DEFAULT_ARCHIVER: &[&str] = &["dpkg-deb"];
/// Release API to talk to
pub const DEFAULT_API_SERVER: &str = "https://api.github.com";
/// How many times a failed release API call is retried
pub const MAX_RETRIES: usize = 2;
/// How long to wait between release API attempts
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

fn owned_cmd(cmd: &[&str]) -> Vec<String> {
    cmd.iter().map(|s| (*s).to_owned()).collect()
}

fn nonempty_cmd(cmd: Vec<String>, what: &'static str) -> DistResult<Vec<String>> {
    if cmd.is_empty() || cmd[0].is_empty() {
        Err(DistError::EmptyCommand { what })
    } else {
        Ok(cmd)
    }
}

/// Unresolved inputs for `debdist build` (typically from the cli)
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Overrides CURRENT_TAG
    pub tag: Option<String>,
    /// Only build these targets (friendly names)
    pub targets: Vec<String>,
    /// Overrides [`DEFAULT_OUT_DIR`][]
    pub out_dir: Option<Utf8PathBuf>,
    /// Overrides [`DEFAULT_BINARY_NAME`][]
    pub binary_name: Option<String>,
    /// Overrides [`DEFAULT_BUILD_CMD`][]
    pub build_command: Option<Vec<String>>,
    /// Skip the clean step
    pub no_clean: bool,
    /// Don't actually run anything
    pub dry_run: bool,
}

/// Everything `debdist build` needs
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// The tag being built
    pub tag: VersionTag,
    /// Where outputs go
    pub layout: BuildLayout,
    /// Targets to build, in order
    pub targets: Vec<TargetDescriptor>,
    /// Command run once per target
    pub build_command: Vec<String>,
    /// Command run once before the matrix
    pub clean_command: Option<Vec<String>>,
    /// Log what would run instead of running it
    pub dry_run: bool,
    /// The environment builds inherit
    pub ambient: AmbientEnv,
}

impl BuildConfig {
    /// Resolve build settings against the environment
    pub fn resolve(options: BuildOptions, ambient: &AmbientEnv) -> DistResult<Self> {
        let raw_tag = match options.tag {
            Some(tag) => tag,
            None => ambient.require(ENV_CURRENT_TAG)?.to_owned(),
        };
        let tag = VersionTag::parse(&raw_tag)?;
        let targets = select_targets(&options.targets)?;
        let build_command = nonempty_cmd(
            options
                .build_command
                .unwrap_or_else(|| owned_cmd(DEFAULT_BUILD_CMD)),
            "build",
        )?;
        let clean_command = if options.no_clean {
            None
        } else {
            Some(owned_cmd(DEFAULT_CLEAN_CMD))
        };

        if let Some(processes) = ambient.get(ENV_PROCESSES) {
            match processes.parse::<usize>() {
                Ok(n) if n > 1 => warn!(
                    "{ENV_PROCESSES}={n} is ignored, targets are always built one at a time"
                ),
                Ok(_) => {}
                Err(_) => warn!("ignoring unparseable {ENV_PROCESSES}={processes}"),
            }
        }

        Ok(Self {
            tag,
            layout: BuildLayout {
                out_dir: options
                    .out_dir
                    .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUT_DIR)),
                binary_name: options
                    .binary_name
                    .unwrap_or_else(|| DEFAULT_BINARY_NAME.to_owned()),
            },
            targets,
            build_command,
            clean_command,
            dry_run: options.dry_run,
            ambient: ambient.clone(),
        })
    }
}

/// Unresolved inputs for `debdist package` (typically from the cli)
#[derive(Debug, Clone, Default)]
pub struct PackageOptions {
    /// Overrides CONFIG_FILE
    pub config_file: Option<Utf8PathBuf>,
    /// Overrides PREFIX
    pub prefix: Option<Utf8PathBuf>,
    /// Overrides [`DEFAULT_ARCHIVER`][]
    pub archiver: Option<Vec<String>>,
}

/// Everything `debdist package` needs
#[derive(Debug, Clone)]
pub struct PackageConfig {
    /// Where the manifest was loaded from
    pub manifest_path: Utf8PathBuf,
    /// The parsed manifest
    pub manifest: PackageManifest,
    /// The staging root
    pub prefix: Utf8PathBuf,
    /// Archiver command, `<args> --build <prefix>` get appended
    pub archiver: Vec<String>,
    /// The environment the install step inherits and templates resolve against
    pub vars: AmbientEnv,
}

impl PackageConfig {
    /// Resolve package settings against the environment and load the manifest
    pub fn resolve(options: PackageOptions, ambient: &AmbientEnv) -> DistResult<Self> {
        let manifest_path = match options.config_file {
            Some(path) => path,
            None => Utf8PathBuf::from(ambient.require(ENV_CONFIG_FILE)?),
        };
        let prefix = match options.prefix {
            Some(path) => path,
            None => Utf8PathBuf::from(ambient.require(ENV_PREFIX)?),
        };
        let manifest = load_package_manifest(&manifest_path)?;
        nonempty_cmd(manifest.build.install.command(), "install")?;
        let archiver = nonempty_cmd(
            options
                .archiver
                .unwrap_or_else(|| owned_cmd(DEFAULT_ARCHIVER)),
            "archiver",
        )?;

        // Templates and the install step should agree with us about where the prefix is
        let vars = ambient.overlay([(ENV_PREFIX, prefix.as_str())]);

        Ok(Self {
            manifest_path,
            manifest,
            prefix,
            archiver,
            vars,
        })
    }
}

/// Load and validate a package manifest
pub fn load_package_manifest(path: &Utf8Path) -> DistResult<PackageManifest> {
    info!("loading package manifest {path}");
    let src = SourceFile::load_local(path)?;
    let manifest = src.deserialize_yaml::<PackageManifest>()?;
    Ok(manifest)
}

/// How hard to try when talking to the release API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: usize,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            delay: RETRY_DELAY,
        }
    }
}

/// Unresolved inputs for `debdist publish` (typically from the cli)
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Overrides CURRENT_TAG
    pub tag: Option<String>,
    /// Friendly names of the architectures to publish
    pub arches: Vec<String>,
    /// Overrides [`DEFAULT_OUT_DIR`][]
    pub out_dir: Option<Utf8PathBuf>,
    /// Overrides [`DEFAULT_BINARY_NAME`][]
    pub binary_name: Option<String>,
    /// Overrides GITHUB_API_URL / [`DEFAULT_API_SERVER`][]
    pub api_server: Option<String>,
}

/// Everything `debdist publish` needs
///
/// This type intentionally does not implement Debug, to avoid leaking the token.
#[derive(Clone)]
pub struct PublishConfig {
    /// Base url of the release API
    pub api_server: String,
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// API token
    pub token: String,
    /// The tag being released
    pub tag: VersionTag,
    /// Where the artifacts are
    pub layout: BuildLayout,
    /// Friendly names of the architectures to publish, in upload order
    pub arches: Vec<String>,
    /// Retry behaviour for every API call
    pub retry: RetryPolicy,
}

impl PublishConfig {
    /// Resolve publish settings against the environment
    pub fn resolve(options: PublishOptions, ambient: &AmbientEnv) -> DistResult<Self> {
        let owner = ambient.require(ENV_REPO_OWNER)?.to_owned();
        let repo = ambient.require(ENV_REPO_NAME)?.to_owned();
        let token = ambient.require(ENV_RELEASE_TOKEN)?.to_owned();
        let raw_tag = match options.tag {
            Some(tag) => tag,
            None => ambient.require(ENV_CURRENT_TAG)?.to_owned(),
        };
        let tag = VersionTag::parse(&raw_tag)?;
        let api_server = options
            .api_server
            .or_else(|| ambient.get(ENV_API_URL).map(ToOwned::to_owned))
            .unwrap_or_else(|| DEFAULT_API_SERVER.to_owned());
        let layout = BuildLayout {
            out_dir: options
                .out_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUT_DIR)),
            binary_name: options
                .binary_name
                .unwrap_or_else(|| DEFAULT_BINARY_NAME.to_owned()),
        };

        let arches = if options.arches.is_empty() {
            let manifest = layout.targets_manifest_path();
            if manifest.exists() {
                parse_arch_list(&LocalAsset::load_string(&manifest)?)
            } else {
                vec![]
            }
        } else {
            options
                .arches
                .iter()
                .flat_map(|a| parse_arch_list(a))
                .collect()
        };
        if arches.is_empty() {
            return Err(DistError::NoArches);
        }

        Ok(Self {
            api_server,
            owner,
            repo,
            token,
            tag,
            layout,
            arches,
            retry: RetryPolicy::default(),
        })
    }
}

/// Split a comma-separated architecture list, dropping blanks
pub fn parse_arch_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

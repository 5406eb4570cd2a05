//! Functions to capture and derive environments
//!
//! Nothing in this crate reads the process environment except
//! [`AmbientEnv::capture`][]. Everything downstream gets an explicit
//! snapshot, and every subprocess is spawned with exactly the variables
//! in its [`BuildEnvironment`][] (or equivalent), nothing more.

use camino::Utf8PathBuf;

use crate::{
    errors::{DistError, DistResult},
    tag::VersionTag,
    targets::{TargetDescriptor, TARGET_OS},
    SortedMap,
};

/// compiler: target operating system
pub const ENV_OS: &str = "GOOS";
/// compiler: target architecture
pub const ENV_ARCH: &str = "GOARCH";
/// compiler: target architecture variant
pub const ENV_ARCH_VARIANT: &str = "GOARM";
/// packaging: dpkg architecture name
pub const ENV_DEB_ARCH: &str = "DEB_ARCH";
/// build: where to put the compiled binary
pub const ENV_OUTPUT: &str = "OUTPUT";
/// packaging: staging root for the package contents
pub const ENV_PREFIX: &str = "PREFIX";
/// packaging: version from the tag
pub const ENV_VERSION: &str = "VERSION";
/// packaging: package release from the tag
pub const ENV_RELEASE: &str = "RELEASE";
/// packaging: override for the computed installed size
pub const ENV_SIZE_KB: &str = "SIZE_KB";

/// A snapshot of the environment the pipeline was started in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientEnv {
    vars: SortedMap<String, String>,
}

impl AmbientEnv {
    /// Snapshot the current process environment
    ///
    /// Variables that aren't valid utf8 are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Build an environment from explicit pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a variable, treating empty values as unset
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Get a variable we can't do without
    pub fn require(&self, name: &str) -> DistResult<&str> {
        self.get(name).ok_or_else(|| DistError::MissingEnvVar {
            name: name.to_owned(),
        })
    }

    /// A copy of this environment with some variables added or replaced
    pub fn overlay<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars = self.vars.clone();
        vars.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self { vars }
    }

    /// All the variables
    pub fn vars(&self) -> &SortedMap<String, String> {
        &self.vars
    }
}

/// Where a build puts things for each target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    /// Directory all outputs go in
    pub out_dir: Utf8PathBuf,
    /// Name of the binary we're building (prefix of every artifact)
    pub binary_name: String,
}

impl BuildLayout {
    /// `<out_dir>/<binary>_<friendly>`
    pub fn output_path(&self, friendly_name: &str) -> Utf8PathBuf {
        self.out_dir
            .join(format!("{}_{}", self.binary_name, friendly_name))
    }

    /// `<out_dir>/<binary>_<friendly>_root`
    pub fn prefix_path(&self, friendly_name: &str) -> Utf8PathBuf {
        self.out_dir
            .join(format!("{}_{}_root", self.binary_name, friendly_name))
    }

    /// `<out_dir>/<binary>_<friendly>.deb`
    pub fn deb_path(&self, friendly_name: &str) -> Utf8PathBuf {
        self.out_dir
            .join(format!("{}_{}.deb", self.binary_name, friendly_name))
    }

    /// `<out_dir>/<binary>_<friendly>.tar.gz`
    pub fn tarball_path(&self, friendly_name: &str) -> Utf8PathBuf {
        self.out_dir
            .join(format!("{}_{}.tar.gz", self.binary_name, friendly_name))
    }

    /// The file listing which targets the last build produced
    pub fn targets_manifest_path(&self) -> Utf8PathBuf {
        self.out_dir.join("targets.txt")
    }
}

/// The complete environment one target's build runs with
///
/// Built fresh for every target and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    /// The target this is for
    pub target: TargetDescriptor,
    /// Where the binary goes
    pub output: Utf8PathBuf,
    /// Where the package gets staged
    pub prefix: Utf8PathBuf,
    vars: SortedMap<String, String>,
}

impl BuildEnvironment {
    /// Derive the environment for a target
    pub fn for_target(
        ambient: &AmbientEnv,
        target: &TargetDescriptor,
        tag: &VersionTag,
        layout: &BuildLayout,
    ) -> Self {
        let output = layout.output_path(target.friendly_name);
        let prefix = layout.prefix_path(target.friendly_name);

        let mut vars = ambient.vars().clone();
        vars.insert(ENV_OS.to_owned(), TARGET_OS.to_owned());
        vars.insert(ENV_ARCH.to_owned(), target.cpu_arch.to_owned());
        match target.cpu_variant {
            Some(variant) => {
                vars.insert(ENV_ARCH_VARIANT.to_owned(), variant.to_owned());
            }
            None => {
                // A stray GOARM from the caller's shell would leak into a non-arm build
                vars.remove(ENV_ARCH_VARIANT);
            }
        }
        vars.insert(ENV_DEB_ARCH.to_owned(), target.deb_arch().to_owned());
        vars.insert(ENV_OUTPUT.to_owned(), output.to_string());
        vars.insert(ENV_PREFIX.to_owned(), prefix.to_string());
        vars.insert(ENV_VERSION.to_owned(), tag.version.clone());
        vars.insert(ENV_RELEASE.to_owned(), tag.release.clone());

        Self {
            target: *target,
            output,
            prefix,
            vars,
        }
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// All the variables, for handing to a subprocess
    pub fn vars(&self) -> &SortedMap<String, String> {
        &self.vars
    }

    /// Only the variables this target sets on top of the ambient environment
    pub fn target_vars(&self) -> Vec<(&str, &str)> {
        [
            ENV_OS,
            ENV_ARCH,
            ENV_ARCH_VARIANT,
            ENV_DEB_ARCH,
            ENV_OUTPUT,
            ENV_PREFIX,
            ENV_VERSION,
            ENV_RELEASE,
        ]
        .into_iter()
        .filter_map(|k| Some((k, self.get(k)?)))
        .collect()
    }
}

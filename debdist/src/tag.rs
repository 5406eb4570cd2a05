//! Release tag parsing
//!
//! Tags look like `v1.2.3` or `v1.2.3-4`, where the optional suffix is the
//! Debian package release (the `-4` in `zramd_1.2.3-4_armhf.deb`).

use std::fmt;

use semver::Version;

use crate::errors::{DistError, DistResult};

/// The package release used when a tag doesn't specify one
pub const DEFAULT_RELEASE: &str = "1";

/// A parsed release tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    /// The tag exactly as it was given
    pub raw: String,
    /// The version, without the leading `v` (e.g. `1.2.3`)
    pub version: String,
    /// The package release, never empty (defaults to [`DEFAULT_RELEASE`][])
    pub release: String,
}

impl VersionTag {
    /// Parse a tag of the form `vMAJOR.MINOR.PATCH[-RELEASE]`
    pub fn parse(tag: &str) -> DistResult<Self> {
        let err = |reason: &str| DistError::TagParse {
            tag: tag.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = tag.trim();
        let Some(rest) = trimmed.strip_prefix('v') else {
            return Err(err("tags must start with a 'v'"));
        };

        let (version, release) = match rest.split_once('-') {
            Some((_, "")) => return Err(err("the release after '-' is empty")),
            Some((version, release)) => (version, release),
            None => (rest, DEFAULT_RELEASE),
        };

        // We only accept plain MAJOR.MINOR.PATCH here, anything after a `-`
        // was already peeled off as the release.
        let parsed = version
            .parse::<Version>()
            .map_err(|e| err(&e.to_string()))?;
        if !parsed.build.is_empty() {
            return Err(err("build metadata isn't supported"));
        }
        if release.contains(char::is_whitespace) || release.contains('-') {
            return Err(err("the release can't contain whitespace or '-'"));
        }

        Ok(Self {
            raw: trimmed.to_owned(),
            version: version.to_owned(),
            release: release.to_owned(),
        })
    }

    /// The tag with the release spelled out (`v1.2.3` becomes `v1.2.3-1`)
    pub fn canonical(&self) -> String {
        format!("v{}-{}", self.version, self.release)
    }

    /// The Debian version string (`1.2.3-1`)
    pub fn deb_version(&self) -> String {
        format!("{}-{}", self.version, self.release)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

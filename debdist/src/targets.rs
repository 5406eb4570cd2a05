//! The fixed set of architectures we ship

use crate::errors::{DistError, DistResult};

/// The operating system every target is built for
pub const TARGET_OS: &str = "linux";

/// One entry of the build matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescriptor {
    /// Architecture token understood by the compiler (GOARCH)
    pub cpu_arch: &'static str,
    /// Architecture variant (GOARM), only meaningful for 32-bit arm
    pub cpu_variant: Option<&'static str>,
    /// Human-readable name, also used in artifact names
    pub friendly_name: &'static str,
}

/// Everything we build, in build order
pub const TARGETS: &[TargetDescriptor] = &[
    TargetDescriptor {
        cpu_arch: "arm",
        cpu_variant: Some("6"),
        friendly_name: "armel",
    },
    TargetDescriptor {
        cpu_arch: "arm",
        cpu_variant: Some("7"),
        friendly_name: "armhf",
    },
    TargetDescriptor {
        cpu_arch: "arm64",
        cpu_variant: None,
        friendly_name: "arm64",
    },
    TargetDescriptor {
        cpu_arch: "amd64",
        cpu_variant: None,
        friendly_name: "amd64",
    },
];

impl TargetDescriptor {
    /// The architecture name dpkg uses for this target
    pub fn deb_arch(&self) -> &'static str {
        match (self.cpu_arch, self.cpu_variant) {
            ("arm", Some("5" | "6")) => "armel",
            ("arm", _) => "armhf",
            ("386", _) => "i386",
            (arch, _) => arch,
        }
    }
}

/// Find a target by its friendly name
pub fn lookup_target(name: &str) -> DistResult<&'static TargetDescriptor> {
    TARGETS
        .iter()
        .find(|t| t.friendly_name == name)
        .ok_or_else(|| DistError::UnknownTarget {
            name: name.to_owned(),
            known: known_targets(),
        })
}

/// Select a subset of [`TARGETS`][] by friendly name, keeping table order
///
/// An empty selection means "everything".
pub fn select_targets(names: &[String]) -> DistResult<Vec<TargetDescriptor>> {
    if names.is_empty() {
        return Ok(TARGETS.to_vec());
    }
    for name in names {
        lookup_target(name)?;
    }
    Ok(TARGETS
        .iter()
        .filter(|t| names.iter().any(|n| n == t.friendly_name))
        .copied()
        .collect())
}

fn known_targets() -> String {
    TARGETS
        .iter()
        .map(|t| t.friendly_name)
        .collect::<Vec<_>>()
        .join(", ")
}

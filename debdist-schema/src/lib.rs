#![deny(missing_docs)]

//! # debdist-schema
//!
//! This crate exists to serialize and deserialize the documents debdist reads and writes:
//!
//! * the YAML package manifest that drives `.deb` assembly ([`PackageManifest`][])
//! * the bodies exchanged with the release API ([`CreateRelease`][], [`Release`][], [`ReleaseAsset`][])
//! * the machine-readable reports printed by `--output-format=json` ([`BuildReport`][], [`PublishReport`][])

use std::fmt;

use schemars::JsonSchema;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The install command used when a manifest doesn't specify one
pub const DEFAULT_INSTALL_CMD: &[&str] = &["make", "install"];

/// A string->string mapping that remembers the order its keys were declared in.
///
/// Debian control files are order-sensitive for humans (and `Package` must come first),
/// so we can't just throw these into a BTreeMap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedFields(pub Vec<(String, String)>);

impl OrderedFields {
    /// Iterate over the entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Look up the value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OrderedFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for OrderedFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderedFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = OrderedFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of strings to strings")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                // `control:` with nothing under it
                Ok(OrderedFields::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    if fields.iter().any(|(k, _)| *k == key) {
                        return Err(serde::de::Error::custom(format!("duplicate key `{key}`")));
                    }
                    fields.push((key, value));
                }
                Ok(OrderedFields(fields))
            }
        }

        deserializer.deserialize_any(FieldsVisitor)
    }
}

impl JsonSchema for OrderedFields {
    fn schema_name() -> String {
        "OrderedFields".to_owned()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <std::collections::BTreeMap<String, String>>::json_schema(gen)
    }
}

/// A YAML document describing how to turn a staged tree into a `.deb`
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PackageManifest {
    /// Debian control fields, in the order they should be written.
    ///
    /// Values may reference `${NAME}` variables from the environment, plus `SIZE_KB`.
    #[serde(default)]
    pub control: OrderedFields,
    /// Maintainer scripts (`postinst`, `prerm`, ...) keyed by filename, with their literal bodies
    #[serde(default)]
    pub scripts: OrderedFields,
    /// How to populate and archive the package
    #[serde(default)]
    pub build: BuildSettings,
}

/// The `build` section of a [`PackageManifest`][]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    /// The step that populates the staging prefix
    #[serde(default)]
    pub install: InstallSettings,
    /// Extra arguments for the archiver, placed before `--build <prefix>`
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Template for the final name of the archive (relative to the prefix's parent dir)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// Whether to record files under `etc/` as conffiles
    #[serde(default)]
    pub conffiles: ConffilesMode,
}

/// The `build.install` section of a [`PackageManifest`][]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct InstallSettings {
    /// Command (and arguments) to run, defaults to `make install`
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    /// Extra environment for the command, values may reference `${NAME}` variables
    #[serde(default)]
    pub env: OrderedFields,
}

impl InstallSettings {
    /// The command to run, with the default applied
    pub fn command(&self) -> Vec<String> {
        match &self.cmd {
            Some(cmd) => cmd.clone(),
            None => DEFAULT_INSTALL_CMD.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// How the `conffiles` metadata file should be produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ConffilesMode {
    /// Write conffiles if the staged tree has an `etc` directory, skip it otherwise
    #[default]
    Auto,
    /// The staged tree must have an `etc` directory
    Required,
    /// Never write conffiles
    Disabled,
}

impl PackageManifest {
    /// Get the JSON Schema for a PackageManifest
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PackageManifest)
    }
}

/// Body of the "create a release" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRelease {
    /// The (already pushed) git tag the release is attached to
    pub tag_name: String,
    /// Title of the release
    pub name: String,
    /// Markdown body of the release
    pub body: String,
}

/// The parts of a release object we care about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    /// Numeric id of the release
    #[serde(default)]
    pub id: Option<u64>,
    /// Where humans can look at the release
    #[serde(default)]
    pub html_url: Option<String>,
    /// RFC 6570 template of the asset upload endpoint
    /// (e.g. `https://uploads.github.com/repos/o/r/releases/1/assets{?name,label}`)
    #[serde(default)]
    pub upload_url: Option<String>,
}

/// The parts of an uploaded asset object we care about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Name of the asset
    pub name: String,
    /// Public download url
    #[serde(default)]
    pub browser_download_url: Option<String>,
}

/// Summary of a `debdist build` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    /// The tag that was built
    pub tag: String,
    /// Version derived from the tag
    pub version: String,
    /// Package release derived from the tag
    pub release: String,
    /// Targets that were built, in build order
    pub targets: Vec<BuiltTarget>,
}

/// One successfully built target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltTarget {
    /// Friendly architecture name (e.g. `armhf`)
    pub friendly_name: String,
    /// Debian architecture name
    pub deb_arch: String,
    /// Path of the compiled binary
    pub output: String,
}

/// Summary of a `debdist publish` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReport {
    /// The tag that was released
    pub tag: String,
    /// Where humans can look at the release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_url: Option<String>,
    /// Assets that were uploaded, in upload order
    pub assets: Vec<PublishedAsset>,
}

/// One uploaded asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedAsset {
    /// Name the asset was uploaded as
    pub name: String,
    /// Local file that was uploaded
    pub path: String,
    /// Public download url, if the server told us
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// Summary of a `debdist package` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageReport {
    /// The finished archive
    pub path: String,
    /// Installed size written into the control file
    pub size_kb: String,
}

/// Summary of a `debdist release` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReport {
    /// What was built
    pub build: BuildReport,
    /// What was published
    pub publish: PublishReport,
}

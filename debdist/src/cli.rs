//! All the clap stuff for parsing/documenting the cli

use camino::Utf8PathBuf;
use clap::{
    builder::{PossibleValuesParser, TypedValueParser},
    Args, Parser, Subcommand, ValueEnum,
};
use debdist::config::{BuildOptions, PackageOptions, PublishOptions};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Clone, Debug)]
#[clap(version, about, long_about = None)]
#[clap(propagate_version = true)]
/// Build, package and publish Debian releases of a Go project.
///
/// Every setting can come from the environment (CURRENT_TAG, CONFIG_FILE,
/// PREFIX, REPO_OWNER, REPO_NAME, GH_RELEASE_TOKEN, ...). Flags win over
/// the environment.
pub struct Cli {
    /// The step to run
    #[clap(subcommand)]
    pub command: Commands,

    /// How verbose logging should be (log level)
    #[clap(long, short)]
    #[clap(default_value_t = LevelFilter::WARN)]
    #[clap(value_parser = PossibleValuesParser::new(["off", "error", "warn", "info", "debug", "trace"]).map(|s| s.parse::<LevelFilter>().expect("possible values are valid")))]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub verbose: LevelFilter,

    /// The format of the output
    #[clap(long, short, value_enum)]
    #[clap(default_value_t = OutputFormat::Human)]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub output_format: OutputFormat,

    /// The release tag to work on (e.g. "v1.2.3" or "v1.2.3-2")
    ///
    /// Defaults to the CURRENT_TAG environment variable.
    #[clap(long)]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub tag: Option<String>,

    /// Directory build outputs go in (default "build")
    #[clap(long)]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub out_dir: Option<Utf8PathBuf>,

    /// Name of the binary being shipped, used in every artifact name (default "zramd")
    #[clap(long)]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub binary_name: Option<String>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Build (and package) every target, one at a time
    ///
    /// Stops at the first target that fails and exits with its exit code.
    /// On success the built architectures are recorded in <out-dir>/targets.txt
    /// for 'debdist publish'.
    #[clap(disable_version_flag = true)]
    Build(BuildArgs),
    /// Assemble a Debian package from a staged prefix
    ///
    /// Usually invoked by the build tool for each target, with CONFIG_FILE
    /// and PREFIX set.
    #[clap(disable_version_flag = true)]
    Package(PackageArgs),
    /// Create a release and upload every .deb and .tar.gz to it
    #[clap(disable_version_flag = true)]
    Publish(PublishArgs),
    /// Build, then publish what was built
    #[clap(disable_version_flag = true)]
    Release(ReleaseArgs),
    /// Print the JSON Schema of the package manifest
    #[clap(disable_version_flag = true)]
    ManifestSchema(ManifestSchemaArgs),
}

/// Settings shared by everything that runs the build matrix
#[derive(Args, Clone, Debug, Default)]
pub struct MatrixArgs {
    /// Only build these targets (friendly names like "armhf", comma-separated or repeated)
    #[clap(long, short, value_delimiter = ',')]
    pub target: Vec<String>,

    /// Command to run for each target, instead of "make release package"
    #[clap(long, num_args = 1.., allow_hyphen_values = true)]
    pub build_command: Option<Vec<String>>,

    /// Don't run "make clean" before building
    #[clap(long)]
    pub no_clean: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub struct BuildArgs {
    #[clap(flatten)]
    pub matrix: MatrixArgs,

    /// Log every step and its environment without running anything
    #[clap(long)]
    pub dry_run: bool,
}

impl BuildArgs {
    /// Convert the application version of these args to the library version
    pub fn to_lib(&self, cli: &Cli) -> BuildOptions {
        BuildOptions {
            dry_run: self.dry_run,
            ..self.matrix.to_lib(cli)
        }
    }
}

impl MatrixArgs {
    /// Convert the application version of these args to the library version
    pub fn to_lib(&self, cli: &Cli) -> BuildOptions {
        BuildOptions {
            tag: cli.tag.clone(),
            targets: self.target.clone(),
            out_dir: cli.out_dir.clone(),
            binary_name: cli.binary_name.clone(),
            build_command: self.build_command.clone(),
            no_clean: self.no_clean,
            dry_run: false,
        }
    }
}

#[derive(Args, Clone, Debug, Default)]
pub struct PackageArgs {
    /// The package manifest (defaults to the CONFIG_FILE environment variable)
    #[clap(long)]
    pub config_file: Option<Utf8PathBuf>,

    /// The staging root (defaults to the PREFIX environment variable)
    #[clap(long)]
    pub prefix: Option<Utf8PathBuf>,

    /// Archiver to invoke instead of "dpkg-deb"
    #[clap(long, num_args = 1.., allow_hyphen_values = true)]
    pub archiver: Option<Vec<String>>,
}

impl PackageArgs {
    /// Convert the application version of these args to the library version
    pub fn to_lib(&self) -> PackageOptions {
        PackageOptions {
            config_file: self.config_file.clone(),
            prefix: self.prefix.clone(),
            archiver: self.archiver.clone(),
        }
    }
}

#[derive(Args, Clone, Debug, Default)]
pub struct PublishArgs {
    /// Comma-separated architectures to publish (e.g. "armel,armhf,arm64,amd64")
    ///
    /// Defaults to whatever the last 'debdist build' recorded.
    pub arches: Option<String>,

    /// Base url of the release API (defaults to GITHUB_API_URL, then https://api.github.com)
    #[clap(long)]
    pub api_server: Option<String>,
}

impl PublishArgs {
    /// Convert the application version of these args to the library version
    pub fn to_lib(&self, cli: &Cli) -> PublishOptions {
        PublishOptions {
            tag: cli.tag.clone(),
            arches: self.arches.iter().cloned().collect(),
            out_dir: cli.out_dir.clone(),
            binary_name: cli.binary_name.clone(),
            api_server: self.api_server.clone(),
        }
    }
}

#[derive(Args, Clone, Debug, Default)]
pub struct ReleaseArgs {
    #[clap(flatten)]
    pub matrix: MatrixArgs,

    /// Base url of the release API (defaults to GITHUB_API_URL, then https://api.github.com)
    #[clap(long)]
    pub api_server: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ManifestSchemaArgs {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

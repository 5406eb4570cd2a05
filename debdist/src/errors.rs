//! Errors!
//!
//! At the edges everything becomes a `miette::Report`, but the exit code
//! the process reports is decided here.

use axoasset::reqwest;
use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// An alias for the common Result type for this crate
pub type DistResult<T> = std::result::Result<T, DistError>;

/// Errors debdist can have
#[derive(Debug, Error, Diagnostic)]
pub enum DistError {
    /// random i/o error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// random axoasset error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Asset(#[from] axoasset::AxoassetError),

    /// random axoprocess error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cmd(#[from] axoprocess::AxoprocessError),

    /// error while walking a staged tree
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// a path we walked over wasn't utf8
    #[error(transparent)]
    NonUtf8Path(#[from] camino::FromPathBufError),

    /// random json error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A variable we can't run without wasn't in the environment
    #[error("the {name} variable is not set")]
    #[diagnostic(help("set {name} in the environment, or pass the matching command line flag"))]
    MissingEnvVar {
        /// Name of the variable
        name: String,
    },

    /// The release tag didn't look like `vMAJOR.MINOR.PATCH[-RELEASE]`
    #[error("couldn't parse release tag {tag}: {reason}")]
    #[diagnostic(help("tags should look like v1.2.3 or v1.2.3-4"))]
    TagParse {
        /// The tag we were given
        tag: String,
        /// What was wrong with it
        reason: String,
    },

    /// Someone asked for a target that isn't in the table
    #[error("unknown target {name}")]
    #[diagnostic(help("the known targets are: {known}"))]
    UnknownTarget {
        /// The name we were given
        name: String,
        /// Comma-separated friendly names we do know
        known: String,
    },

    /// A command line was configured as an empty list
    #[error("the {what} command is empty")]
    EmptyCommand {
        /// Which command this was
        what: &'static str,
    },

    /// An external tool ran and reported failure
    #[error("{tool} failed (exit code {code})")]
    ToolFailed {
        /// What we were running
        tool: String,
        /// The exit code it reported (or 1 if it was killed by a signal)
        code: i32,
    },

    /// The manifest demands conffiles but nothing was installed under etc
    #[error("no etc directory found under {prefix}")]
    #[diagnostic(help(
        "the package manifest sets build.conffiles to required, did the install step run?"
    ))]
    MissingEtc {
        /// The staging prefix
        prefix: Utf8PathBuf,
    },

    /// The staging prefix has no final component to name the archive after
    #[error("{prefix} can't be used as a staging prefix")]
    #[diagnostic(help("PREFIX should name a directory, like build/zramd_amd64_root"))]
    BadPrefix {
        /// The prefix we were given
        prefix: Utf8PathBuf,
    },

    /// The archiver claimed success but the archive isn't there
    #[error("expected the archiver to produce {path}, but it doesn't exist")]
    MissingArchive {
        /// Where we expected it
        path: Utf8PathBuf,
    },

    /// A file we were asked to publish doesn't exist
    #[error("asset {path} doesn't exist")]
    #[diagnostic(help("did you run 'debdist build' for every architecture you're publishing?"))]
    MissingAsset {
        /// Where we looked
        path: Utf8PathBuf,
    },

    /// Nothing to publish
    #[error("no architectures were given to publish")]
    #[diagnostic(help(
        "pass a comma-separated list of architectures, or run 'debdist build' to record one"
    ))]
    NoArches,

    /// random reqwest error
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// random url error
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// The release API answered with an error status
    #[error("server error {status}")]
    ResponseError {
        /// The status code
        status: reqwest::StatusCode,
        /// Whatever text came with it
        #[help]
        body: Option<String>,
    },

    /// The token can't be put in a header
    #[error("the release token contains characters that aren't allowed in an http header")]
    BadToken,

    /// The release API answered but left out the upload endpoint
    #[error("the release response didn't include an upload_url")]
    MissingUploadUrl,

    /// Some release API call kept failing
    #[error("couldn't {operation} after {attempts} attempts")]
    RetriesExhausted {
        /// What we were trying to do
        operation: String,
        /// How many times we tried
        attempts: usize,
        /// The last failure
        #[source]
        cause: Box<DistError>,
    },
}

impl DistError {
    /// The exit code the process should report for this error
    ///
    /// External tools that failed get their own exit code propagated,
    /// everything else is a plain 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            DistError::ToolFailed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Whether trying the same request again might go differently
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DistError::Reqwest(_) | DistError::ResponseError { .. } | DistError::Json(_)
        )
    }
}

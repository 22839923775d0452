use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Step of the install pipeline an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Resolving,
    Downloading,
    Extracting,
    Planning,
    Staging,
    Committing,
    Uninstalling,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallPhase::Resolving => "resolving",
            InstallPhase::Downloading => "downloading",
            InstallPhase::Extracting => "extracting",
            InstallPhase::Planning => "planning",
            InstallPhase::Staging => "staging",
            InstallPhase::Committing => "committing",
            InstallPhase::Uninstalling => "uninstalling",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PluginError {
    // Manifest errors
    #[error("The plugin name {name:?} is not allowed")]
    UnsafePluginName { name: String },

    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),

    #[error("No matching platform found for plugin {plugin}")]
    NoMatchingPlatform { plugin: String },

    #[error("Can't force HEAD for plugin {plugin}, no HEAD specified")]
    NoHeadAvailable { plugin: String },

    // Download errors
    #[error("Failed to fetch {uri}: {reason}")]
    FetchFailed { uri: String, reason: String },

    #[error("Verification failed for {uri}: {reason}")]
    VerificationFailed { uri: String, reason: String },

    #[error("Content type {content_type} is not a supported archive")]
    UnsupportedArchiveType { content_type: String },

    #[error("Archive entry {entry:?} escapes the destination directory")]
    ExtractionPathEscape { entry: String },

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    // File operation errors
    #[error("Invalid file operation: {0}")]
    InvalidFileOperation(String),

    #[error("File {} declared in the manifest does not exist in the archive", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("No files in the plugin archive matched the glob pattern {pattern:?}")]
    GlobNoMatch { pattern: String },

    #[error("Move target {} is not inside {}", path.display(), base.display())]
    MovePathEscape { path: PathBuf, base: PathBuf },

    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin entry point {bin:?} is invalid: {reason}")]
    InvalidEntryPoint { bin: String, reason: String },

    // Installation state errors
    #[error("File {} is not a symlink", path.display())]
    NotASymlink { path: PathBuf },

    #[error("Receipt {} not found", path.display())]
    ReceiptNotFound { path: PathBuf },

    #[error("Plugin {plugin} is not installed")]
    NotInstalled { plugin: String },

    #[error("Removing {plugin} is not allowed through itself, please run:\n\trm -r {}", base.display())]
    SelfUninstall { plugin: String, base: PathBuf },

    #[error("Another operation holds the lock {}", path.display())]
    Locked { path: PathBuf },

    #[error("Failed {phase} plugin {plugin}: {source}")]
    Phase {
        phase: InstallPhase,
        plugin: String,
        #[source]
        source: Box<PluginError>,
    },

    // Wrapped library errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl PluginError {
    /// Wraps the error with the install phase it happened in.
    pub fn in_phase(self, phase: InstallPhase, plugin: &str) -> Self {
        PluginError::Phase {
            phase,
            plugin: plugin.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping phase wrappers.
    pub fn root(&self) -> &PluginError {
        match self {
            PluginError::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    /// The phase of the outermost wrapper, if any.
    pub fn phase(&self) -> Option<InstallPhase> {
        match self {
            PluginError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;

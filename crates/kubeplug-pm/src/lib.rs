pub mod config;
pub mod downloader;
pub mod error;
pub mod index;
pub mod installer;
pub mod migration;
pub mod receipt;
pub mod util;

pub use config::{ConfigLoader, Paths, TargetPlatform};
pub use downloader::{Downloader, FileFetcher, Fetcher, HttpFetcher, HttpFetcherConfig};
pub use error::{InstallPhase, PluginError, Result};
pub use index::{FileOperation, LabelSelector, Platform, Plugin, Receipt};
pub use installer::{InstallOptions, InstallOutcome, Installer, UpgradeOutcome};
pub use migration::{is_migrated, migrate, MigrationReport};
pub use util::Cancellation;

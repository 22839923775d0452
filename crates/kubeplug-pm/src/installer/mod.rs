//! Plugin installation.
//!
//! The [`Installer`] drives one plugin through resolving, downloading,
//! extracting, planning, staging and committing. The pieces it is built
//! from are exported for reuse:
//!
//! - [`resolve_target`] picks the platform entry, version and file layout
//! - [`plan_moves`] / [`apply_moves`] map archive contents to the layout
//! - [`BinaryLinker`] maintains the `kubectl-<name>` links
//! - the registry functions read what is installed from the store

mod binary;
mod installer;
mod lock;
mod planner;
mod platform;
mod registry;

pub use binary::{plugin_name_to_bin, remove_link, BinaryLinker};
pub use installer::{InstallOptions, InstallOutcome, Installer, UpgradeOutcome, MANAGER_PLUGIN_NAME};
pub use lock::InstallLock;
pub use planner::{apply_moves, default_file_operations, plan_moves, Move};
pub use platform::{resolve_platform, resolve_target, resolve_version, DownloadTarget, HEAD_VERSION};
pub use registry::{contains_plugin_descriptor, find_installed_version, list_installed, DESCRIPTOR_FILE_NAME};

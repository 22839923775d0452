use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Paths, TargetPlatform};
use crate::downloader::{Downloader, Fetcher, InsecureVerifier, Sha256Verifier, Verifier};
use crate::error::InstallPhase;
use crate::index::{ensure_safe_plugin_name, Plugin, DEFAULT_INDEX_NAME};
use crate::receipt;
use crate::util::{join_within, normalize_path, Cancellation};
use crate::{PluginError, Result};

use super::binary::BinaryLinker;
use super::lock::InstallLock;
use super::planner::{apply_moves, plan_moves};
use super::platform::{resolve_target, DownloadTarget};
use super::registry::{self, contains_plugin_descriptor, DESCRIPTOR_FILE_NAME};

/// Name under which the manager itself is installed as a plugin
pub const MANAGER_PLUGIN_NAME: &str = "kubeplug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Install from the platform's `head` reference
    pub force_head: bool,
    /// Install again even if the same version is present
    pub force_reinstall: bool,
    /// Index the manifest came from, recorded in the receipt
    pub source_index: String,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            force_head: false,
            force_reinstall: false,
            source_index: DEFAULT_INDEX_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { version: String },
    AlreadyInstalled { version: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    AlreadyUpgraded { version: String },
    Upgraded { from: String, to: String },
}

/// Installs, upgrades and removes plugins below one [`Paths`] layout.
///
/// Every error returned from here is wrapped in [`PluginError::Phase`].
pub struct Installer {
    paths: Paths,
    fetcher: Arc<dyn Fetcher>,
    target: TargetPlatform,
    cancel: Cancellation,
    self_name: String,
}

impl Installer {
    pub fn new(paths: Paths, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            paths,
            fetcher,
            target: TargetPlatform::host(),
            cancel: Cancellation::new(),
            self_name: MANAGER_PLUGIN_NAME.to_string(),
        }
    }

    pub fn with_target(mut self, target: TargetPlatform) -> Self {
        self.target = target;
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Override the plugin name that may not be uninstalled through itself.
    pub fn with_self_name(mut self, name: impl Into<String>) -> Self {
        self.self_name = name.into();
        self
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn target(&self) -> &TargetPlatform {
        &self.target
    }

    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    fn linker(&self) -> BinaryLinker {
        BinaryLinker::new(self.paths.bin_path(), self.target.is_windows())
    }

    /// Install `plugin` for the configured target platform.
    pub async fn install(&self, plugin: &Plugin, options: &InstallOptions) -> Result<InstallOutcome> {
        let name = plugin.name();
        let phase = |e: PluginError| e.in_phase(InstallPhase::Resolving, name);

        ensure_safe_plugin_name(name).map_err(phase)?;
        let _lock = InstallLock::acquire(&self.paths.plugin_lock_path(name)).map_err(phase)?;

        log::debug!("Resolving {} for {}", name, self.target);
        let target = resolve_target(plugin, &self.target, options.force_head).map_err(phase)?;

        self.install_target(plugin, &target, options).await
    }

    /// Move an installed plugin to the version its manifest resolves to.
    pub async fn upgrade(&self, plugin: &Plugin, options: &InstallOptions) -> Result<UpgradeOutcome> {
        let name = plugin.name();
        let phase = |e: PluginError| e.in_phase(InstallPhase::Resolving, name);

        ensure_safe_plugin_name(name).map_err(phase)?;
        let _lock = InstallLock::acquire(&self.paths.plugin_lock_path(name)).map_err(phase)?;

        let installed = registry::find_installed_version(&self.paths.install_path(), name)
            .map_err(phase)?
            .ok_or_else(|| phase(PluginError::NotInstalled { plugin: name.to_string() }))?;

        let target = resolve_target(plugin, &self.target, options.force_head).map_err(phase)?;
        if installed == target.version && !target.is_head() {
            log::debug!("Plugin {} is already at version {}", name, installed);
            return Ok(UpgradeOutcome::AlreadyUpgraded { version: installed });
        }

        log::info!("Upgrading plugin {} from {} to {}", name, installed, target.version);
        let options = InstallOptions {
            force_reinstall: true,
            ..options.clone()
        };
        self.install_target(plugin, &target, &options).await?;

        Ok(UpgradeOutcome::Upgraded {
            from: installed,
            to: target.version,
        })
    }

    /// Remove a plugin's link, install directory and receipt.
    pub fn uninstall(&self, name: &str) -> Result<()> {
        let phase = |e: PluginError| e.in_phase(InstallPhase::Uninstalling, name);

        if name == self.self_name {
            return Err(phase(PluginError::SelfUninstall {
                plugin: name.to_string(),
                base: self.paths.base_path().to_path_buf(),
            }));
        }
        ensure_safe_plugin_name(name).map_err(phase)?;
        let _lock = InstallLock::acquire(&self.paths.plugin_lock_path(name)).map_err(phase)?;

        let receipt_path = self.paths.plugin_install_receipt_path(name);
        let install_dir = self.paths.plugin_install_path(name);
        if receipt_path.symlink_metadata().is_err() && install_dir.symlink_metadata().is_err() {
            return Err(phase(PluginError::NotInstalled { plugin: name.to_string() }));
        }

        log::debug!("Deleting plugin {}", name);
        self.linker().unlink(name).map_err(phase)?;

        log::debug!("Deleting path {}", install_dir.display());
        remove_if_exists(&install_dir, |p| std::fs::remove_dir_all(p)).map_err(phase)?;
        remove_if_exists(&receipt_path, |p| std::fs::remove_file(p)).map_err(phase)?;

        log::info!("Uninstalled plugin {}", name);
        Ok(())
    }

    /// Installed plugins and their versions.
    pub fn list_installed(&self) -> Result<BTreeMap<String, String>> {
        registry::list_installed(&self.paths.install_path())
    }

    fn is_installed_at(&self, name: &str, version: &str) -> Result<bool> {
        let version_dir = self.paths.plugin_version_install_path(name, version);
        Ok(version_dir.is_dir()
            && contains_plugin_descriptor(&version_dir)?
            && self.paths.plugin_install_receipt_path(name).is_file()
            && self.linker().is_linked(name))
    }

    async fn install_target(
        &self,
        plugin: &Plugin,
        target: &DownloadTarget,
        options: &InstallOptions,
    ) -> Result<InstallOutcome> {
        let name = plugin.name();

        if !options.force_reinstall
            && self
                .is_installed_at(name, &target.version)
                .map_err(|e| e.in_phase(InstallPhase::Resolving, name))?
        {
            log::info!("Plugin {} is already installed at version {}", name, target.version);
            return Ok(InstallOutcome::AlreadyInstalled {
                version: target.version.clone(),
            });
        }

        let staging_root = self.paths.staging_path();
        let staging = std::fs::create_dir_all(&staging_root)
            .and_then(|_| {
                tempfile::Builder::new()
                    .prefix(&format!("{}-", name))
                    .tempdir_in(&staging_root)
            })
            .map_err(|e| PluginError::from(e).in_phase(InstallPhase::Downloading, name))?;
        let download_dir = staging.path().join("download");
        let layout_dir = staging.path().join("layout");

        log::debug!("Downloading {} into {}", target.uri, download_dir.display());
        let verifier: Box<dyn Verifier> = match target.checksum() {
            Some(sha256) => Box::new(Sha256Verifier::new(sha256)),
            None => Box::new(InsecureVerifier),
        };
        Downloader::new(self.fetcher.clone(), verifier)
            .with_cancellation(self.cancel.clone())
            .get(&target.uri, &download_dir)
            .await
            .map_err(|e| {
                let phase = download_phase(&e);
                e.in_phase(phase, name)
            })?;

        log::debug!("Laying out {} in {}", name, layout_dir.display());
        self.assemble_layout(plugin, target, &download_dir, &layout_dir)
            .map_err(|e| e.in_phase(InstallPhase::Planning, name))?;

        let bin = validate_entry_point(&layout_dir, &target.bin)
            .map_err(|e| e.in_phase(InstallPhase::Staging, name))?;

        self.cancel
            .check()
            .map_err(|e| e.in_phase(InstallPhase::Staging, name))?;

        self.commit(plugin, target, options, &layout_dir, &bin, staging.path())
            .map_err(|e| e.in_phase(InstallPhase::Committing, name))?;

        log::info!("Installed plugin {} at version {}", name, target.version);
        Ok(InstallOutcome::Installed {
            version: target.version.clone(),
        })
    }

    /// Apply every file operation, in order, then write the marker.
    fn assemble_layout(
        &self,
        plugin: &Plugin,
        target: &DownloadTarget,
        download_dir: &Path,
        layout_dir: &Path,
    ) -> Result<()> {
        std::fs::create_dir_all(layout_dir)?;

        for op in &target.file_operations {
            let moves = plan_moves(download_dir, layout_dir, op)?;
            apply_moves(&moves)?;
        }

        let marker = layout_dir.join(DESCRIPTOR_FILE_NAME);
        if marker.symlink_metadata().is_err() {
            std::fs::write(&marker, serde_yaml::to_string(plugin)?)?;
        }
        Ok(())
    }

    fn commit(
        &self,
        plugin: &Plugin,
        target: &DownloadTarget,
        options: &InstallOptions,
        layout_dir: &Path,
        bin: &Path,
        staging: &Path,
    ) -> Result<()> {
        let name = plugin.name();
        let plugin_dir = self.paths.plugin_install_path(name);
        let version_dir = self.paths.plugin_version_install_path(name, &target.version);
        std::fs::create_dir_all(&plugin_dir)?;

        // Same-version reinstall: park the old tree in staging until the link is swapped
        let previous = staging.join("previous");
        let set_aside = match std::fs::rename(&version_dir, &previous) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        let restore = || {
            if set_aside {
                if let Err(e) = std::fs::rename(&previous, &version_dir) {
                    log::warn!("Failed to restore {}: {}", version_dir.display(), e);
                }
            }
        };

        if let Err(e) = std::fs::rename(layout_dir, &version_dir) {
            restore();
            return Err(e.into());
        }
        log::debug!("Moved layout to {}", version_dir.display());

        let entry_point = std::path::absolute(version_dir.join(bin))?;
        if let Err(e) = self.linker().link(name, &entry_point) {
            if let Err(cleanup) = std::fs::remove_dir_all(&version_dir) {
                log::warn!("Failed to remove {}: {}", version_dir.display(), cleanup);
            }
            restore();
            return Err(e);
        }

        let receipts_dir = self.paths.install_receipts_path();
        std::fs::create_dir_all(&receipts_dir)?;
        receipt::store(
            &receipt::from_plugin(&options.source_index, plugin),
            &self.paths.plugin_install_receipt_path(name),
        )?;

        remove_other_versions(&plugin_dir, &target.version);
        Ok(())
    }
}

fn download_phase(err: &PluginError) -> InstallPhase {
    match err {
        PluginError::UnsupportedArchiveType { .. }
        | PluginError::ExtractionPathEscape { .. }
        | PluginError::ExtractionFailed(_) => InstallPhase::Extracting,
        _ => InstallPhase::Downloading,
    }
}

/// Check that `bin` names a file inside the layout; returns it normalized.
fn validate_entry_point(layout_dir: &Path, bin: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| PluginError::InvalidEntryPoint {
        bin: bin.to_string(),
        reason: reason.to_string(),
    };

    let relative = normalize_path(Path::new(bin));
    let path = join_within(layout_dir, &relative)
        .filter(|_| relative.components().next().is_some())
        .ok_or_else(|| invalid("path is outside the plugin directory"))?;
    if !path.is_file() {
        return Err(invalid("file not found in the plugin archive"));
    }
    Ok(relative)
}

fn remove_if_exists(path: &Path, remove: fn(&Path) -> io::Result<()>) -> Result<()> {
    match remove(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Best effort: a leftover directory only costs disk space.
fn remove_other_versions(plugin_dir: &Path, keep: &str) {
    let entries = match std::fs::read_dir(plugin_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Failed to list {}: {}", plugin_dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        if entry.file_name() == keep {
            continue;
        }
        let path = entry.path();
        log::debug!("Removing old version {}", path.display());
        if let Err(e) = std::fs::remove_dir_all(&path) {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

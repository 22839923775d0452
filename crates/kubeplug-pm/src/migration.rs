//! Migration from the single-index layout.
//!
//! Older installs kept the index checkout directly in `<base>/index` and did
//! not write receipts. The current layout keeps one checkout per index under
//! `<base>/index/<name>` and tracks every install with a receipt.

use std::io;

use crate::config::Paths;
use crate::index::{self, is_safe_plugin_name, DEFAULT_INDEX_NAME};
use crate::installer::{InstallOptions, Installer};
use crate::Result;

/// What happened to each plugin considered for reinstallation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub reinstalled: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Whether `paths` already uses the multi-index layout.
pub fn is_migrated(paths: &Paths) -> bool {
    paths.index_path(DEFAULT_INDEX_NAME).is_dir()
}

/// Move the legacy index into place and reinstall plugins lacking a receipt.
///
/// Per-plugin failures are logged and recorded in the report; only errors
/// moving the index abort the migration.
pub async fn migrate(paths: &Paths, installer: &Installer) -> Result<MigrationReport> {
    if is_migrated(paths) {
        log::info!("Already migrated");
        return Ok(MigrationReport::default());
    }

    move_legacy_index(paths)?;

    let mut report = MigrationReport::default();
    let candidates = plugins_without_receipt(paths, installer)?;
    log::info!("Going to re-install the following plugins: {:?}", candidates);

    let plugins_dir = paths.index_plugins_path(DEFAULT_INDEX_NAME);
    for name in candidates {
        if !index::is_available(&plugins_dir, &name) {
            log::info!("Skipping plugin {}, because it is missing in the index", name);
            report.skipped.push(name);
            continue;
        }
        if !is_installation_consistent(paths, installer, &name) {
            log::info!("Skipping inconsistent plugin installation {}", name);
            report.skipped.push(name);
            continue;
        }

        match reinstall(installer, &plugins_dir, &name).await {
            Ok(()) => report.reinstalled.push(name),
            Err(e) => {
                log::warn!("Reinstalling {} failed: {}", name, e);
                report.failed.push(name);
            }
        }
    }

    Ok(report)
}

fn move_legacy_index(paths: &Paths) -> Result<()> {
    let index_base = paths.index_base();
    let target = paths.index_path(DEFAULT_INDEX_NAME);

    if !index_base.is_dir() {
        log::debug!("No legacy index found, creating {}", target.display());
        std::fs::create_dir_all(&target)?;
        return Ok(());
    }

    let parked = paths.base_path().join("index.migrating");
    log::info!("Moving index {} to {}", index_base.display(), target.display());
    std::fs::rename(&index_base, &parked)?;
    if let Err(e) = std::fs::create_dir(&index_base).and_then(|_| std::fs::rename(&parked, &target)) {
        let _ = std::fs::remove_dir(&index_base);
        if let Err(restore) = std::fs::rename(&parked, &index_base) {
            log::warn!("Failed to restore {}: {}", index_base.display(), restore);
        }
        return Err(e.into());
    }
    Ok(())
}

fn plugins_without_receipt(paths: &Paths, installer: &Installer) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(paths.install_path()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut plugins = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type()?.is_dir() || !is_safe_plugin_name(&name) || name == installer.self_name() {
            continue;
        }
        if paths.plugin_install_receipt_path(&name).exists() {
            continue;
        }
        plugins.push(name);
    }

    plugins.sort();
    Ok(plugins)
}

fn is_installation_consistent(paths: &Paths, installer: &Installer, name: &str) -> bool {
    let bin = crate::installer::plugin_name_to_bin(name, installer.target().is_windows());
    std::fs::read_link(paths.bin_path().join(bin)).is_ok()
}

async fn reinstall(installer: &Installer, plugins_dir: &std::path::Path, name: &str) -> Result<()> {
    let plugin = index::load_plugin(plugins_dir, name)?;

    log::info!("Uninstalling {}", name);
    installer.uninstall(name)?;

    log::info!("Re-installing {}", name);
    let options = InstallOptions {
        force_reinstall: true,
        ..InstallOptions::default()
    };
    installer.install(&plugin, &options).await?;
    Ok(())
}

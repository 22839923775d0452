//! Installed-plugin registry, recomputed from the store on every call.
//!
//! A plugin counts as installed when `<store>/<plugin>/<version>/` contains
//! the descriptor marker somewhere below it.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

use crate::index::{ensure_safe_plugin_name, is_safe_plugin_name};
use crate::Result;

/// File marking a version directory as a complete install
pub const DESCRIPTOR_FILE_NAME: &str = "plugin.yaml";

/// Check a directory tree for the descriptor marker.
pub fn contains_plugin_descriptor(path: &Path) -> Result<bool> {
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"))
        })?;
        if entry.file_type().is_file() && entry.file_name() == DESCRIPTOR_FILE_NAME {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Find the installed version of `plugin`, if any.
pub fn find_installed_version(install_path: &Path, plugin: &str) -> Result<Option<String>> {
    ensure_safe_plugin_name(plugin)?;

    let plugin_dir = install_path.join(plugin);
    log::trace!("Searching for installed versions of {} in {}", plugin, plugin_dir.display());

    let entries = match std::fs::read_dir(&plugin_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut versions: Vec<_> = entries.collect::<io::Result<Vec<_>>>()?;
    versions.sort_by_key(|entry| entry.file_name());

    for entry in versions {
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if contains_plugin_descriptor(&entry.path())? {
            return Ok(Some(entry.file_name().to_string_lossy().into_owned()));
        }
    }

    Ok(None)
}

/// Map of installed plugin name to version.
pub fn list_installed(install_path: &Path) -> Result<BTreeMap<String, String>> {
    let mut installed = BTreeMap::new();

    let entries = match std::fs::read_dir(install_path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(installed),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type()?.is_dir() || !is_safe_plugin_name(&name) {
            continue;
        }
        if let Some(version) = find_installed_version(install_path, &name)? {
            installed.insert(name, version);
        }
    }

    Ok(installed)
}

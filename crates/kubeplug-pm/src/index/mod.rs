//! Plugin manifests and the local index reader.
//!
//! Index checkouts are managed elsewhere; this module only reads
//! `<index>/plugins/<name>.yaml` files that are already on disk.

mod selector;
mod types;

pub use selector::{LabelSelector, LabelSelectorRequirement, Labels, Selector, SelectorOperator};
pub use types::{
    FileOperation, ObjectMeta, Platform, Plugin, PluginSpec, Receipt, ReceiptStatus, SourceIndex,
    CURRENT_API_VERSION, PLUGIN_KIND,
};

use std::path::Path;

use crate::{PluginError, Result};

/// Name of the index used when a plugin is referenced without one.
pub const DEFAULT_INDEX_NAME: &str = "default";

pub const MANIFEST_EXTENSION: &str = "yaml";

/// Check that a plugin name is safe to use as a path segment.
pub fn is_safe_plugin_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.starts_with('.')
        && !name.contains("..")
}

pub(crate) fn ensure_safe_plugin_name(name: &str) -> Result<()> {
    if is_safe_plugin_name(name) {
        Ok(())
    } else {
        Err(PluginError::UnsafePluginName { name: name.to_string() })
    }
}

/// Split a user supplied `index/name` reference.
///
/// A bare name refers to the default index.
pub fn parse_canonical_name(reference: &str) -> (&str, &str) {
    match reference.split_once('/') {
        Some((index, name)) => (index, name),
        None => (DEFAULT_INDEX_NAME, reference),
    }
}

/// Read and parse a manifest file.
pub fn load_plugin_file(path: &Path) -> Result<Plugin> {
    let content = std::fs::read_to_string(path)?;
    let plugin: Plugin = serde_yaml::from_str(&content)?;
    ensure_safe_plugin_name(plugin.name())?;
    Ok(plugin)
}

/// Load the manifest for `name` from an index plugins directory.
pub fn load_plugin(plugins_dir: &Path, name: &str) -> Result<Plugin> {
    ensure_safe_plugin_name(name)?;
    let path = plugins_dir.join(format!("{}.{}", name, MANIFEST_EXTENSION));
    log::debug!("Reading plugin manifest {}", path.display());
    load_plugin_file(&path)
}

/// Check whether the index has a manifest for `name`.
pub fn is_available(plugins_dir: &Path, name: &str) -> bool {
    is_safe_plugin_name(name)
        && plugins_dir
            .join(format!("{}.{}", name, MANIFEST_EXTENSION))
            .symlink_metadata()
            .is_ok()
}

/// Load every manifest in an index plugins directory, sorted by name.
///
/// Unparseable manifests are logged and skipped.
pub fn list_plugins(plugins_dir: &Path) -> Result<Vec<Plugin>> {
    let mut plugins = Vec::new();

    for entry in std::fs::read_dir(plugins_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXTENSION) {
            continue;
        }
        match load_plugin_file(&path) {
            Ok(plugin) => plugins.push(plugin),
            Err(e) => log::warn!("Skipping manifest {}: {}", path.display(), e),
        }
    }

    plugins.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(plugins)
}

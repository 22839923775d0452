use std::path::{Path, PathBuf};

use super::source::ConfigLoader;

/// On-disk layout below the base directory.
///
/// ```text
/// <base>/bin/kubectl-<plugin>          symlinks into store/
/// <base>/index/<index>/plugins/*.yaml  manifests
/// <base>/receipts/<plugin>.yaml        install receipts
/// <base>/store/<plugin>/<version>/     unpacked plugins
/// <base>/tmp/                          staging directories
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    base: PathBuf,
}

impl Paths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Layout rooted at `KUBEPLUG_ROOT` or `~/.kubeplug`.
    pub fn from_env() -> Self {
        Self::new(ConfigLoader::new(true).get_base_dir())
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn bin_path(&self) -> PathBuf {
        self.base.join("bin")
    }

    /// Directory holding all index checkouts
    pub fn index_base(&self) -> PathBuf {
        self.base.join("index")
    }

    pub fn index_path(&self, name: &str) -> PathBuf {
        self.index_base().join(name)
    }

    pub fn index_plugins_path(&self, name: &str) -> PathBuf {
        self.index_path(name).join("plugins")
    }

    pub fn install_receipts_path(&self) -> PathBuf {
        self.base.join("receipts")
    }

    pub fn plugin_install_receipt_path(&self, plugin: &str) -> PathBuf {
        self.install_receipts_path().join(format!("{}.yaml", plugin))
    }

    /// Directory holding one subdirectory per installed plugin
    pub fn install_path(&self) -> PathBuf {
        self.base.join("store")
    }

    pub fn plugin_install_path(&self, plugin: &str) -> PathBuf {
        self.install_path().join(plugin)
    }

    pub fn plugin_version_install_path(&self, plugin: &str, version: &str) -> PathBuf {
        self.plugin_install_path(plugin).join(version)
    }

    /// Lock file guarding installs of one plugin
    pub fn plugin_lock_path(&self, plugin: &str) -> PathBuf {
        self.install_path().join(format!(".{}.lock", plugin))
    }

    /// Scratch space on the same filesystem as the store
    pub fn staging_path(&self) -> PathBuf {
        self.base.join("tmp")
    }
}

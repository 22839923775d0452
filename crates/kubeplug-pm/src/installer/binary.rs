//! Binary links - points `kubectl-<plugin>` in the bin directory at the
//! installed entry point.

use std::io;
use std::path::{Path, PathBuf};

use crate::{PluginError, Result};

/// Name of the link in the bin directory for a plugin.
///
/// Dashes become underscores so kubectl maps `kubectl foo-bar` onto the
/// plugin `foo-bar`.
pub fn plugin_name_to_bin(name: &str, is_windows: bool) -> String {
    let mut bin = format!("kubectl-{}", name.replace('-', "_"));
    if is_windows {
        bin.push_str(".exe");
    }
    bin
}

/// Creates and removes plugin links in the bin directory
#[derive(Debug, Clone)]
pub struct BinaryLinker {
    bin_dir: PathBuf,
    is_windows: bool,
}

impl BinaryLinker {
    pub fn new(bin_dir: impl Into<PathBuf>, is_windows: bool) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            is_windows,
        }
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn link_path(&self, plugin: &str) -> PathBuf {
        self.bin_dir.join(plugin_name_to_bin(plugin, self.is_windows))
    }

    /// Whether the plugin's link exists and is a symlink.
    pub fn is_linked(&self, plugin: &str) -> bool {
        std::fs::read_link(self.link_path(plugin)).is_ok()
    }

    /// Point the plugin's link at `source`, replacing any previous link.
    ///
    /// The new link is created under a temporary name and renamed over the
    /// old one. A regular file or directory at the link path is never
    /// replaced.
    pub fn link(&self, plugin: &str, source: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.bin_dir)?;
        let link = self.link_path(plugin);
        ensure_symlink_or_absent(&link)?;

        make_executable(source)?;

        let tmp = self
            .bin_dir
            .join(format!(".{}.tmp-{}", plugin_name_to_bin(plugin, self.is_windows), std::process::id()));
        match std::fs::remove_file(&tmp) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        create_symlink(source, &tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &link) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::debug!("Linked {} -> {}", link.display(), source.display());
        Ok(link)
    }

    /// Remove the plugin's link. An absent link is not an error.
    pub fn unlink(&self, plugin: &str) -> Result<()> {
        remove_link(&self.link_path(plugin))
    }
}

fn ensure_symlink_or_absent(path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Ok(()),
        Ok(_) => Err(PluginError::NotASymlink {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove a symlink if it exists, refusing to delete anything else.
pub fn remove_link(path: &Path) -> Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("No file found at {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if !meta.file_type().is_symlink() {
        return Err(PluginError::NotASymlink {
            path: path.to_path_buf(),
        });
    }

    std::fs::remove_file(path)?;
    log::debug!("Removed symlink from {}", path.display());
    Ok(())
}

#[cfg(unix)]
fn create_symlink(source: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn create_symlink(source: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, link)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

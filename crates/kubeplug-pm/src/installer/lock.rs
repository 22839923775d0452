use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::{PluginError, Result};

/// Exclusive lock held while a plugin is installed or removed.
///
/// Backed by a file created with `create_new`; the file is removed when the
/// guard is dropped. A crashed process leaves the file behind and it has to
/// be deleted by hand.
#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(PluginError::Locked {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;

        log::trace!("Acquired lock {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store/.foo.lock");

        let lock = InstallLock::acquire(&path).unwrap();
        assert!(matches!(InstallLock::acquire(&path), Err(PluginError::Locked { .. })));

        drop(lock);
        assert!(!path.exists());
        assert!(InstallLock::acquire(&path).is_ok());
    }
}

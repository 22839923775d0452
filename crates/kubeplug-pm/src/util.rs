//! Utility functions for the plugin manager.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{PluginError, Result};

/// Shared cancellation flag.
///
/// Cloning yields a handle to the same flag. Long running steps (HTTP body
/// streaming, archive extraction) call [`Cancellation::check`] between units
/// of work.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` once [`Cancellation::cancel`] was called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PluginError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Lexically normalize a path: drops `.` components and resolves `..`
/// against preceding normal components. Leading `..` components that can't
/// be resolved are kept. Does not touch the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    out.iter().collect()
}

/// Check whether `path` stays inside `base` after lexical normalization.
pub fn is_within(base: &Path, path: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(base))
}

/// Join an untrusted relative path onto `base`, refusing absolute paths and
/// anything that normalizes to a location outside `base`.
pub fn join_within(base: &Path, relative: &Path) -> Option<PathBuf> {
    if relative.has_root()
        || relative
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return None;
    }

    let joined = normalize_path(&base.join(relative));
    if joined.starts_with(normalize_path(base)) {
        Some(joined)
    } else {
        None
    }
}

//! File-operation planning: maps archive contents to the install layout.

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::index::FileOperation;
use crate::util::{join_within, normalize_path};
use crate::{PluginError, Result};

/// One concrete file relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// The operation used when a platform declares no files.
pub fn default_file_operations() -> Vec<FileOperation> {
    vec![FileOperation::new("*", ".")]
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn escape(path: PathBuf, base: &Path) -> PluginError {
    PluginError::MovePathEscape {
        path,
        base: base.to_path_buf(),
    }
}

/// Destinations are relative to the layout; escapes are caught when joining.
fn validate_destination(to: &str) -> Result<()> {
    if Path::new(to).has_root() {
        return Err(PluginError::InvalidFileOperation(format!(
            "destination {:?} must be a relative path",
            to
        )));
    }
    Ok(())
}

/// Compute the moves for `op` from the unpacked tree in `from_dir` into `to_dir`.
///
/// Only lists and globs the source tree; nothing is moved.
pub fn plan_moves(from_dir: &Path, to_dir: &Path, op: &FileOperation) -> Result<Vec<Move>> {
    validate_destination(&op.to)?;

    let from_dir = normalize_path(from_dir);
    let to_dir = normalize_path(to_dir);

    if is_glob(&op.from) {
        plan_glob_moves(&from_dir, &to_dir, op)
    } else {
        plan_direct_move(&from_dir, &to_dir, op).map(|m| vec![m])
    }
}

fn plan_direct_move(from_dir: &Path, to_dir: &Path, op: &FileOperation) -> Result<Move> {
    let from = join_within(from_dir, Path::new(&op.from))
        .ok_or_else(|| escape(from_dir.join(&op.from), from_dir))?;

    let file_name = match from.file_name() {
        Some(name) if from != from_dir => name.to_os_string(),
        _ => {
            return Err(PluginError::InvalidFileOperation(format!(
                "source {:?} does not name a file inside the archive",
                op.from
            )))
        }
    };

    if from.symlink_metadata().is_err() {
        return Err(PluginError::SourceNotFound { path: from });
    }

    let target = if op.to.is_empty() { "." } else { op.to.as_str() };
    let mut to = join_within(to_dir, Path::new(target)).ok_or_else(|| escape(to_dir.join(target), to_dir))?;
    if to == to_dir || to.is_dir() {
        to.push(file_name);
    }

    log::debug!("Planned move {} -> {}", from.display(), to.display());
    Ok(Move { from, to })
}

fn plan_glob_moves(from_dir: &Path, to_dir: &Path, op: &FileOperation) -> Result<Vec<Move>> {
    let relative = normalize_path(Path::new(&op.from));
    if relative.has_root() || relative.components().any(|c| matches!(c, Component::ParentDir | Component::Prefix(_))) {
        return Err(escape(from_dir.join(&op.from), from_dir));
    }

    // Matches keep their path relative to the last directory before the
    // first wildcard component.
    let mut glob_base = from_dir.to_path_buf();
    for component in relative.components() {
        let part = component.as_os_str().to_string_lossy();
        if is_glob(&part) {
            break;
        }
        glob_base.push(component);
    }

    let pattern = format!(
        "{}/{}",
        Pattern::escape(&from_dir.to_string_lossy()),
        relative.to_string_lossy()
    );
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut matches = Vec::new();
    let paths = glob::glob_with(&pattern, options)
        .map_err(|e| PluginError::InvalidFileOperation(format!("invalid glob {:?}: {}", op.from, e)))?;
    for path in paths {
        matches.push(path.map_err(|e| PluginError::Io(e.into()))?);
    }
    matches.sort();

    if matches.is_empty() {
        return Err(PluginError::GlobNoMatch {
            pattern: op.from.clone(),
        });
    }

    let target_dir = if op.to.is_empty() { "." } else { op.to.as_str() };
    let mut moves = Vec::with_capacity(matches.len());

    for from in matches {
        let from = normalize_path(&from);
        let relative = from
            .strip_prefix(&glob_base)
            .map_err(|_| escape(from.clone(), from_dir))?
            .to_path_buf();

        let to = join_within(to_dir, &Path::new(target_dir).join(&relative))
            .ok_or_else(|| escape(to_dir.join(target_dir).join(&relative), to_dir))?;
        if to == to_dir {
            return Err(escape(to, to_dir));
        }

        log::debug!("Planned move {} -> {}", from.display(), to.display());
        moves.push(Move { from, to });
    }

    Ok(moves)
}

/// Apply moves in order. The first failure aborts the remaining moves;
/// moves already applied stay in place.
pub fn apply_moves(moves: &[Move]) -> Result<()> {
    for m in moves {
        let failed = |source| PluginError::MoveFailed {
            from: m.from.clone(),
            to: m.to.clone(),
            source,
        };

        if let Some(parent) = m.to.parent() {
            std::fs::create_dir_all(parent).map_err(failed)?;
        }
        std::fs::rename(&m.from, &m.to).map_err(failed)?;
        log::trace!("Moved {} -> {}", m.from.display(), m.to.display());
    }
    Ok(())
}

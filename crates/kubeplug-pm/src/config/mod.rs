//! Configuration: directory layout and target platform.
//!
//! # Configuration Sources (in priority order, highest to lowest)
//!
//! 1. Environment variables (`KUBEPLUG_ROOT`, `KUBEPLUG_OS`, `KUBEPLUG_ARCH`)
//! 2. Built-in defaults (`~/.kubeplug`, the running process' OS/arch)
//!
//! # Example
//!
//! ```rust,no_run
//! use kubeplug_pm::config::{ConfigLoader, Paths, TargetPlatform};
//!
//! let paths = Paths::from_env();
//! let target = TargetPlatform::from_loader(&ConfigLoader::new(true));
//!
//! println!("Installing into {:?} for {}", paths.install_path(), target);
//! ```

mod paths;
mod source;
mod target;

pub use paths::Paths;
pub use source::{ConfigLoader, ARCH_ENV, OS_ENV, ROOT_ENV};
pub use target::TargetPlatform;

//! Shared setup for commands: layout, target platform, installer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use indicatif::{ProgressBar, ProgressStyle};

use kubeplug_pm::index::{self, parse_canonical_name};
use kubeplug_pm::{
    is_migrated, Cancellation, ConfigLoader, Fetcher, HttpFetcher, Installer, Paths, Plugin, TargetPlatform,
};

pub struct Context {
    pub paths: Paths,
    pub target: TargetPlatform,
}

impl Context {
    pub fn from_env() -> Self {
        let loader = ConfigLoader::new(true);
        let context = Self {
            paths: Paths::new(loader.get_base_dir()),
            target: TargetPlatform::from_loader(&loader),
        };
        log::debug!(
            "Using base directory {} for target {}",
            context.paths.base_path().display(),
            context.target
        );
        context
    }

    /// Installer downloading over HTTP.
    pub fn installer(&self) -> Result<Installer> {
        let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
        Ok(self.installer_with(Arc::new(fetcher)))
    }

    pub fn installer_with(&self, fetcher: Arc<dyn Fetcher>) -> Installer {
        Installer::new(self.paths.clone(), fetcher)
            .with_target(self.target.clone())
            .with_cancellation(cancel_on_ctrl_c())
    }

    /// Refuse to modify an install still using the single-index layout.
    pub fn ensure_migrated(&self) -> Result<()> {
        if !is_migrated(&self.paths) {
            bail!("The index layout is outdated, please run `kubeplug migrate` first");
        }
        Ok(())
    }

    /// Load `[index/]name` from the local index checkouts.
    pub fn load_plugin(&self, reference: &str) -> Result<(String, Plugin)> {
        let (index_name, name) = parse_canonical_name(reference);
        let plugins_dir = self.paths.index_plugins_path(index_name);
        if !index::is_available(&plugins_dir, name) {
            bail!("Plugin {} is not available in index {}", name, index_name);
        }
        let plugin = index::load_plugin(&plugins_dir, name)
            .with_context(|| format!("Failed to load manifest for {}", reference))?;
        Ok((index_name.to_string(), plugin))
    }
}

/// Load a manifest from an arbitrary file.
pub fn load_manifest_file(path: &Path) -> Result<Plugin> {
    index::load_plugin_file(path).with_context(|| format!("Failed to read manifest {}", path.display()))
}

/// Flag that is raised on Ctrl-C. Must be called from within the runtime.
fn cancel_on_ctrl_c() -> Cancellation {
    let cancel = Cancellation::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            handle.cancel();
        }
    });
    cancel
}

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.into());
    spinner
}

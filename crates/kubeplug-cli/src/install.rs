//! Install command - install plugins from an index or a manifest file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use console::style;

use kubeplug_pm::index::DEFAULT_INDEX_NAME;
use kubeplug_pm::{FileFetcher, InstallOptions, InstallOutcome, Plugin};

use crate::context::{load_manifest_file, spinner, Context};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Plugins to install, as NAME or INDEX/NAME
    #[arg(value_name = "PLUGINS", conflicts_with = "manifest")]
    pub plugins: Vec<String>,

    /// Install from a local manifest file instead of an index
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Use a local archive instead of downloading (requires --manifest)
    #[arg(long, value_name = "FILE", requires = "manifest")]
    pub archive: Option<PathBuf>,

    /// Install the unreleased HEAD version
    #[arg(long)]
    pub head: bool,

    /// Reinstall even if the same version is already installed
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: InstallArgs) -> Result<i32> {
    let context = Context::from_env();

    let mut plugins: Vec<(String, Plugin)> = Vec::new();
    if let Some(manifest) = &args.manifest {
        plugins.push((DEFAULT_INDEX_NAME.to_string(), load_manifest_file(manifest)?));
    } else {
        if args.plugins.is_empty() {
            bail!("Specify plugins to install or pass --manifest");
        }
        context.ensure_migrated()?;
        for reference in &args.plugins {
            plugins.push(context.load_plugin(reference)?);
        }
    }

    let installer = match &args.archive {
        Some(archive) => context.installer_with(Arc::new(FileFetcher::new(archive))),
        None => context.installer()?,
    };

    let mut failed = 0;
    for (index_name, plugin) in &plugins {
        let options = InstallOptions {
            force_head: args.head,
            force_reinstall: args.force,
            source_index: index_name.clone(),
        };

        let progress = spinner(format!("Installing plugin {}", plugin.name()));
        let result = installer.install(plugin, &options).await;
        progress.finish_and_clear();

        match result {
            Ok(InstallOutcome::Installed { version }) => {
                println!(
                    "  {} {} ({})",
                    style("+").green(),
                    style(plugin.name()).white().bold(),
                    short_version(&version)
                );
                if !plugin.spec.caveats.is_empty() {
                    println!("{}", style(&plugin.spec.caveats).yellow());
                }
            }
            Ok(InstallOutcome::AlreadyInstalled { version }) => {
                println!(
                    "  {} {} is already installed ({})",
                    style("!").yellow(),
                    style(plugin.name()).white(),
                    short_version(&version)
                );
            }
            Err(e) => {
                eprintln!("{} {}", style("Error:").red().bold(), e);
                failed += 1;
            }
        }
    }

    Ok(if failed > 0 { 1 } else { 0 })
}

/// Checksum versions are long; show a prefix.
pub fn short_version(version: &str) -> &str {
    version.get(..12).unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_version() {
        assert_eq!(short_version("HEAD"), "HEAD");
        assert_eq!(short_version(&"a".repeat(64)), "aaaaaaaaaaaa");
    }
}

//! Upgrade command - move installed plugins to the version in their index.

use anyhow::{Context as _, Result};
use clap::Args;
use console::style;

use kubeplug_pm::index::{self, parse_canonical_name};
use kubeplug_pm::{receipt, InstallOptions, UpgradeOutcome};

use crate::context::{spinner, Context};
use crate::install::short_version;

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Plugins to upgrade; all installed plugins when omitted
    #[arg(value_name = "PLUGINS")]
    pub plugins: Vec<String>,
}

pub async fn execute(args: UpgradeArgs) -> Result<i32> {
    let context = Context::from_env();
    context.ensure_migrated()?;
    let installer = context.installer()?;

    let upgrade_all = args.plugins.is_empty();
    let names: Vec<String> = if upgrade_all {
        installer.list_installed()?.into_keys().collect()
    } else {
        args.plugins
            .iter()
            .map(|reference| parse_canonical_name(reference).1.to_string())
            .collect()
    };

    let mut failed = 0;
    for name in &names {
        let receipt_path = context.paths.plugin_install_receipt_path(name);
        let source_index = match receipt::load(&receipt_path) {
            Ok(receipt) => receipt.status.source.name,
            Err(e) => {
                eprintln!("{} {}: {}", style("Error:").red().bold(), name, e);
                failed += 1;
                continue;
            }
        };

        let plugins_dir = context.paths.index_plugins_path(&source_index);
        if !index::is_available(&plugins_dir, name) {
            if upgrade_all {
                log::warn!("Skipping plugin {}, it is not in index {}", name, source_index);
                continue;
            }
            eprintln!(
                "{} Plugin {} is not available in index {}",
                style("Error:").red().bold(),
                name,
                source_index
            );
            failed += 1;
            continue;
        }
        let plugin = index::load_plugin(&plugins_dir, name)
            .with_context(|| format!("Failed to load manifest for {}", name))?;

        let options = InstallOptions {
            source_index,
            ..Default::default()
        };
        let progress = spinner(format!("Upgrading plugin {}", name));
        let result = installer.upgrade(&plugin, &options).await;
        progress.finish_and_clear();

        match result {
            Ok(UpgradeOutcome::Upgraded { from, to }) => println!(
                "  {} {} ({} -> {})",
                style("^").green(),
                style(name).white().bold(),
                short_version(&from),
                short_version(&to)
            ),
            Ok(UpgradeOutcome::AlreadyUpgraded { .. }) => {
                println!("  {} {} is up to date", style("=").cyan(), style(name).white())
            }
            Err(e) => {
                eprintln!("{} {}", style("Error:").red().bold(), e);
                failed += 1;
            }
        }
    }

    Ok(if failed > 0 { 1 } else { 0 })
}

//! Uninstall command - remove installed plugins.

use anyhow::Result;
use clap::Args;
use console::style;

use kubeplug_pm::PluginError;

use crate::context::Context;

#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Plugins to remove
    #[arg(value_name = "PLUGINS", required = true)]
    pub plugins: Vec<String>,
}

pub async fn execute(args: UninstallArgs) -> Result<i32> {
    let context = Context::from_env();
    let installer = context.installer()?;

    let mut failed = 0;
    for name in &args.plugins {
        match installer.uninstall(name) {
            Ok(()) => println!("  {} {}", style("-").red(), style(name).white().bold()),
            Err(e) if matches!(e.root(), PluginError::NotInstalled { .. }) => {
                println!("  {} {} is not installed", style("!").yellow(), style(name).white());
                failed += 1;
            }
            Err(e) => {
                eprintln!("{} {}", style("Error:").red().bold(), e);
                failed += 1;
            }
        }
    }

    Ok(if failed > 0 { 1 } else { 0 })
}

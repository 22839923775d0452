//! List command - show installed plugins.

use anyhow::Result;
use clap::Args;
use console::style;

use kubeplug_pm::installer::list_installed;
use kubeplug_pm::{receipt, Paths};

use crate::context::Context;
use crate::install::short_version;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print plugin names only
    #[arg(long)]
    pub names_only: bool,
}

pub async fn execute(args: ListArgs) -> Result<i32> {
    let context = Context::from_env();
    let rows = installed_rows(&context.paths)?;

    if args.names_only {
        for (name, _) in &rows {
            println!("{}", name);
        }
        return Ok(0);
    }

    if rows.is_empty() {
        println!("{} No plugins installed", style("Info:").cyan());
        return Ok(0);
    }

    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let header = format!("{:<width$}  VERSION", "PLUGIN", width = width);
    println!("{}", style(header).bold());
    for (name, version) in rows {
        println!("{:<width$}  {}", name, short_version(&version), width = width);
    }
    Ok(0)
}

/// Display name and version of every installed plugin, read from the store.
fn installed_rows(paths: &Paths) -> Result<Vec<(String, String)>> {
    let installed = list_installed(&paths.install_path())?;
    let receipts = receipt::load_all(&paths.install_receipts_path())?;

    let rows = installed
        .into_iter()
        .map(|(name, version)| {
            let display_name = receipts
                .iter()
                .find(|r| r.plugin.name() == name)
                .map(receipt::canonical_name)
                .unwrap_or(name);
            (display_name, version)
        })
        .collect();
    Ok(rows)
}

//! Migrate command - move a single-index install to the current layout.

use anyhow::{Context as _, Result};
use clap::Args;
use console::style;

use kubeplug_pm::{is_migrated, migrate};

use crate::context::Context;

#[derive(Args, Debug)]
pub struct MigrateArgs {}

pub async fn execute(_args: MigrateArgs) -> Result<i32> {
    let context = Context::from_env();
    if is_migrated(&context.paths) {
        println!("{} Already migrated", style("Info:").cyan());
        return Ok(0);
    }

    let installer = context.installer()?;
    let report = migrate(&context.paths, &installer)
        .await
        .context("Failed to migrate the index layout")?;

    for name in &report.reinstalled {
        println!("  {} {}", style("+").green(), style(name).white().bold());
    }
    for name in &report.skipped {
        println!("  {} {} skipped", style("!").yellow(), style(name).white());
    }
    for name in &report.failed {
        println!("  {} {} failed to reinstall", style("x").red(), style(name).white());
    }

    Ok(if report.failed.is_empty() { 0 } else { 1 })
}

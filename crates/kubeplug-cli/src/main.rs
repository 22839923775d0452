mod context;
mod install;
mod list;
mod migrate;
mod uninstall;
mod upgrade;

use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "kubeplug")]
#[command(about = "Plugin manager for kubectl", version)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install plugins
    Install(install::InstallArgs),

    /// Remove installed plugins
    Uninstall(uninstall::UninstallArgs),

    /// Upgrade installed plugins to the version in their index
    Upgrade(upgrade::UpgradeArgs),

    /// List installed plugins
    List(list::ListArgs),

    /// Move an install from the single-index layout to the current one
    Migrate(migrate::MigrateArgs),
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logger(args.verbose);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| anyhow::anyhow!("Failed to create async runtime: {}", e))?;

    match args.command {
        Commands::Install(install_args) => rt.block_on(install::execute(install_args)),
        Commands::Uninstall(uninstall_args) => rt.block_on(uninstall::execute(uninstall_args)),
        Commands::Upgrade(upgrade_args) => rt.block_on(upgrade::execute(upgrade_args)),
        Commands::List(list_args) => rt.block_on(list::execute(list_args)),
        Commands::Migrate(migrate_args) => rt.block_on(migrate::execute(migrate_args)),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_install() {
        let args = Args::try_parse_from(["kubeplug", "-vv", "install", "ctx", "custom/ns", "--head"]).unwrap();

        assert_eq!(args.verbose, 2);
        match args.command {
            Commands::Install(install) => {
                assert_eq!(install.plugins, vec!["ctx", "custom/ns"]);
                assert!(install.head);
                assert!(!install.force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_archive_requires_manifest() {
        assert!(Args::try_parse_from(["kubeplug", "install", "--archive", "foo.zip"]).is_err());
        assert!(Args::try_parse_from(["kubeplug", "install", "--manifest", "foo.yaml", "--archive", "foo.zip"]).is_ok());
    }

    #[test]
    fn test_uninstall_requires_plugins() {
        assert!(Args::try_parse_from(["kubeplug", "uninstall"]).is_err());
    }
}

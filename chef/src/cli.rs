// chef/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;

use chef_common::error::Result;
use chef_core::Chef;
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod install;
pub mod list;
pub mod provider;
pub mod run;
pub mod uninstall;
pub mod update;
pub mod versions;

use crate::cli::config::ConfigCommand;
use crate::cli::install::Install;
use crate::cli::list::List;
use crate::cli::provider::ProviderCommand;
use crate::cli::run::Run;
use crate::cli::uninstall::Uninstall;
use crate::cli::update::{Check, Update};
use crate::cli::versions::Versions;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Recipe manifest to load (stand-alone chef binary only)
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Serve this program's recipes to another chef over stdin/stdout
    #[arg(long = "chef", global = true, hide = true)]
    pub provider_mode: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show every known recipe and what is installed
    List(List),
    /// Install or update recipes whose latest version differs
    Update(Update),
    /// Report available updates without installing anything
    Check(Check),
    /// Install a specific version of one recipe
    #[command(disable_version_flag = true)]
    Install(Install),
    /// Run an installed recipe
    Run(Run),
    /// Remove installed recipes
    Uninstall(Uninstall),
    /// List installable versions of a recipe
    Versions(Versions),
    /// Manage external providers
    #[command(subcommand)]
    Provider(ProviderCommand),
    /// Read or change stored settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Default for Command {
    fn default() -> Self {
        Self::List(List::default())
    }
}

impl Command {
    pub async fn run(&self, chef: &Chef, cancel: &CancellationToken) -> Result<()> {
        match self {
            Self::List(command) => command.run(chef, cancel).await,
            Self::Update(command) => command.run(chef, cancel).await,
            Self::Check(command) => command.run(chef, cancel).await,
            Self::Install(command) => command.run(chef, cancel).await,
            Self::Run(command) => command.run(chef, cancel).await,
            Self::Uninstall(command) => command.run(chef, cancel).await,
            Self::Versions(command) => command.run(chef, cancel).await,
            Self::Provider(command) => command.run(chef, cancel).await,
            Self::Config(command) => command.run(chef).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn argument_definitions_are_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn provider_flag_parses_without_subcommand() {
        let args = CliArgs::try_parse_from(["tools", "--chef"]).unwrap();
        assert!(args.provider_mode);
        assert!(args.command.is_none());
    }

    #[test]
    fn update_flags_and_targets() {
        let args =
            CliArgs::try_parse_from(["chef", "update", "a", "b", "--force", "--skip", "c"]).unwrap();
        let Some(Command::Update(update)) = args.command else {
            panic!("expected update");
        };
        assert_eq!(update.names, vec!["a", "b"]);
        assert!(update.force);
        assert_eq!(update.skip.as_deref(), Some("c"));
        assert!(!update.dry_run);
    }

    #[test]
    fn install_takes_a_pinned_version() {
        let args =
            CliArgs::try_parse_from(["chef", "install", "hello", "--version", "1.2.3"]).unwrap();
        let Some(Command::Install(install)) = args.command else {
            panic!("expected install");
        };
        assert_eq!(install.name, "hello");
        assert_eq!(install.version, "1.2.3");
        assert!(CliArgs::try_parse_from(["chef", "install", "hello"]).is_err());
    }

    #[test]
    fn run_passes_trailing_arguments_through() {
        let args = CliArgs::try_parse_from(["chef", "run", "hello", "--", "-x", "file"]).unwrap();
        let Some(Command::Run(run)) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.name, "hello");
        assert_eq!(run.args, vec!["-x", "file"]);
    }
}

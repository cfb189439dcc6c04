// chef/src/lib.rs
//! Command-line front end for chef.
//!
//! Embedding programs declare their recipes and hand over to [`run_cli`]:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use chef_core::Recipe;
//! # fn my_recipes() -> Vec<Arc<dyn Recipe>> { Vec::new() }
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     chef::run_cli(my_recipes()).await
//! }
//! ```
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chef_common::Config;
use chef_core::{serve_provider, Chef, Recipe};
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub mod cli;
mod logging;
pub mod manifest;
mod status;

pub use cli::{CliArgs, Command};

const DEFAULT_SCRIPT_NAME: &str = "chef";

/// Store namespace of the running program: its executable's file stem.
pub fn script_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| DEFAULT_SCRIPT_NAME.to_string())
}

/// Parses the process arguments and runs them against `recipes`, keeping a
/// store named after the running executable.
pub async fn run_cli(recipes: Vec<Arc<dyn Recipe>>) -> ExitCode {
    let args = CliArgs::parse();
    let config = match Config::load(&script_name()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    run(args, config, recipes).await
}

/// Runs already-parsed arguments. `--chef` switches to provider mode, where
/// stdin/stdout carry the protocol until the consumer closes stdin.
pub async fn run(args: CliArgs, config: Config, recipes: Vec<Arc<dyn Recipe>>) -> ExitCode {
    let _log_guard = logging::init(&config, args.verbose);
    debug!("Running '{}' with {} recipe(s)", config.script_name, recipes.len());

    let chef = match Chef::builder(config).recipes(recipes).build() {
        Ok(chef) => Arc::new(chef),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    if args.provider_mode {
        return match serve_provider(chef, tokio::io::stdin(), tokio::io::stdout()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Provider mode failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current step");
            interrupt.cancel();
        }
    });

    let command = args.command.unwrap_or_default();
    let result = command.run(&chef, &cancel).await;
    chef.cleanup().await;

    match result {
        Ok(()) => {
            debug!("Command completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("{}", "Cancelled".yellow());
            ExitCode::from(130)
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// chef/src/main.rs
use std::process::ExitCode;

use chef::manifest::load_manifest;
use chef::CliArgs;
use chef_common::Config;
use clap::Parser;
use colored::Colorize;

const DEFAULT_MANIFEST: &str = "chef.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config = match Config::load(&chef::script_name()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    // An explicit manifest must exist; the default one is optional.
    let recipes = match &args.manifest {
        Some(path) => load_manifest(path, true),
        None => load_manifest(&config.chef_root().join(DEFAULT_MANIFEST), false),
    };
    let recipes = match recipes {
        Ok(recipes) => recipes,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    chef::run(args, config, recipes).await
}

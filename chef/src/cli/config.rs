use chef_common::error::Result;
use chef_core::Chef;
use clap::Subcommand;
use colored::Colorize;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print one setting
    Get { key: String },
    /// Store a setting
    Set { key: String, value: String },
    /// Print every setting
    List,
}

impl ConfigCommand {
    pub async fn run(&self, chef: &Chef) -> Result<()> {
        match self {
            Self::Get { key } => match chef.get_setting(key).await? {
                Some(value) => println!("{value}"),
                None => println!("{}", format!("'{key}' is not set").yellow()),
            },
            Self::Set { key, value } => {
                chef.set_setting(key, value).await?;
                println!("{} = {}", key.bold(), value);
            }
            Self::List => {
                let settings = chef.settings().await?;
                if settings.is_empty() {
                    println!("{}", "No settings stored".yellow());
                }
                for (key, value) in settings {
                    println!("{} = {}", key.bold(), value);
                }
            }
        }
        Ok(())
    }
}

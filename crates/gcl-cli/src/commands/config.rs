//! Config command - print the effective configuration.

use anyhow::Result;
use clap::Args;

use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    /// Print the resolved runtime settings instead of the file contents
    #[arg(long)]
    pub resolved: bool,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        if self.resolved {
            println!("{:#?}", config.runtime_config());
        } else {
            print!("{}", toml::to_string_pretty(config)?);
        }
        Ok(())
    }
}

use crate::{api::start_web_services, cli::Cli, conf};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};

#[derive(Debug, Args, Clone)]
pub struct ServiceSubcommands {
    #[clap(subcommand)]
    pub command: ServiceCommands,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ServiceCommands {
    /// Start the deployments API server.
    Start,
}

impl Cli {
    pub async fn handle_service_subcommands(&self, command: ServiceSubcommands) -> Result<()> {
        let cmds = command.command;
        match cmds {
            ServiceCommands::Start => {
                let config = conf::parse_api_config(self.config_path.as_deref())
                    .context("Could not load api configuration")?;

                super::init_logging(&config.general)?;

                start_web_services(config).await
            }
        }
    }
}

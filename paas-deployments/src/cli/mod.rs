mod service;

use crate::conf;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser, Clone)]
#[clap(name = "paas-deployments")]
#[clap(about = "Tracks which repositories are deployed into which organization and space.")]
#[clap(version)]
pub struct Cli {
    /// Set configuration path; if empty default paths are used
    #[clap(long, value_name = "PATH")]
    pub config_path: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Commands {
    /// Manages service related commands pertaining to administration.
    Service(service::ServiceSubcommands),
}

impl Cli {
    pub fn new() -> Self {
        Cli::parse()
    }

    pub async fn run(&self) -> Result<()> {
        match self.command.clone() {
            Commands::Service(service) => self.handle_service_subcommands(service).await,
        }
    }
}

/// Installs the global tracing subscriber. Dev mode swaps the json output for a human readable one.
pub fn init_logging(general: &conf::api::General) -> Result<()> {
    let filter = EnvFilter::try_new(&general.log_level).with_context(|| {
        format!(
            "could not parse log_level '{}'; should be one of trace, debug, info, warn, error",
            general.log_level
        )
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if general.dev_mode {
        builder.pretty().try_init()
    } else {
        builder.json().try_init()
    };

    result.map_err(|e| anyhow!("could not initialize logging; {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_service_start() {
        let cli = Cli::try_parse_from([
            "paas-deployments",
            "--config-path",
            "/tmp/paas-deployments.toml",
            "service",
            "start",
        ])
        .unwrap();

        assert_eq!(cli.config_path.as_deref(), Some("/tmp/paas-deployments.toml"));
        assert!(matches!(
            cli.command,
            Commands::Service(service::ServiceSubcommands {
                command: service::ServiceCommands::Start
            })
        ));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let general = conf::api::General {
            dev_mode: false,
            log_level: "paas_deployments=loudest".into(),
        };

        assert!(init_logging(&general).is_err());
    }
}

pub mod api;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "src/conf/defaults/"]
struct EmbeddedConfigFS;

const DEFAULT_API_CONFIG: &str = "default_api_config.toml";
const API_CONFIG_PATH: &str = "/etc/paas-deployments/paas-deployments.toml";
const ENV_PREFIX: &str = "DEPLOYMENTS_";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("embedded configuration file '{0}' could not be found")]
    MissingDefaults(String),

    #[error("embedded configuration file is not valid utf-8; {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("could not parse configuration; {0}")]
    Figment(#[from] Box<figment::Error>),
}

/// Returns an embedded default configuration file.
fn default_config(name: &str) -> Result<String, ConfigError> {
    let file =
        EmbeddedConfigFS::get(name).ok_or_else(|| ConfigError::MissingDefaults(name.into()))?;

    Ok(std::str::from_utf8(&file.data)?.to_string())
}

/// Layers the configuration sources in order of priority; later sources override earlier ones.
///
/// Embedded defaults come first, then the toml file at `path_override` (or the default path when not given),
/// then environment variables. A missing file is skipped. Environment variables are prefixed with
/// `DEPLOYMENTS_` and use `__` to separate sections: `DEPLOYMENTS_SERVER__BIND_ADDRESS`.
fn figment(defaults: &str, path_override: Option<&str>) -> Figment {
    Figment::new()
        .merge(Toml::string(defaults))
        .merge(Toml::file(path_override.unwrap_or(API_CONFIG_PATH)))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn parse_api_config(path_override: Option<&str>) -> Result<api::ApiConfig, ConfigError> {
    let defaults = default_config(DEFAULT_API_CONFIG)?;

    figment(&defaults, path_override)
        .extract::<api::ApiConfig>()
        .map_err(|e| ConfigError::Figment(Box::new(e)))
}

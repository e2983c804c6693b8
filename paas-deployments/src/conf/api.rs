use serde::Deserialize;

#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub general: General,
    pub server: Server,
}

#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct General {
    /// Turns on humanized log output and extra debug logging for the webserver. Usually turned on alongside
    /// log_level = "debug".
    pub dev_mode: bool,
    pub log_level: String,
}

#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub bind_address: String,
    pub storage_path: String,
    pub storage_busy_timeout: u64, // in seconds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::parse_api_config;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    /// Test that the default api config is properly parsed from the embedded configuration file.
    fn parse_default_config_from_file() {
        Jail::expect_with(|_jail| {
            let parsed_config = parse_api_config(Some("missing.toml")).unwrap();

            let expected_config = ApiConfig {
                general: General {
                    dev_mode: true,
                    log_level: "debug".to_string(),
                },
                server: Server {
                    bind_address: "127.0.0.1:8080".to_string(),
                    storage_path: "/tmp/paas_deployments.db".to_string(),
                    storage_busy_timeout: 5,
                },
            };

            assert_eq!(parsed_config, expected_config);
            Ok(())
        });
    }

    #[test]
    /// Test that a user supplied file overrides only the keys it sets.
    fn parse_config_file_over_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "paas-deployments.toml",
                r#"
                [server]
                storage_path = "/var/lib/paas-deployments/deployments.db"
                "#,
            )?;

            let parsed_config = parse_api_config(Some("paas-deployments.toml")).unwrap();

            assert_eq!(
                parsed_config.server.storage_path,
                "/var/lib/paas-deployments/deployments.db"
            );
            assert_eq!(parsed_config.server.bind_address, "127.0.0.1:8080");
            Ok(())
        });
    }

    #[test]
    /// Test that environment variables override both the defaults and the config file.
    fn parse_environment_variables() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "paas-deployments.toml",
                r#"
                [server]
                bind_address = "0.0.0.0:9000"
                "#,
            )?;

            jail.set_env("DEPLOYMENTS_SERVER__BIND_ADDRESS", "0.0.0.0:3000");
            jail.set_env("DEPLOYMENTS_GENERAL__DEV_MODE", "false");
            jail.set_env("DEPLOYMENTS_GENERAL__LOG_LEVEL", "info");

            let parsed_config = parse_api_config(Some("paas-deployments.toml")).unwrap();

            assert_eq!(parsed_config.server.bind_address, "0.0.0.0:3000");
            assert!(!parsed_config.general.dev_mode);
            assert_eq!(parsed_config.general.log_level, "info");
            Ok(())
        });
    }
}

use crate::{
    auth::config::JwtConfig,
    billing::config::BillingConfig,
    database::config::DatabaseConfig,
    provider::config::ProviderConfig,
    server::config::{LoggingConfig, MetricsConfig, ServerConfig},
    usage::config::UsageConfig,
};
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub usage: UsageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from defaults, `config.yaml` (if present) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(Self::environment());

        builder.build()?.try_deserialize()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(Self::environment());

        builder.build()?.try_deserialize()
    }

    fn environment() -> Environment {
        Environment::with_prefix("PEEKAI")
            .prefix_separator("_")
            .separator("__")
    }
}

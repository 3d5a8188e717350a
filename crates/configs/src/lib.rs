//! # configs
//!
//! Layered settings for KitchenHelper binaries: built-in defaults, then an
//! optional `kitchen.toml`, then `KITCHEN__SECTION__KEY` environment
//! variables. A `.env` file is loaded first when present.

use config::{Config, Environment, File, Map};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

const ENV_PREFIX: &str = "KITCHEN";
const DEFAULT_FILE: &str = "kitchen";

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or a key had the wrong type
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values parsed but are not usable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(deserialize_with = "secret")]
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    #[serde(deserialize_with = "secret")]
    pub jwt_secret: SecretString,
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

/// Initial admin account created by the `seed` binary.
#[derive(Debug, Deserialize)]
pub struct SeedSettings {
    pub admin_username: String,
    pub admin_email: String,
    #[serde(default, deserialize_with = "optional_secret")]
    pub admin_password: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
    pub seed: SeedSettings,
}

impl Settings {
    /// Loads `.env`, then `kitchen.toml` (or the file named by
    /// `KITCHEN_CONFIG`), then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let file = std::env::var("KITCHEN_CONFIG").unwrap_or_else(|_| DEFAULT_FILE.to_string());
        Self::load_from(Some(&file), None)
    }

    /// Loads from an optional file and either the process environment or,
    /// when `env` is given, that map in its place.
    pub fn load_from(file: Option<&str>, env: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("database.max_connections", 10)?
            .set_default("auth.token_ttl_minutes", 60 * 24)?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .set_default("seed.admin_username", "admin")?
            .set_default("seed.admin_email", "admin@kitchen.local")?;

        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        use secrecy::ExposeSecret;

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be positive".into()));
        }
        if self.auth.token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid("auth.token_ttl_minutes must be positive".into()));
        }
        if self.auth.jwt_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        Ok(())
    }
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn optional_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

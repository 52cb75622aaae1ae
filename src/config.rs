//! Service settings.
//!
//! Loaded from built-in defaults, then an optional `myflix.toml`, then
//! `MYFLIX_*` environment variables (e.g. `MYFLIX_JWT_SECRET`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub bind_address: String,
    pub port: u16,
    /// Directory of the sled database. A temporary database is used if unset.
    pub database_path: Option<String>,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub bcrypt_cost: u32,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_sources(
            File::with_name("myflix").required(false),
            Environment::with_prefix("MYFLIX"),
        )
    }

    fn from_sources<F, E>(file: F, env: E) -> Result<Self, ConfigError>
    where
        F: config::Source + Send + Sync + 'static,
        E: config::Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .set_default("bind_address", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("jwt_secret", "")?
            .set_default("token_ttl_secs", 7 * 24 * 60 * 60)?
            .set_default("bcrypt_cost", 10)?
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Message(
                "jwt_secret must be set (MYFLIX_JWT_SECRET)".into(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }
        if self.token_ttl_secs <= 0 || self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Message(format!(
                "token_ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Message(
                "bcrypt_cost must be between 4 and 31".into(),
            ));
        }
        Ok(())
    }
}

use std::env;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_TOKEN_HOURS: i64 = 168;
const MAX_TOKEN_HOURS: i64 = 8760;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings read from the environment (and `.env`, when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expires_in_hours: i64,
    pub uploads_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 5000)?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: lookup("JWT_ISSUER")
                .unwrap_or_else(|| "local-business-directory".to_string()),
            jwt_expires_in_hours: token_lifetime(&lookup)?,
            uploads_dir: lookup("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/uploads")),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Token lifetime in hours, at most one year.
fn token_lifetime(lookup: &impl Fn(&str) -> Option<String>) -> Result<i64, ConfigError> {
    const NAME: &str = "JWT_EXPIRES_IN_HOURS";
    let hours = parse_or(lookup, NAME, DEFAULT_TOKEN_HOURS)?;
    if !(1..=MAX_TOKEN_HOURS).contains(&hours) {
        return Err(ConfigError::Invalid {
            name: NAME,
            value: hours.to_string(),
        });
    }
    Ok(hours)
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

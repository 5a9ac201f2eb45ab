use chrono_tz::Tz;
use std::env;
use thiserror::Error;

const MIN_JWT_SECRET_LEN: usize = 16;
const DEFAULT_CORS_ORIGINS: &str = "app://quit,http://localhost:5173,http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be a number")]
    InvalidNumber(&'static str),
    #[error("JWT_SECRET must be at least 16 characters")]
    WeakJwtSecret,
    #[error("CHALLENGE_TIMEZONE is not a known timezone: {0}")]
    InvalidTimezone(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    /// Zone in which challenge end dates advance by calendar days
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "development-secret-key-change-in-production".to_string());
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakJwtSecret);
        }

        let timezone_name = env::var("CHALLENGE_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(timezone_name.clone()))?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("PORT"))?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:quit.db?mode=rwc".to_string()),
            jwt_secret,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string())
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            timezone,
        })
    }
}

use std::env;

use crate::engine::compat::DEFAULT_MAX_DEVIATION_KM;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    /// Deviation tolerance for route matching, in kilometers.
    pub max_deviation_km: f64,
    /// Upper bound a driver may request for the nearby-offers radius view.
    pub max_search_radius_km: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            max_deviation_km: parse_or_default("MAX_DEVIATION_KM", DEFAULT_MAX_DEVIATION_KM)?,
            max_search_radius_km: parse_or_default("MAX_SEARCH_RADIUS_KM", 50.0)?,
        };

        if config.max_deviation_km <= 0.0 {
            return Err(AppError::Validation(
                "MAX_DEVIATION_KM must be positive".to_string(),
            ));
        }
        if config.max_search_radius_km <= 0.0 {
            return Err(AppError::Validation(
                "MAX_SEARCH_RADIUS_KM must be positive".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

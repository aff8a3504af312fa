use crate::app_config::{AppConfig, EmptyResultPolicy, Environment, LowPowerMode};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so an empty environment yields a usable
/// development configuration.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if a value is present but invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("QUAKES_ENV", "development"))?;
    let database_url = or_default("QUAKES_DATABASE_URL", "sqlite://quakes.db");
    let settings_path = PathBuf::from(or_default(
        "QUAKES_SETTINGS_PATH",
        "./quakes-settings.yaml",
    ));
    let log_level = or_default("QUAKES_LOG_LEVEL", "info");

    let usgs_base_url = or_default(
        "QUAKES_USGS_BASE_URL",
        "https://earthquake.usgs.gov/fdsnws/event/1/",
    );
    let emsc_base_url = or_default(
        "QUAKES_EMSC_BASE_URL",
        "https://www.seismicportal.eu/fdsnws/event/1/",
    );
    let geocoder_base_url = or_default(
        "QUAKES_GEOCODER_BASE_URL",
        "https://nominatim.openstreetmap.org/",
    );
    let device_registration_url = or_default(
        "QUAKES_DEVICE_REGISTRATION_URL",
        "http://quakes.api.ackermann.io/add_user",
    );

    let request_timeout_secs = parse_u64("QUAKES_REQUEST_TIMEOUT_SECS", "20")?;
    let user_agent = or_default("QUAKES_USER_AGENT", "quakes/0.1 (earthquake-feed)");
    let max_concurrent_fetches = parse_usize("QUAKES_MAX_CONCURRENT_FETCHES", "4")?;
    if max_concurrent_fetches == 0 {
        return Err(invalid(
            "QUAKES_MAX_CONCURRENT_FETCHES",
            "must be at least 1".to_string(),
        ));
    }
    let max_retries = parse_u32("QUAKES_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("QUAKES_RETRY_BACKOFF_BASE_MS", "500")?;
    let background_budget_secs = parse_u64("QUAKES_BACKGROUND_BUDGET_SECS", "30")?;

    let empty_result_policy =
        parse_empty_result_policy(&or_default("QUAKES_EMPTY_RESULT_POLICY", "new-data"))?;
    let low_power = parse_low_power(&or_default("QUAKES_LOW_POWER", "auto"))?;

    Ok(AppConfig {
        env,
        database_url,
        settings_path,
        log_level,
        usgs_base_url,
        emsc_base_url,
        geocoder_base_url,
        device_registration_url,
        request_timeout_secs,
        user_agent,
        max_concurrent_fetches,
        max_retries,
        retry_backoff_base_ms,
        background_budget_secs,
        empty_result_policy,
        low_power,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for unrecognised values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "QUAKES_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

fn parse_empty_result_policy(s: &str) -> Result<EmptyResultPolicy, ConfigError> {
    match s {
        "new-data" => Ok(EmptyResultPolicy::NewData),
        "no-data" => Ok(EmptyResultPolicy::NoData),
        other => Err(ConfigError::InvalidEnvVar {
            var: "QUAKES_EMPTY_RESULT_POLICY".to_string(),
            reason: format!("expected new-data or no-data, got \"{other}\""),
        }),
    }
}

fn parse_low_power(s: &str) -> Result<LowPowerMode, ConfigError> {
    match s {
        "auto" => Ok(LowPowerMode::Auto),
        "on" | "true" | "1" => Ok(LowPowerMode::On),
        "off" | "false" | "0" => Ok(LowPowerMode::Off),
        other => Err(ConfigError::InvalidEnvVar {
            var: "QUAKES_LOW_POWER".to_string(),
            reason: format!("expected auto, on or off, got \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

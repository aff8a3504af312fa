//! Shared domain types and configuration for the quakes workspace.
//!
//! Every other crate depends on this one: feed parsers produce
//! [`ParsedQuake`] values, the store persists them, and the pipeline runs
//! against a [`SettingsSnapshot`] taken at invocation time.

pub mod app_config;
pub mod config;
pub mod quakes;
pub mod settings;
pub mod tiers;

use std::path::PathBuf;

use thiserror::Error;

pub use app_config::{AppConfig, EmptyResultPolicy, Environment, LowPowerMode};
pub use config::{load_app_config, load_app_config_from_env};
pub use quakes::{place_name, Coordinate, ParsedNearbyCity, ParsedQuake, Provider};
pub use settings::{detect_low_power, Settings, SettingsSnapshot, SettingsStore};
pub use tiers::{effective_fetch_size, effective_search_radius, FetchSize, LastOption, SearchRadius};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {kind}: {value}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("settings file {path} could not be accessed: {source}")]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is malformed: {source}")]
    SettingsFormat {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How a fetch that decoded zero quakes (without a transport error) is
/// reported to the background scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyResultPolicy {
    /// Any successful decode counts as new data, even an empty one.
    #[default]
    NewData,
    /// An empty decode reports no data.
    NoData,
}

/// Where the low-power flag comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LowPowerMode {
    /// Ask the host (`/sys/firmware/acpi/platform_profile`).
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub database_url: String,
    pub settings_path: PathBuf,
    pub log_level: String,
    pub usgs_base_url: String,
    pub emsc_base_url: String,
    pub geocoder_base_url: String,
    pub device_registration_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_concurrent_fetches: usize,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub background_budget_secs: u64,
    pub empty_result_policy: EmptyResultPolicy,
    pub low_power: LowPowerMode,
}

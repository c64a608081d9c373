// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Pending connection queue length passed to `listen(2)`
    #[serde(default = "default_listen_backlog")]
    pub listen_backlog: i32,
}

#[allow(clippy::missing_const_for_fn)]
fn default_listen_backlog() -> i32 {
    1024
}

/// Where the UI is served from
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct UiConfig {
    /// Empty, a mount path such as `/ui`, or the URL of a UI server to proxy
    #[serde(default)]
    pub url: String,
    /// View shown for a request to the bare mount root
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_landing_path() -> String {
    crate::handler::DEFAULT_LANDING_PATH.to_string()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            landing_path: default_landing_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common or json)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration, timeouts in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

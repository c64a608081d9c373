// Configuration module entry point
// Layers an optional config file, SPA_* environment variables and defaults

mod types;

use std::net::SocketAddr;

pub use types::{Config, LoggingConfig, PerformanceConfig, ServerConfig, UiConfig};

/// Prefix for environment overrides, e.g. `SPA_UI__URL`
pub const ENV_PREFIX: &str = "SPA";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.listen_backlog", 1024)?
            .set_default("ui.url", "")?
            .set_default("ui.landing_path", crate::handler::DEFAULT_LANDING_PATH)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

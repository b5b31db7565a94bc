// Configuration module entry point
// Loads layered settings and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{Config, LoggingConfig};

/// Environment variable naming the config file (without extension)
pub const CONFIG_PATH_ENV: &str = "FORMATTER_CONFIG";

/// Prefix for environment overrides, e.g. `FORMATTER_SERVER__PORT=9090`
const ENV_PREFIX: &str = "FORMATTER";

const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from the default location
    ///
    /// The file stem is taken from `FORMATTER_CONFIG`, falling back to "config".
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Self::with_defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Built-in defaults only, no file or environment layers
    #[cfg(test)]
    pub fn defaults() -> Self {
        Self::with_defaults()
            .and_then(|builder| builder.build())
            .and_then(|settings| settings.try_deserialize())
            .expect("built-in defaults must deserialize")
    }

    fn with_defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.shutdown_timeout", 10)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn defaults() -> Config {
        Config::defaults()
    }

    #[test]
    fn test_defaults() {
        let cfg = defaults();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.server.workers.is_none());
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert!(cfg.logging.log_file.is_none());
        assert!(cfg.performance.max_connections.is_none());
        assert_eq!(cfg.performance.shutdown_timeout, 10);
    }

    #[test]
    fn test_socket_addr() {
        let mut cfg = defaults();
        assert_eq!(
            cfg.get_socket_addr().unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );

        cfg.server.host = "not a host".to_string();
        assert!(cfg.get_socket_addr().unwrap_err().starts_with("Invalid address"));
    }

    #[test]
    fn test_request_timeout_uses_larger_value() {
        let mut cfg = defaults();
        cfg.performance.read_timeout = 5;
        cfg.performance.write_timeout = 12;
        assert_eq!(cfg.performance.request_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_idle_timeout_follows_keep_alive() {
        let mut cfg = defaults();
        assert_eq!(cfg.performance.idle_timeout(), Duration::from_secs(75));

        cfg.performance.keep_alive_timeout = 0;
        assert_eq!(cfg.performance.idle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let cfg = Config::load_from("does/not/exist/formatter").unwrap();
        assert_eq!(cfg.performance.keep_alive_timeout, 75);
    }
}

//! Kernel and driver configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default loopback port of the driver process.
pub const DEFAULT_DRIVER_PORT: u16 = 9999;

/// Configuration for the Kernel.
#[derive(Debug, Clone, Default)]
pub struct KernelConfig {
    /// SQLite database path. `None` keeps the log in memory.
    pub database: Option<PathBuf>,
    /// Delegated driver settings.
    pub driver: DriverConfig,
}

impl KernelConfig {
    /// Read configuration from the environment.
    ///
    /// `KERI_DATABASE` selects the SQLite path; driver variables are
    /// documented on [`DriverConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            database: std::env::var_os("KERI_DATABASE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            driver: DriverConfig::from_env(),
        }
    }
}

/// Configuration for reaching (and optionally spawning) a driver process.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub host: String,
    pub port: u16,
    /// Program to spawn. `None` means the driver is managed elsewhere.
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    /// How long to wait for `/status` to report active.
    pub startup_timeout: Duration,
    /// Per-request timeout for the HTTP client.
    pub request_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_DRIVER_PORT,
            program: None,
            args: Vec::new(),
            startup_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl DriverConfig {
    /// Defaults overridden by `KERI_DRIVER_HOST`, `KERI_DRIVER_PORT` and
    /// `KERI_DRIVER_PROGRAM`. An unparsable port keeps the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("KERI_DRIVER_HOST") {
            if !host.is_empty() {
                config.host = host;
            }
        }
        if let Some(port) = std::env::var("KERI_DRIVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            config.port = port;
        }
        if let Some(program) = std::env::var_os("KERI_DRIVER_PROGRAM").filter(|v| !v.is_empty()) {
            config.program = Some(PathBuf::from(program));
        }
        config
    }

    /// Base URL of the driver, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.base_url(), "http://127.0.0.1:9999");
        assert_eq!(config.startup_timeout, Duration::from_secs(15));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.program.is_none());
    }

    #[test]
    fn test_kernel_defaults_to_memory() {
        assert!(KernelConfig::default().database.is_none());
    }
}

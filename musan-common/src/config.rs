//! Configuration loading and resolution
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument / environment variable (applied as [`ConfigOverrides`])
//! 2. TOML config file
//! 3. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default listening port
pub const DEFAULT_PORT: u16 = 10000;

/// Default bind host (all interfaces)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Environment variable naming an explicit TOML config file
pub const CONFIG_ENV_VAR: &str = "MUSAN_CONFIG";

/// Default upload size limit (64 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Default per-request time budget
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Listening port
    pub port: u16,
    /// Directory for temporary upload files (OS temp dir when unset)
    pub upload_dir: Option<PathBuf>,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
    /// Whole-request time budget in seconds
    pub request_timeout_secs: u64,
    /// Feature analysis engine parameters
    pub analysis: AnalysisConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upload_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Feature analysis engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// FFT frame size for key estimation (power of two)
    pub key_frame_size: usize,
    /// Hop between key estimation frames
    pub key_hop_size: usize,
    /// FFT frame size for the onset detection function (power of two)
    pub tempo_frame_size: usize,
    /// Hop between onset detection frames
    pub tempo_hop_size: usize,
    /// Lowest tempo considered
    pub min_bpm: f32,
    /// Highest tempo considered
    pub max_bpm: f32,
    /// Peak amplitude below which a signal counts as silence
    pub silence_threshold: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            key_frame_size: 4096,
            key_hop_size: 2048,
            tempo_frame_size: 1024,
            tempo_hop_size: 512,
            min_bpm: 50.0,
            max_bpm: 210.0,
            silence_threshold: 1e-4,
        }
    }
}

impl AnalysisConfig {
    /// Check parameter consistency
    pub fn validate(&self) -> Result<()> {
        check_frame("key", self.key_frame_size, self.key_hop_size)?;
        check_frame("tempo", self.tempo_frame_size, self.tempo_hop_size)?;

        if !(self.min_bpm.is_finite() && self.max_bpm.is_finite()) || self.min_bpm <= 0.0 {
            return Err(Error::Config(format!(
                "min_bpm must be positive and finite, got {}",
                self.min_bpm
            )));
        }
        if self.min_bpm >= self.max_bpm {
            return Err(Error::Config(format!(
                "min_bpm ({}) must be below max_bpm ({})",
                self.min_bpm, self.max_bpm
            )));
        }
        if !self.silence_threshold.is_finite() || self.silence_threshold < 0.0 {
            return Err(Error::Config(format!(
                "silence_threshold must be a non-negative number, got {}",
                self.silence_threshold
            )));
        }
        Ok(())
    }
}

fn check_frame(name: &str, frame: usize, hop: usize) -> Result<()> {
    if frame < 64 || !frame.is_power_of_two() {
        return Err(Error::Config(format!(
            "{name}_frame_size must be a power of two >= 64, got {frame}"
        )));
    }
    if hop == 0 || hop > frame {
        return Err(Error::Config(format!(
            "{name}_hop_size must be in 1..={frame}, got {hop}"
        )));
    }
    Ok(())
}

/// Values supplied on the command line (or their environment fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upload_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Parse a TOML document; absent keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read TOML failed ({}): {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply command-line overrides on top of file/default values
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(dir) = &overrides.upload_dir {
            self.upload_dir = Some(dir.clone());
        }
        self
    }

    /// Socket address string, e.g. `0.0.0.0:10000`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Directory receiving upload temp files
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be non-zero".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be non-zero".to_string()));
        }
        self.analysis.validate()
    }
}

/// Locate the TOML config file
///
/// Explicit path → `MUSAN_CONFIG` → `<config dir>/musan/musan-server.toml` (only if it exists).
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("musan").join("musan-server.toml"))
}

/// Resolve the complete server configuration
///
/// A missing default config file is fine; an explicitly named file that
/// cannot be read, or any file that fails to parse, is an error.
pub fn load_server_config(
    cli_config: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ServerConfig> {
    let base = match resolve_config_path(cli_config) {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading TOML config");
            ServerConfig::load(&path)?
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            ServerConfig::default()
        }
    };

    let config = base.with_overrides(overrides);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_addr(), "0.0.0.0:10000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            port = 8080

            [analysis]
            min_bpm = 60.0
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.analysis.min_bpm, 60.0);
        assert_eq!(config.analysis.max_bpm, 210.0);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ServerConfig::from_toml_str("port = \"not a number\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let config = ServerConfig::from_toml_str("port = 8080\nhost = \"127.0.0.1\"")
            .unwrap()
            .with_overrides(&ConfigOverrides {
                host: None,
                port: Some(9090),
                upload_dir: Some(PathBuf::from("/srv/uploads")),
            });

        assert_eq!(config.port, 9090);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.upload_dir(), PathBuf::from("/srv/uploads"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.port = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.analysis.key_frame_size = 3000;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.analysis.tempo_hop_size = 4096;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.analysis.min_bpm = 200.0;
        config.analysis.max_bpm = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_explicit_path_beats_env() {
        std::env::set_var(CONFIG_ENV_VAR, "/from/env.toml");
        let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")));
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));
    }

    #[test]
    #[serial]
    fn test_load_from_env_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("musan.toml");
        std::fs::write(&path, "port = 12345\nrequest_timeout_secs = 5\n").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, &path);
        let config = load_server_config(None, &ConfigOverrides::default());
        std::env::remove_var(CONFIG_ENV_VAR);

        let config = config.unwrap();
        assert_eq!(config.port, 12345);
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_error() {
        std::env::remove_var(CONFIG_ENV_VAR);
        let result = load_server_config(
            Some(Path::new("/nonexistent/musan.toml")),
            &ConfigOverrides::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

//! Process configuration.
//!
//! A single JSON file plus environment overrides. Hook *definitions* are a
//! separate concern, watched by the store under `hooksDir`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::hooks::definition::DEFAULT_MAX_BODY_BYTES;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("failed to parse config at {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// Gateway process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    /// Listen address for the HTTP surface.
    pub listen_addr: String,
    /// Identity of this ingesting instance, stamped on every envelope.
    pub server_id: String,
    /// Root directory watched for hook definition files.
    pub hooks_dir: PathBuf,
    /// URL context the hook routes mount under (e.g. "/hook").
    pub url_context: String,
    /// Definition rescan interval in seconds.
    pub refresh_interval_secs: u64,
    /// Fallback body ceiling for hooks without a `maxBytes` meta.
    pub max_body_bytes: u64,
    /// Log output format: "plain" or "json".
    pub log_format: String,
    /// Default log level when no env filter is set.
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            listen_addr: "127.0.0.1:8080".into(),
            server_id: "hookgate-1".into(),
            hooks_dir: PathBuf::from("hooks.d"),
            url_context: "/hook".into(),
            refresh_interval_secs: 30,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_format: "plain".into(),
            log_level: "info".into(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration. Priority: explicit path, `HOOKGATE_CONFIG_PATH`,
    /// built-in defaults. Environment overrides apply on top.
    pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var("HOOKGATE_CONFIG_PATH").ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => GatewayConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
        let data = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&data).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = env::var("HOOKGATE_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(dir) = env::var("HOOKGATE_HOOKS_DIR") {
            self.hooks_dir = PathBuf::from(dir);
        }
        if let Ok(id) = env::var("HOOKGATE_SERVER_ID") {
            self.server_id = id;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.url_context.starts_with('/') || self.url_context.ends_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "urlContext must start with '/' and not end with one, got '{}'",
                self.url_context
            )));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "refreshIntervalSecs must be at least 1".into(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "maxBodyBytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gateway.json");
        fs::write(
            &path,
            r#"{"listenAddr":"0.0.0.0:9999","urlContext":"/callbacks","refreshIntervalSecs":5}"#,
        )
        .expect("write");

        let config = GatewayConfig::load(Some(&path)).expect("load");
        assert_eq!(config.listen_addr, "0.0.0.0:9999");
        assert_eq!(config.url_context, "/callbacks");
        assert_eq!(config.refresh_interval_secs, 5);
        // Untouched keys keep their defaults.
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn bad_url_context_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gateway.json");
        fs::write(&path, r#"{"urlContext":"hook/"}"#).expect("write");
        assert!(matches!(
            GatewayConfig::load(Some(&path)),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gateway.json");
        fs::write(&path, r#"{"refreshIntervalSecs":0}"#).expect("write");
        assert!(GatewayConfig::load(Some(&path)).is_err());
    }
}

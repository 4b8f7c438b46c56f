//! Configuration module for the atelier order tracker.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files, resolves
//! `${VAR}` / `${VAR:-default}` environment references, and validates that
//! every required value is present and within bounds.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
pub use builders::ConfigBuilder;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the order tracker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Order lifecycle timing.
	#[serde(default)]
	pub lifecycle: LifecycleConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Identity of the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Identifier used in logs.
	pub id: String,
}

/// Timing of the delivered-order countdown.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
	/// Seconds a delivered order stays before it is archived.
	#[serde(default = "default_countdown_seconds")]
	pub countdown_seconds: u64,
	/// Length of one countdown tick in milliseconds.
	#[serde(default = "default_tick_interval_ms")]
	pub tick_interval_ms: u64,
}

impl LifecycleConfig {
	/// Returns the tick cadence as a duration.
	pub fn tick_interval(&self) -> Duration {
		Duration::from_millis(self.tick_interval_ms)
	}
}

impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			countdown_seconds: default_countdown_seconds(),
			tick_interval_ms: default_tick_interval_ms(),
		}
	}
}

/// Returns the default countdown window: one minute.
fn default_countdown_seconds() -> u64 {
	60
}

/// Returns the default tick length: one second.
fn default_tick_interval_ms() -> u64 {
	1000
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// CORS configuration; permissive when absent.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS; `"*"` allows any origin.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		// Validate lifecycle timing
		if !(1..=86_400).contains(&self.lifecycle.countdown_seconds) {
			return Err(ConfigError::Validation(format!(
				"lifecycle.countdown_seconds must be between 1 and 86400, got {}",
				self.lifecycle.countdown_seconds
			)));
		}
		if !(10..=60_000).contains(&self.lifecycle.tick_interval_ms) {
			return Err(ConfigError::Validation(format!(
				"lifecycle.tick_interval_ms must be between 10 and 60000, got {}",
				self.lifecycle.tick_interval_ms
			)));
		}

		// Validate storage config
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		// Validate API config if enabled
		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.host.trim().is_empty() {
				return Err(ConfigError::Validation("API host cannot be empty".into()));
			}
			if let Some(cors) = &api.cors {
				if cors.allowed_origins.is_empty() {
					return Err(ConfigError::Validation(
						"api.cors.allowed_origins cannot be empty".into(),
					));
				}
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[service]
id = "atelier"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("ATELIER_TEST_HOST", "localhost");
		std::env::set_var("ATELIER_TEST_PORT", "5432");

		let input = "host = \"${ATELIER_TEST_HOST}:${ATELIER_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("ATELIER_TEST_HOST");
		std::env::remove_var("ATELIER_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${ATELIER_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${ATELIER_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("ATELIER_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_uses_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.service.id, "atelier");
		assert_eq!(config.lifecycle.countdown_seconds, 60);
		assert_eq!(config.lifecycle.tick_interval(), Duration::from_secs(1));
		assert!(config.api.is_none());
	}

	#[test]
	fn test_full_config() {
		std::env::set_var("ATELIER_TEST_PORT_FULL", "8080");
		let config_str = r#"
[service]
id = "workshop"

[lifecycle]
countdown_seconds = 30
tick_interval_ms = 500

[storage]
primary = "file"
[storage.implementations.file]
storage_path = "/tmp/orders"

[api]
enabled = true
host = "0.0.0.0"
port = ${ATELIER_TEST_PORT_FULL}
[api.cors]
allowed_origins = ["http://localhost:5173"]
"#;

		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.lifecycle.countdown_seconds, 30);
		assert_eq!(config.lifecycle.tick_interval(), Duration::from_millis(500));
		assert_eq!(config.storage.primary, "file");
		let api = config.api.unwrap();
		assert_eq!(api.port, 8080);
		assert_eq!(api.cors.unwrap().allowed_origins.len(), 1);

		std::env::remove_var("ATELIER_TEST_PORT_FULL");
	}

	#[test]
	fn test_primary_storage_must_be_configured() {
		let config_str = r#"
[service]
id = "atelier"

[storage]
primary = "file"
[storage.implementations.memory]
"#;
		let err = Config::from_str(config_str).unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary storage 'file' not found"));
	}

	#[test]
	fn test_countdown_bounds() {
		let config_str = format!("{}\n[lifecycle]\ncountdown_seconds = 0\n", MINIMAL);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("countdown_seconds"));

		let config_str = format!("{}\n[lifecycle]\ntick_interval_ms = 5\n", MINIMAL);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("tick_interval_ms"));
	}

	#[test]
	fn test_empty_service_id_rejected() {
		let config_str = MINIMAL.replace("id = \"atelier\"", "id = \"\"");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}
}

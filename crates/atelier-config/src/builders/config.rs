//! Configuration builder for creating test and development configurations.
//!
//! Engine and API tests need a [`Config`] without writing TOML; the builder
//! starts from an in-memory store and a one-minute countdown.

use crate::{ApiConfig, Config, LifecycleConfig, ServiceConfig, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	countdown_seconds: u64,
	tick_interval_ms: u64,
	storage_primary: String,
	storage_config: toml::Value,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		let lifecycle = LifecycleConfig::default();
		Self {
			service_id: "atelier-test".to_string(),
			countdown_seconds: lifecycle.countdown_seconds,
			tick_interval_ms: lifecycle.tick_interval_ms,
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::map::Map::new()),
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Sets the countdown window for delivered orders.
	pub fn countdown_seconds(mut self, seconds: u64) -> Self {
		self.countdown_seconds = seconds;
		self
	}

	/// Sets the countdown tick length.
	pub fn tick_interval_ms(mut self, millis: u64) -> Self {
		self.tick_interval_ms = millis;
		self
	}

	/// Sets the primary storage implementation and its settings.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(self.storage_primary.clone(), self.storage_config);

		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			lifecycle: LifecycleConfig {
				countdown_seconds: self.countdown_seconds,
				tick_interval_ms: self.tick_interval_ms,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
			},
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_pass_validation() {
		let config = ConfigBuilder::new().build();
		assert!(config.validate().is_ok());
		assert_eq!(config.storage.primary, "memory");
		assert!(config.storage.implementations.contains_key("memory"));
	}

	#[test]
	fn test_overrides() {
		let config = ConfigBuilder::new()
			.service_id("workshop")
			.countdown_seconds(3)
			.tick_interval_ms(100)
			.build();
		assert_eq!(config.service.id, "workshop");
		assert_eq!(config.lifecycle.countdown_seconds, 3);
		assert_eq!(config.lifecycle.tick_interval_ms, 100);
	}
}

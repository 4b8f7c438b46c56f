//! Factory registry for pluggable implementations.
//!
//! Collects the factory functions of every available storage backend so the
//! engine can be built from configuration by implementation name.

use atelier_config::Config;
use atelier_core::{EngineBuilder, EngineFactories, LifecycleEngine};
use atelier_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Registry of implementation factories, by name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
		}
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in atelier_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		registry
	})
}

/// Selects the registered factories for the implementations named in the
/// configuration, failing on any name nobody registered.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the lifecycle engine from configuration using the registry.
pub fn build_engine_from_config(
	config: Config,
) -> Result<LifecycleEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");

	let engine = EngineBuilder::new(config).build(EngineFactories { storage_factories })?;
	Ok(engine)
}

#[cfg(test)]
mod tests {
	use super::*;
	use atelier_config::ConfigBuilder;
	use tempfile::TempDir;

	#[test]
	fn test_registry_has_builtin_storage() {
		let registry = get_registry();
		assert!(registry.storage.contains_key("memory"));
		assert!(registry.storage.contains_key("file"));
	}

	#[test]
	fn test_build_engine_with_memory_store() {
		let config = ConfigBuilder::new().countdown_seconds(10).build();
		let engine = build_engine_from_config(config).unwrap();
		assert_eq!(engine.settings().countdown_seconds, 10);
	}

	#[tokio::test]
	async fn test_build_engine_with_file_store() {
		let temp_dir = TempDir::new().unwrap();
		let mut table = toml::map::Map::new();
		table.insert(
			"storage_path".to_string(),
			toml::Value::String(temp_dir.path().to_string_lossy().into_owned()),
		);
		let config = ConfigBuilder::new()
			.storage("file", toml::Value::Table(table))
			.build();

		let engine = build_engine_from_config(config).unwrap();
		engine.initialize().await.unwrap();
		assert!(engine.list().await.unwrap().is_empty());
	}

	#[test]
	fn test_unknown_implementation_is_rejected() {
		let config = ConfigBuilder::new()
			.storage("redis", toml::Value::Table(toml::map::Map::new()))
			.build();
		let err = build_engine_from_config(config).err().unwrap();
		assert!(err.to_string().contains("Unknown storage implementation 'redis'"));
		assert!(err.to_string().contains("file, memory"));
	}
}

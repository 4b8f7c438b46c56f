//! Registry trait for self-registering implementations.
//!
//! Pluggable backends implement this trait to declare the name used for them
//! in configuration files together with the factory that builds them.

/// Base trait for implementation registries.
///
/// Each pluggable implementation module provides a `Registry` struct that
/// implements this trait, tying its configuration name to its factory.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "memory" for `storage.implementations.memory`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}

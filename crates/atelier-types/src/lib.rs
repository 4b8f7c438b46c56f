//! Common types module for the atelier order tracker.
//!
//! This module defines the core data types shared by every atelier crate:
//! the order model and its status lifecycle, the events published by the
//! lifecycle engine, HTTP request/response shapes, and the configuration
//! validation helpers used by pluggable storage backends.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Event types published by the lifecycle engine.
pub mod events;
/// Order types: the order record, its status and creation input.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility functions for display formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::truncate_id;
pub use validation::*;

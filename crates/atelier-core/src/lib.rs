//! Order lifecycle engine for the atelier order tracker.
//!
//! This crate provides the logic governing an order's life: the state
//! machine deciding which status moves are legal, the countdown that
//! archives delivered orders after a fixed window, undo, and the projection
//! of the visible order list from search and filter. Persistence goes
//! through the [`atelier_storage::OrderStore`] trait.

pub mod builder;
pub mod countdown;
pub mod engine;
pub mod projector;
pub mod state;

pub use builder::{BuilderError, EngineBuilder, EngineFactories};
pub use countdown::{CountdownScheduler, Expiry};
pub use engine::event_bus::EventBus;
pub use engine::{EngineError, ErrorKind, LifecycleEngine, LifecycleError};
pub use projector::{count_statuses, project, Projection, SearchQuery};

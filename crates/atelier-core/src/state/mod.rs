//! Order state machine.
//!
//! Holds the rules deciding which status moves are legal; the engine
//! applies them before anything is persisted.

pub mod order;

pub use order::{check_advance, check_undo, TransitionError};

//! Utility functions shared across atelier crates.

pub mod formatting;

pub use formatting::truncate_id;

//! Event types published by the lifecycle engine.
//!
//! Every successful lifecycle operation publishes one of these events on the
//! engine's broadcast bus, so that observers (logging, live views, tests) can
//! react to changes without polling the store.

use crate::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Events related to order lifecycle changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderEvent {
	/// A new order has been created in `pending`.
	Created { order: Order },
	/// An order moved forward one status.
	Advanced { order: Order, from: OrderStatus },
	/// An order moved back one status through undo.
	Reverted { order: Order, from: OrderStatus },
	/// A delivered-order countdown was started or restarted.
	CountdownArmed { order_id: String, seconds: u64 },
	/// A live countdown was stopped before expiry.
	CountdownCancelled { order_id: String },
	/// An order was removed from the store.
	Deleted {
		order_id: String,
		reason: DeletionReason,
	},
}

/// Why an order left the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeletionReason {
	/// Deleted on explicit request.
	Manual,
	/// Archived automatically when its delivered countdown ran out.
	Expired,
}

//! Status transition rules.
//!
//! Orders move along `pending -> ready -> delivered` one step at a time.
//! Advancing must name the immediate successor; undo always goes back
//! exactly one step. Anything else is rejected, including requests for the
//! status the order already has.

use atelier_types::OrderStatus;
use thiserror::Error;

/// A status move the state machine does not allow.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TransitionError {
	#[error("Invalid state transition from {from} to {to}")]
	NotNext { from: OrderStatus, to: OrderStatus },
	#[error("Order is already {0}, there is nothing to undo")]
	NoPrevious(OrderStatus),
}

/// Checks that `to` is the immediate successor of `from`.
pub fn check_advance(from: OrderStatus, to: OrderStatus) -> Result<(), TransitionError> {
	match from.next() {
		Some(next) if next == to => Ok(()),
		_ => Err(TransitionError::NotNext { from, to }),
	}
}

/// Returns the status an undo from `from` lands on.
pub fn check_undo(from: OrderStatus) -> Result<OrderStatus, TransitionError> {
	from.previous().ok_or(TransitionError::NoPrevious(from))
}

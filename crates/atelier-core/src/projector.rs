//! Projection of the visible order list.
//!
//! The displayed list is derived from the full order set, the result of the
//! last non-empty search (if any) and the active status filter. Status
//! counts are always taken over the full set, so searching or filtering
//! never changes them.

use atelier_storage::orders::client_name_matches;
use atelier_types::{Order, OrderStatus, StatusCounts, StatusFilter};

/// A trimmed, non-empty client name query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
	/// Parses user input; blank input means no query is active.
	pub fn parse(input: &str) -> Option<Self> {
		let trimmed = input.trim();
		if trimmed.is_empty() {
			None
		} else {
			Some(Self(trimmed.to_string()))
		}
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns true if the order's client name contains this query,
	/// ignoring case.
	pub fn matches(&self, order: &Order) -> bool {
		client_name_matches(order, &self.0)
	}
}

/// Orders to display together with the per-status counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
	pub orders: Vec<Order>,
	pub counts: StatusCounts,
}

/// Derives the displayed orders and the status counts.
///
/// `searched` is the result of the active search, or `None` when no query
/// is active. The relative order of the base set is preserved.
pub fn project(all: &[Order], searched: Option<&[Order]>, filter: StatusFilter) -> Projection {
	let base = searched.unwrap_or(all);
	let orders = base
		.iter()
		.filter(|order| filter.matches(order.status))
		.cloned()
		.collect();

	Projection {
		orders,
		counts: count_statuses(all),
	}
}

/// Counts orders per status.
pub fn count_statuses(orders: &[Order]) -> StatusCounts {
	orders
		.iter()
		.fold(StatusCounts::default(), |mut counts, order| {
			counts.all += 1;
			match order.status {
				OrderStatus::Pending => counts.pending += 1,
				OrderStatus::Ready => counts.ready += 1,
				OrderStatus::Delivered => counts.delivered += 1,
			}
			counts
		})
}

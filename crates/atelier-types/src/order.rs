//! Order types for the atelier order tracker.
//!
//! This module defines the order record persisted by the store, the
//! three-stage status lifecycle it moves through, the creation input
//! accepted from callers and the status filter used by list views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A handmade-goods order tracked through its fulfillment lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Unique identifier for this order, assigned at creation.
	pub id: String,
	/// Name of the client who placed the order.
	pub client_name: String,
	/// Contact phone number, stored as entered.
	pub phone: String,
	/// Free-form description of the order contents.
	pub details: String,
	/// Agreed price, never negative.
	#[serde(with = "rust_decimal::serde::float")]
	pub price: Decimal,
	/// Current fulfillment status.
	pub status: OrderStatus,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp of the last persisted status change.
	pub updated_at: DateTime<Utc>,
}

impl Order {
	/// Builds a fresh `pending` order from validated creation input.
	pub fn from_new(new_order: NewOrder) -> Self {
		let now = Utc::now();
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			client_name: new_order.client_name,
			phone: new_order.phone,
			details: new_order.details,
			price: new_order.price,
			status: OrderStatus::Pending,
			created_at: now,
			updated_at: now,
		}
	}
}

/// Status of an order in its fulfillment lifecycle.
///
/// Orders only ever move one step at a time along
/// `Pending -> Ready -> Delivered`, forward by transition or backward by undo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// Order has been taken but work is not finished.
	Pending,
	/// Order is finished and waiting for pickup.
	Ready,
	/// Order has been handed to the client.
	Delivered,
}

impl OrderStatus {
	/// All statuses in lifecycle order.
	pub const ALL: [OrderStatus; 3] = [Self::Pending, Self::Ready, Self::Delivered];

	/// Returns the status a forward transition leads to, if any.
	pub fn next(self) -> Option<OrderStatus> {
		match self {
			Self::Pending => Some(Self::Ready),
			Self::Ready => Some(Self::Delivered),
			Self::Delivered => None,
		}
	}

	/// Returns the status an undo leads back to, if any.
	pub fn previous(self) -> Option<OrderStatus> {
		match self {
			Self::Pending => None,
			Self::Ready => Some(Self::Pending),
			Self::Delivered => Some(Self::Ready),
		}
	}

	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Ready => "ready",
			Self::Delivered => "delivered",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a string does not name a known status or filter.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Unknown status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"pending" => Ok(Self::Pending),
			"ready" => Ok(Self::Ready),
			"delivered" => Ok(Self::Delivered),
			_ => Err(UnknownStatus(s.to_string())),
		}
	}
}

/// Errors raised when creation input fails validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderValidationError {
	/// A required text field is absent or blank.
	#[error("Missing required field: {0}")]
	MissingField(&'static str),
	/// The price is below zero.
	#[error("Price cannot be negative: {0}")]
	NegativePrice(Decimal),
}

/// Input accepted when creating an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOrder {
	#[serde(default)]
	pub client_name: String,
	#[serde(default)]
	pub phone: String,
	#[serde(default)]
	pub details: String,
	#[serde(with = "rust_decimal::serde::float")]
	pub price: Decimal,
}

impl NewOrder {
	/// Trims the text fields and checks that every required field is present
	/// and the price is not negative.
	pub fn validate(self) -> Result<NewOrder, OrderValidationError> {
		let client_name = required("client_name", &self.client_name)?;
		let phone = required("phone", &self.phone)?;
		let details = required("details", &self.details)?;

		if self.price < Decimal::ZERO {
			return Err(OrderValidationError::NegativePrice(self.price));
		}

		Ok(NewOrder {
			client_name,
			phone,
			details,
			price: self.price,
		})
	}
}

fn required(field: &'static str, value: &str) -> Result<String, OrderValidationError> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return Err(OrderValidationError::MissingField(field));
	}
	Ok(trimmed.to_string())
}

/// Status filter applied to the displayed order list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
	/// Show every order.
	#[default]
	All,
	Pending,
	Ready,
	Delivered,
}

impl StatusFilter {
	/// Returns true if an order with `status` passes this filter.
	pub fn matches(&self, status: OrderStatus) -> bool {
		match self {
			Self::All => true,
			Self::Pending => status == OrderStatus::Pending,
			Self::Ready => status == OrderStatus::Ready,
			Self::Delivered => status == OrderStatus::Delivered,
		}
	}
}

impl From<OrderStatus> for StatusFilter {
	fn from(status: OrderStatus) -> Self {
		match status {
			OrderStatus::Pending => Self::Pending,
			OrderStatus::Ready => Self::Ready,
			OrderStatus::Delivered => Self::Delivered,
		}
	}
}

impl FromStr for StatusFilter {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.trim().eq_ignore_ascii_case("all") {
			return Ok(Self::All);
		}
		s.parse::<OrderStatus>().map(Self::from)
	}
}

//! API types for the atelier HTTP API.
//!
//! This module defines the request and response bodies exchanged by the
//! order endpoints, along with the structured error type that maps lifecycle
//! failures onto HTTP status codes.

use crate::{Order, OrderStatus};
use axum::{http::StatusCode, response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Request body for `PUT /api/orders/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeRequest {
	/// Target status, as its lowercase name.
	pub status: String,
}

/// Per-status order counts over the full, unfiltered order set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
	pub all: usize,
	pub pending: usize,
	pub ready: usize,
	pub delivered: usize,
}

impl StatusCounts {
	/// Returns the count for a single status.
	pub fn get(&self, status: OrderStatus) -> usize {
		match status {
			OrderStatus::Pending => self.pending,
			OrderStatus::Ready => self.ready,
			OrderStatus::Delivered => self.delivered,
		}
	}
}

/// Response body for `GET /api/orders/view`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderViewResponse {
	/// Orders to display after search and filter.
	pub orders: Vec<Order>,
	/// Badge counts, independent of search and filter.
	pub counts: StatusCounts,
	/// Seconds remaining for each delivered order with a live countdown.
	pub countdowns: HashMap<String, u64>,
}

/// Generic acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
	pub message: String,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Requested resource does not exist (404)
	NotFound { error_type: String, message: String },
	/// Request conflicts with the current resource state (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Service unavailable with optional retry information (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			APIError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			APIError::NotFound { .. } => StatusCode::NOT_FOUND,
			APIError::Conflict { .. } => StatusCode::CONFLICT,
			APIError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::Conflict {
				error_type,
				message,
				details,
			} => (error_type, message, details.clone(), None),
			APIError::NotFound {
				error_type,
				message,
			} => (error_type, message, None, None),
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => (error_type, message, None, *retry_after),
		};

		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		let status = self.status_code();
		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}

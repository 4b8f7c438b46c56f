//! Order API implementation.
//!
//! Thin handlers over the lifecycle engine: each one parses its input,
//! calls a single engine operation and maps lifecycle failures onto the
//! structured API error.

use crate::server::AppState;
use atelier_core::{ErrorKind, LifecycleError, SearchQuery};
use atelier_types::{
	APIError, MessageResponse, NewOrder, Order, OrderStatus, OrderViewResponse, StatusChangeRequest,
	StatusFilter,
};
use axum::{
	extract::{rejection::JsonRejection, Path, Query, State},
	http::StatusCode,
	response::Json,
};
use serde::Deserialize;
use std::collections::HashMap;

/// Seconds a client should wait before retrying against an unavailable store.
const STORE_RETRY_AFTER_SECONDS: u64 = 5;

/// Query parameters of the search endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
	#[serde(default)]
	pub q: String,
}

/// Query parameters of the view endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
	#[serde(default)]
	pub q: String,
	pub filter: Option<String>,
}

/// Maps a lifecycle failure onto its HTTP representation.
pub fn api_error(err: LifecycleError) -> APIError {
	let message = err.to_string();
	match err.kind() {
		ErrorKind::Validation => APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message,
			details: None,
		},
		ErrorKind::InvalidTransition => APIError::Conflict {
			error_type: "INVALID_TRANSITION".to_string(),
			message,
			details: None,
		},
		ErrorKind::NotFound => APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".to_string(),
			message,
		},
		ErrorKind::StoreUnavailable => {
			tracing::error!(error = %message, "Order store unavailable");
			APIError::ServiceUnavailable {
				error_type: "STORE_UNAVAILABLE".to_string(),
				message,
				retry_after: Some(STORE_RETRY_AFTER_SECONDS),
			}
		},
	}
}

fn invalid_status(message: String) -> APIError {
	APIError::BadRequest {
		error_type: "INVALID_STATUS".to_string(),
		message,
		details: None,
	}
}

/// Handles POST /api/orders.
pub async fn create_order(
	State(state): State<AppState>,
	payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let Json(new_order) = payload.map_err(|rejection| APIError::BadRequest {
		error_type: "VALIDATION_ERROR".to_string(),
		message: rejection.body_text(),
		details: None,
	})?;

	let order = state.engine.create(new_order).await.map_err(api_error)?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// Handles GET /api/orders.
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, APIError> {
	let orders = state.engine.list().await.map_err(api_error)?;
	Ok(Json(orders))
}

/// Handles GET /api/orders/search. A blank query returns no orders.
pub async fn search_orders(
	State(state): State<AppState>,
	Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Order>>, APIError> {
	let Some(query) = SearchQuery::parse(&params.q) else {
		return Ok(Json(Vec::new()));
	};

	let orders = state
		.engine
		.search(query.as_str())
		.await
		.map_err(api_error)?;
	Ok(Json(orders))
}

/// Handles GET /api/orders/view.
pub async fn view_orders(
	State(state): State<AppState>,
	Query(params): Query<ViewParams>,
) -> Result<Json<OrderViewResponse>, APIError> {
	let filter = match params.filter.as_deref() {
		Some(filter) => filter
			.parse::<StatusFilter>()
			.map_err(|e| invalid_status(e.to_string()))?,
		None => StatusFilter::All,
	};
	let query = SearchQuery::parse(&params.q);

	let projection = state
		.engine
		.view(query.as_ref(), filter)
		.await
		.map_err(api_error)?;

	Ok(Json(OrderViewResponse {
		orders: projection.orders,
		counts: projection.counts,
		countdowns: state.engine.countdowns().await,
	}))
}

/// Handles GET /api/orders/{id}.
pub async fn get_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, APIError> {
	let order = state.engine.get(&id).await.map_err(api_error)?;
	Ok(Json(order))
}

/// Handles PUT /api/orders/{id}/status.
pub async fn change_status(
	State(state): State<AppState>,
	Path(id): Path<String>,
	payload: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> Result<Json<Order>, APIError> {
	let Json(request) = payload.map_err(|rejection| invalid_status(rejection.body_text()))?;
	let target = request
		.status
		.parse::<OrderStatus>()
		.map_err(|e| invalid_status(e.to_string()))?;

	let order = state
		.engine
		.transition(&id, target)
		.await
		.map_err(api_error)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/undo.
pub async fn undo_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, APIError> {
	let order = state.engine.undo(&id).await.map_err(api_error)?;
	Ok(Json(order))
}

/// Handles DELETE /api/orders/{id}. Succeeds whether or not the order exists.
pub async fn delete_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<MessageResponse>, APIError> {
	state.engine.delete(&id).await.map_err(api_error)?;
	Ok(Json(MessageResponse {
		message: "Order deleted".to_string(),
	}))
}

/// Handles GET /api/countdowns.
pub async fn list_countdowns(State(state): State<AppState>) -> Json<HashMap<String, u64>> {
	Json(state.engine.countdowns().await)
}

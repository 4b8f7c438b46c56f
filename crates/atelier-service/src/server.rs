//! HTTP server for the atelier API.
//!
//! This module builds the axum router exposing the lifecycle engine under
//! `/api` and serves it on the configured address.

use crate::apis::order;
use atelier_config::{ApiConfig, CorsConfig};
use atelier_core::LifecycleEngine;
use atelier_types::MessageResponse;
use axum::{
	http::{HeaderValue, Method},
	response::Json,
	routing::{get, post, put},
	Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the lifecycle engine for processing requests.
	pub engine: Arc<LifecycleEngine>,
}

/// Builds the API router with its middleware.
pub fn router(engine: Arc<LifecycleEngine>, cors: Option<&CorsConfig>) -> Router {
	let api = Router::new()
		.route("/", get(handle_banner))
		.route("/health", get(handle_health))
		.route("/orders", post(order::create_order).get(order::list_orders))
		.route("/orders/search", get(order::search_orders))
		.route("/orders/view", get(order::view_orders))
		.route(
			"/orders/{id}",
			get(order::get_order).delete(order::delete_order),
		)
		.route("/orders/{id}/status", put(order::change_status))
		.route("/orders/{id}/undo", post(order::undo_order))
		.route("/countdowns", get(order::list_countdowns));

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(cors)),
		)
		.with_state(AppState { engine })
}

/// Builds the CORS layer; a missing section or a `*` origin allows any
/// origin.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};
	if cors.allowed_origins.iter().any(|origin| origin == "*") {
		return CorsLayer::permissive();
	}

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match HeaderValue::from_str(origin) {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
		.allow_headers(Any)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<LifecycleEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, api_config.cors.as_ref());

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Atelier API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles GET /api.
async fn handle_banner() -> Json<MessageResponse> {
	Json(MessageResponse {
		message: "Atelier order tracker API".to_string(),
	})
}

/// Handles GET /api/health.
async fn handle_health() -> Json<MessageResponse> {
	Json(MessageResponse {
		message: "ok".to_string(),
	})
}

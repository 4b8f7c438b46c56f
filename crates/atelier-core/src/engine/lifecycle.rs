//! Lifecycle management for the lifecycle engine.
//!
//! Handles initialization and shutdown procedures. Countdowns live only in
//! memory, so orders found `delivered` at startup stay until deleted.

use super::{EngineError, LifecycleEngine};
use atelier_types::OrderStatus;

impl LifecycleEngine {
	/// Checks that the store is reachable and reports what it holds.
	pub async fn initialize(&self) -> Result<(), super::LifecycleError> {
		tracing::info!("Initializing lifecycle engine");

		let orders = self.list().await?;
		let delivered = orders
			.iter()
			.filter(|order| order.status == OrderStatus::Delivered)
			.count();
		tracing::info!(orders = orders.len(), delivered, "Loaded order store");
		if delivered > 0 {
			tracing::warn!(
				delivered,
				"Delivered orders from a previous run have no countdown and stay until deleted"
			);
		}
		Ok(())
	}

	/// Stops the event loop and cancels every running countdown.
	///
	/// Expiry handlers already in flight still complete; `run` returns once
	/// they have.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down lifecycle engine");

		self.shutdown.send_replace(true);
		let cancelled = self.scheduler.cancel_all().await;
		if cancelled > 0 {
			tracing::info!(cancelled, "Cancelled running countdowns");
		}
		Ok(())
	}
}

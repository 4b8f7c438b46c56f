//! Lifecycle engine that owns every order mutation.
//!
//! This module contains the LifecycleEngine struct which validates status
//! changes against the state machine, persists them through the order store,
//! drives the delivered-order countdown and archives orders whose countdown
//! runs out. Mutations of one order are serialized through a per-order lock;
//! different orders proceed concurrently.

pub mod event_bus;
pub mod lifecycle;

use crate::countdown::{CountdownScheduler, Expiry};
use crate::projector::{project, Projection, SearchQuery};
use crate::state::{check_advance, check_undo, TransitionError};
use atelier_config::LifecycleConfig;
use atelier_storage::{OrderStore, OrderUpdate, StorageError};
use atelier_types::{
	truncate_id, DeletionReason, NewOrder, Order, OrderEvent, OrderStatus, OrderValidationError,
	StatusFilter,
};
use dashmap::DashMap;
use event_bus::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinSet;
use tracing::instrument;

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error("Validation error: {0}")]
	Validation(#[from] OrderValidationError),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order is already {0}, there is nothing to undo")]
	NoPreviousStatus(OrderStatus),
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Order store unavailable: {0}")]
	StoreUnavailable(String),
}

/// Coarse classification of a [`LifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Validation,
	InvalidTransition,
	NotFound,
	StoreUnavailable,
}

impl LifecycleError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Validation(_) => ErrorKind::Validation,
			Self::InvalidTransition { .. } | Self::NoPreviousStatus(_) => {
				ErrorKind::InvalidTransition
			},
			Self::NotFound(_) => ErrorKind::NotFound,
			Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
		}
	}
}

impl From<TransitionError> for LifecycleError {
	fn from(err: TransitionError) -> Self {
		match err {
			TransitionError::NotNext { from, to } => Self::InvalidTransition { from, to },
			TransitionError::NoPrevious(status) => Self::NoPreviousStatus(status),
		}
	}
}

/// Maps a store failure for `order_id` onto the lifecycle taxonomy.
fn store_error(order_id: &str) -> impl FnOnce(StorageError) -> LifecycleError + '_ {
	move |err| match err {
		StorageError::NotFound => LifecycleError::NotFound(order_id.to_string()),
		other => LifecycleError::StoreUnavailable(other.to_string()),
	}
}

/// Errors raised by the engine's event loop.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Engine is already running")]
	AlreadyRunning,
}

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 1000;

/// Seconds before a failed archival is attempted again.
const EXPIRY_RETRY_SECONDS: u64 = 5;

/// Main engine driving the order lifecycle.
#[derive(Clone)]
pub struct LifecycleEngine {
	/// Countdown and tick settings.
	pub(crate) settings: LifecycleConfig,
	/// Persistent order store.
	pub(crate) store: Arc<dyn OrderStore>,
	/// Timers for delivered orders.
	pub(crate) scheduler: Arc<CountdownScheduler>,
	/// Event bus for lifecycle observers.
	pub(crate) event_bus: EventBus,
	/// One async lock per order id currently being mutated.
	locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
	/// Expiry receiver, taken by the first call to `run`.
	expiries: Arc<Mutex<Option<mpsc::UnboundedReceiver<Expiry>>>>,
	/// Signals the event loop to stop.
	shutdown: Arc<watch::Sender<bool>>,
}

impl LifecycleEngine {
	/// Creates an engine over `store` using the given lifecycle settings.
	pub fn new(store: Arc<dyn OrderStore>, settings: LifecycleConfig) -> Self {
		let (scheduler, expiries) = CountdownScheduler::new(settings.tick_interval());
		let (shutdown, _) = watch::channel(false);

		Self {
			settings,
			store,
			scheduler: Arc::new(scheduler),
			event_bus: EventBus::new(EVENT_CAPACITY),
			locks: Arc::new(DashMap::new()),
			expiries: Arc::new(Mutex::new(Some(expiries))),
			shutdown: Arc::new(shutdown),
		}
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Returns the lifecycle settings.
	pub fn settings(&self) -> &LifecycleConfig {
		&self.settings
	}

	/// Validates and stores a new order in `pending`.
	#[instrument(skip_all)]
	pub async fn create(&self, new_order: NewOrder) -> Result<Order, LifecycleError> {
		let order = Order::from_new(new_order.validate()?);

		self.store
			.insert(&order)
			.await
			.map_err(store_error(&order.id))?;

		tracing::info!(order_id = %truncate_id(&order.id), "Order created");
		self.publish(OrderEvent::Created {
			order: order.clone(),
		});
		Ok(order)
	}

	/// Loads a single order.
	pub async fn get(&self, order_id: &str) -> Result<Order, LifecycleError> {
		self.store.get(order_id).await.map_err(store_error(order_id))
	}

	/// Returns every order, newest first.
	pub async fn list(&self) -> Result<Vec<Order>, LifecycleError> {
		self.store
			.all()
			.await
			.map_err(|e| LifecycleError::StoreUnavailable(e.to_string()))
	}

	/// Returns orders whose client name contains `query`, ignoring case,
	/// newest first.
	pub async fn search(&self, query: &str) -> Result<Vec<Order>, LifecycleError> {
		self.store
			.find_by_client_name(query)
			.await
			.map_err(|e| LifecycleError::StoreUnavailable(e.to_string()))
	}

	/// Moves an order one step forward to `target`.
	///
	/// Entering `delivered` arms the countdown, replacing any countdown
	/// already running for the order.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), target = %target))]
	pub async fn transition(
		&self,
		order_id: &str,
		target: OrderStatus,
	) -> Result<Order, LifecycleError> {
		let _guard = self.lock_order(order_id).await;

		let current = self.load_locked(order_id).await?;
		check_advance(current.status, target)?;

		let updated = self
			.store
			.update(order_id, OrderUpdate::status(target))
			.await
			.map_err(store_error(order_id))?;

		if target == OrderStatus::Delivered {
			let seconds = self.settings.countdown_seconds;
			self.scheduler.arm(order_id, seconds).await;
			tracing::info!(seconds, "Countdown armed");
			self.publish(OrderEvent::CountdownArmed {
				order_id: order_id.to_string(),
				seconds,
			});
		}

		tracing::info!(from = %current.status, "Order advanced");
		self.publish(OrderEvent::Advanced {
			order: updated.clone(),
			from: current.status,
		});
		Ok(updated)
	}

	/// Moves an order one step back, cancelling its countdown.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn undo(&self, order_id: &str) -> Result<Order, LifecycleError> {
		let _guard = self.lock_order(order_id).await;

		let current = self.load_locked(order_id).await?;
		let previous = check_undo(current.status)?;

		let updated = self
			.store
			.update(order_id, OrderUpdate::status(previous))
			.await
			.map_err(store_error(order_id))?;

		if self.scheduler.cancel(order_id).await {
			tracing::info!("Countdown cancelled");
			self.publish(OrderEvent::CountdownCancelled {
				order_id: order_id.to_string(),
			});
		}

		tracing::info!(from = %current.status, to = %previous, "Order reverted");
		self.publish(OrderEvent::Reverted {
			order: updated.clone(),
			from: current.status,
		});
		Ok(updated)
	}

	/// Removes an order and its countdown. Deleting an order that does not
	/// exist succeeds.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn delete(&self, order_id: &str) -> Result<(), LifecycleError> {
		let _guard = self.lock_order(order_id).await;

		let existed = match self.store.delete(order_id).await {
			Ok(()) => true,
			Err(StorageError::NotFound) => false,
			Err(e) => return Err(LifecycleError::StoreUnavailable(e.to_string())),
		};

		if self.scheduler.cancel(order_id).await {
			tracing::debug!("Countdown cancelled by delete");
			self.publish(OrderEvent::CountdownCancelled {
				order_id: order_id.to_string(),
			});
		}
		self.release_lock(order_id);

		if existed {
			tracing::info!("Order deleted");
			self.publish(OrderEvent::Deleted {
				order_id: order_id.to_string(),
				reason: DeletionReason::Manual,
			});
		} else {
			tracing::debug!("Delete of unknown order ignored");
		}
		Ok(())
	}

	/// Seconds remaining on every running countdown, by order id.
	pub async fn countdowns(&self) -> HashMap<String, u64> {
		self.scheduler.snapshot().await
	}

	/// Seconds remaining on the countdown of one order, if it has one.
	pub async fn countdown(&self, order_id: &str) -> Option<u64> {
		self.scheduler.remaining(order_id).await
	}

	/// Reads the full order set and projects it through `query` and `filter`.
	///
	/// Search and counts are computed from the same read of the store.
	pub async fn view(
		&self,
		query: Option<&SearchQuery>,
		filter: StatusFilter,
	) -> Result<Projection, LifecycleError> {
		let all = self.list().await?;
		let searched: Option<Vec<Order>> = query.map(|query| {
			all.iter()
				.filter(|order| query.matches(order))
				.cloned()
				.collect()
		});
		Ok(project(&all, searched.as_deref(), filter))
	}

	/// Runs the event loop until [`shutdown`](Self::shutdown) is called,
	/// archiving orders whose countdown runs out.
	///
	/// Returns once every expiry handler already started has finished.
	pub async fn run(&self) -> Result<(), EngineError> {
		let mut expiries = self
			.expiries
			.lock()
			.await
			.take()
			.ok_or(EngineError::AlreadyRunning)?;
		let mut shutdown = self.shutdown.subscribe();
		let mut handlers = JoinSet::new();

		loop {
			let stopped = *shutdown.borrow_and_update();
			if stopped {
				break;
			}

			tokio::select! {
				Some(expiry) = expiries.recv() => {
					let engine = self.clone();
					handlers.spawn(async move {
						engine.handle_expiry(expiry).await;
					});
				}

				Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
					if let Err(e) = joined {
						tracing::error!(error = %e, "Expiry handler failed");
					}
				}

				changed = shutdown.changed() => {
					if changed.is_err() {
						break;
					}
				}
			}
		}

		while let Some(joined) = handlers.join_next().await {
			if let Err(e) = joined {
				tracing::error!(error = %e, "Expiry handler failed");
			}
		}

		let cancelled = self.scheduler.cancel_all().await;
		tracing::info!(cancelled, "Lifecycle engine stopped");
		Ok(())
	}

	/// Deletes an order whose countdown ran out.
	///
	/// The order is only removed if it is still delivered and no newer
	/// countdown was armed for it in the meantime. If the store fails, the
	/// countdown is armed again for a short retry window.
	#[instrument(skip_all, fields(order_id = %truncate_id(&expiry.order_id), generation = expiry.generation))]
	async fn handle_expiry(&self, expiry: Expiry) {
		let order_id = expiry.order_id.as_str();
		let _guard = self.lock_order(order_id).await;

		if let Some(current) = self.scheduler.generation(order_id).await {
			if current != expiry.generation {
				tracing::debug!(current, "Countdown was re-armed, ignoring stale expiry");
				return;
			}
		}

		match self.store.get(order_id).await {
			Ok(order) if order.status == OrderStatus::Delivered => {},
			Ok(order) => {
				tracing::debug!(status = %order.status, "Order left delivered, ignoring expiry");
				return;
			},
			Err(StorageError::NotFound) => {
				tracing::debug!("Order already gone, ignoring expiry");
				self.release_lock(order_id);
				return;
			},
			Err(e) => {
				tracing::warn!(error = %e, "Failed to load expired order");
				self.retry_expiry(order_id).await;
				return;
			},
		}

		match self.store.delete(order_id).await {
			Ok(()) | Err(StorageError::NotFound) => {
				self.release_lock(order_id);
				tracing::info!("Delivered order archived after countdown");
				self.publish(OrderEvent::Deleted {
					order_id: order_id.to_string(),
					reason: DeletionReason::Expired,
				});
			},
			Err(e) => {
				tracing::warn!(error = %e, "Failed to archive expired order");
				self.retry_expiry(order_id).await;
			},
		}
	}

	/// Arms a short countdown for an order whose archival failed. Must be
	/// called while holding the order's lock.
	async fn retry_expiry(&self, order_id: &str) {
		if *self.shutdown.borrow() {
			return;
		}

		let seconds = EXPIRY_RETRY_SECONDS;
		self.scheduler.arm(order_id, seconds).await;
		tracing::info!(seconds, "Archival retry scheduled");
		self.publish(OrderEvent::CountdownArmed {
			order_id: order_id.to_string(),
			seconds,
		});
	}

	/// Loads an order while its lock is held, dropping the lock entry again
	/// if the order does not exist.
	async fn load_locked(&self, order_id: &str) -> Result<Order, LifecycleError> {
		let result = self.get(order_id).await;
		if matches!(result, Err(LifecycleError::NotFound(_))) {
			self.release_lock(order_id);
		}
		result
	}

	/// Acquires the lock serializing mutations of `order_id`.
	async fn lock_order(&self, order_id: &str) -> OwnedMutexGuard<()> {
		let lock = self
			.locks
			.entry(order_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();
		lock.lock_owned().await
	}

	/// Drops the lock entry of a removed order unless someone else is
	/// waiting on it. Must be called while holding the guard.
	fn release_lock(&self, order_id: &str) {
		// One reference in the map, one held by the caller's guard.
		self.locks
			.remove_if(order_id, |_, lock| Arc::strong_count(lock) == 2);
	}

	fn publish(&self, event: OrderEvent) {
		// No subscriber is not an error
		self.event_bus.publish(event).ok();
	}
}

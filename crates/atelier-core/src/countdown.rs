//! Countdown scheduler for delivered orders.
//!
//! Each delivered order owns at most one timer. A timer is a spawned task
//! that decrements the order's counter once per tick and, when the counter
//! reaches zero, removes its record and reports the expiry on a channel the
//! engine consumes. Every arm gets a fresh generation; a tick only acts on
//! the record carrying its own generation, so a replaced timer can never
//! touch its successor.

use atelier_types::truncate_id;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Notification that a countdown ran out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
	pub order_id: String,
	/// Generation of the arm that expired.
	pub generation: u64,
}

struct Timer {
	generation: u64,
	remaining: u64,
	handle: JoinHandle<()>,
}

type TimerTable = Arc<Mutex<HashMap<String, Timer>>>;

/// Owns the live countdown timers, keyed by order id.
pub struct CountdownScheduler {
	tick: Duration,
	timers: TimerTable,
	next_generation: AtomicU64,
	expiry_tx: mpsc::UnboundedSender<Expiry>,
}

impl CountdownScheduler {
	/// Creates a scheduler ticking every `tick`, together with the receiver
	/// on which expiries are delivered.
	pub fn new(tick: Duration) -> (Self, mpsc::UnboundedReceiver<Expiry>) {
		let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
		let scheduler = Self {
			tick,
			timers: Arc::new(Mutex::new(HashMap::new())),
			next_generation: AtomicU64::new(1),
			expiry_tx,
		};
		(scheduler, expiry_rx)
	}

	/// Starts a countdown of `seconds` ticks for `order_id`, replacing any
	/// countdown already running for it. Returns the new generation.
	pub async fn arm(&self, order_id: &str, seconds: u64) -> u64 {
		let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

		// The table stays locked until the record is inserted, so the new
		// task cannot observe the table without it.
		let mut timers = self.timers.lock().await;
		let handle = tokio::spawn(run_timer(
			self.timers.clone(),
			order_id.to_string(),
			generation,
			self.tick,
			self.expiry_tx.clone(),
		));

		let replaced = timers.insert(
			order_id.to_string(),
			Timer {
				generation,
				remaining: seconds,
				handle,
			},
		);
		if let Some(old) = replaced {
			old.handle.abort();
			tracing::debug!(
				order_id = %truncate_id(order_id),
				replaced_generation = old.generation,
				"Replaced running countdown"
			);
		}

		generation
	}

	/// Stops the countdown for `order_id`. Returns false if none was running.
	pub async fn cancel(&self, order_id: &str) -> bool {
		let mut timers = self.timers.lock().await;
		match timers.remove(order_id) {
			Some(timer) => {
				timer.handle.abort();
				true
			},
			None => false,
		}
	}

	/// Stops every countdown at once. Returns how many were running.
	pub async fn cancel_all(&self) -> usize {
		let mut timers = self.timers.lock().await;
		let count = timers.len();
		for (_, timer) in timers.drain() {
			timer.handle.abort();
		}
		count
	}

	/// Seconds left on the countdown for `order_id`, if one is running.
	pub async fn remaining(&self, order_id: &str) -> Option<u64> {
		self.timers
			.lock()
			.await
			.get(order_id)
			.map(|timer| timer.remaining)
	}

	/// Generation of the countdown running for `order_id`, if any.
	pub async fn generation(&self, order_id: &str) -> Option<u64> {
		self.timers
			.lock()
			.await
			.get(order_id)
			.map(|timer| timer.generation)
	}

	pub async fn is_armed(&self, order_id: &str) -> bool {
		self.timers.lock().await.contains_key(order_id)
	}

	/// Seconds left on every running countdown.
	pub async fn snapshot(&self) -> HashMap<String, u64> {
		self.timers
			.lock()
			.await
			.iter()
			.map(|(id, timer)| (id.clone(), timer.remaining))
			.collect()
	}

	/// Number of running countdowns.
	pub async fn len(&self) -> usize {
		self.timers.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}

impl Drop for CountdownScheduler {
	fn drop(&mut self) {
		if let Ok(mut timers) = self.timers.try_lock() {
			for (_, timer) in timers.drain() {
				timer.handle.abort();
			}
		}
	}
}

async fn run_timer(
	timers: TimerTable,
	order_id: String,
	generation: u64,
	tick: Duration,
	expiry_tx: mpsc::UnboundedSender<Expiry>,
) {
	let mut interval = interval_at(Instant::now() + tick, tick);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		interval.tick().await;

		let mut table = timers.lock().await;
		let Some(timer) = table.get_mut(&order_id) else {
			return;
		};
		if timer.generation != generation {
			return;
		}

		timer.remaining = timer.remaining.saturating_sub(1);
		if timer.remaining > 0 {
			continue;
		}

		table.remove(&order_id);
		drop(table);

		tracing::debug!(order_id = %truncate_id(&order_id), generation, "Countdown expired");
		if expiry_tx
			.send(Expiry {
				order_id,
				generation,
			})
			.is_err()
		{
			tracing::warn!("Countdown expired with no engine listening");
		}
		return;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const TICK: Duration = Duration::from_secs(1);

	#[tokio::test(start_paused = true)]
	async fn test_fires_once_after_window() {
		let (scheduler, mut expiries) = CountdownScheduler::new(TICK);
		let generation = scheduler.arm("order-1", 3).await;

		tokio::time::sleep(Duration::from_millis(2_500)).await;
		assert_eq!(scheduler.remaining("order-1").await, Some(1));
		assert!(expiries.try_recv().is_err());

		tokio::time::sleep(Duration::from_secs(1)).await;
		assert_eq!(
			expiries.try_recv().unwrap(),
			Expiry {
				order_id: "order-1".to_string(),
				generation,
			}
		);
		assert!(!scheduler.is_armed("order-1").await);

		tokio::time::sleep(Duration::from_secs(10)).await;
		assert!(expiries.try_recv().is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_counts_down_one_per_tick() {
		let (scheduler, _expiries) = CountdownScheduler::new(TICK);
		scheduler.arm("order-1", 60).await;
		tokio::time::sleep(Duration::from_millis(500)).await;

		for expected in [59, 58, 57] {
			tokio::time::sleep(TICK).await;
			assert_eq!(scheduler.remaining("order-1").await, Some(expected));
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancel_prevents_expiry() {
		let (scheduler, mut expiries) = CountdownScheduler::new(TICK);
		scheduler.arm("order-1", 2).await;

		tokio::time::sleep(Duration::from_millis(1_500)).await;
		assert!(scheduler.cancel("order-1").await);
		assert!(!scheduler.cancel("order-1").await);

		tokio::time::sleep(Duration::from_secs(5)).await;
		assert!(expiries.try_recv().is_err());
		assert!(scheduler.is_empty().await);
	}

	#[tokio::test(start_paused = true)]
	async fn test_rearm_replaces_existing_timer() {
		let (scheduler, mut expiries) = CountdownScheduler::new(TICK);
		let first = scheduler.arm("order-1", 3).await;

		tokio::time::sleep(Duration::from_millis(2_500)).await;
		let second = scheduler.arm("order-1", 3).await;
		assert_ne!(first, second);
		assert_eq!(scheduler.len().await, 1);
		assert_eq!(scheduler.remaining("order-1").await, Some(3));
		assert_eq!(scheduler.generation("order-1").await, Some(second));

		// The first arm would have expired here.
		tokio::time::sleep(Duration::from_secs(1)).await;
		assert!(expiries.try_recv().is_err());

		tokio::time::sleep(Duration::from_millis(2_500)).await;
		let expiry = expiries.try_recv().unwrap();
		assert_eq!(expiry.generation, second);
		assert!(expiries.try_recv().is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_timers_are_independent() {
		let (scheduler, mut expiries) = CountdownScheduler::new(TICK);
		scheduler.arm("a", 1).await;
		scheduler.arm("b", 5).await;

		tokio::time::sleep(Duration::from_millis(1_500)).await;
		assert_eq!(expiries.try_recv().unwrap().order_id, "a");

		let snapshot = scheduler.snapshot().await;
		assert_eq!(snapshot.len(), 1);
		assert_eq!(snapshot.get("b"), Some(&4));
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancel_all() {
		let (scheduler, mut expiries) = CountdownScheduler::new(TICK);
		for id in ["a", "b", "c"] {
			scheduler.arm(id, 2).await;
		}

		assert_eq!(scheduler.cancel_all().await, 3);
		assert!(scheduler.is_empty().await);

		tokio::time::sleep(Duration::from_secs(5)).await;
		assert!(expiries.try_recv().is_err());
	}
}

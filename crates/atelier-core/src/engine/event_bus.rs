//! Broadcast bus for order lifecycle events.
//!
//! Publishing never blocks and never fails an operation: with no subscriber
//! the event is simply dropped, and slow subscribers lag rather than stall
//! the engine.

use atelier_types::OrderEvent;
use tokio::sync::broadcast;

/// Cloneable handle to the engine's event channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Returns a receiver that sees every event published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event, returning how many subscribers received it.
	pub fn publish(&self, event: OrderEvent) -> Result<usize, broadcast::error::SendError<OrderEvent>> {
		self.sender.send(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_publish_without_subscribers_is_err() {
		let bus = EventBus::new(4);
		let event = OrderEvent::CountdownCancelled {
			order_id: "a".to_string(),
		};
		assert!(bus.publish(event).is_err());
	}

	#[tokio::test]
	async fn test_subscribers_receive_events() {
		let bus = EventBus::new(4);
		let mut first = bus.subscribe();
		let mut second = bus.clone().subscribe();

		let event = OrderEvent::CountdownArmed {
			order_id: "a".to_string(),
			seconds: 60,
		};
		assert_eq!(bus.publish(event.clone()).unwrap(), 2);
		assert_eq!(first.recv().await.unwrap(), event);
		assert_eq!(second.recv().await.unwrap(), event);
	}
}

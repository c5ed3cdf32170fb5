//! Event bus for intra-engine communication.
//!
//! Order operations publish events here after their mutation commits; the
//! engine's run loop consumes them and drives notification side effects.
//! Publishing never blocks and never fails the publisher: with no active
//! subscriber the event is simply dropped, which matches the
//! fire-and-forget contract of the side effects hanging off it.

use fulfillment_types::EngineEvent;
use tokio::sync::broadcast;

/// Broadcast-channel event bus shared by the engine's components.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
	/// Creates a bus with the given channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns the subscriber count, or an error when nobody is
	/// listening; callers ignore the result by convention.
	pub fn publish(
		&self,
		event: EngineEvent,
	) -> Result<usize, Box<broadcast::error::SendError<EngineEvent>>> {
		self.sender.send(event).map_err(Box::new)
	}

	/// Creates a new subscription receiving all events published from
	/// this point on.
	pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_types::OrderEvent;

	#[tokio::test]
	async fn publish_without_subscribers_is_harmless() {
		let bus = EventBus::new(8);
		let event = EngineEvent::Order(OrderEvent::ReturnApproved {
			order: crate::orders::tests::fixture_order(),
		});
		assert!(bus.publish(event).is_err());
	}

	#[tokio::test]
	async fn subscribers_receive_published_events() {
		let bus = EventBus::new(8);
		let mut receiver = bus.subscribe();
		let event = EngineEvent::Order(OrderEvent::ReturnApproved {
			order: crate::orders::tests::fixture_order(),
		});
		bus.publish(event).unwrap();
		assert!(matches!(
			receiver.recv().await.unwrap(),
			EngineEvent::Order(OrderEvent::ReturnApproved { .. })
		));
	}
}

//! Broadcast event bus for dispatch lifecycle events.

use courier_types::DispatchEvent;
use tokio::sync::broadcast;

/// Event bus carrying `DispatchEvent`s from the orchestrator to any listener.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
	/// Creates an event bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to all events published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: DispatchEvent,
	) -> Result<(), broadcast::error::SendError<DispatchEvent>> {
		self.sender.send(event).map(|_| ())
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1000)
	}
}

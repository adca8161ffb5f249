//! Order directory module for the courier dispatch system.
//!
//! The order directory owns order retrieval and kitchen status transitions.
//! The dispatch layer only needs a continuously updated view of the current
//! order list, which this module provides as a `watch` channel regardless of
//! whether the underlying directory pushes updates or has to be polled.

use async_trait::async_trait;
use courier_types::{ConfigSchema, ImplementationRegistry, Order};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors that can occur during order directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when the directory returns an unreadable order list.
	#[error("Invalid order data: {0}")]
	InvalidData(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// The directory has already been started.
	#[error("Order directory already started")]
	AlreadyStarted,
}

/// Trait defining the interface for order directories.
#[async_trait]
pub trait OrderDirectoryInterface: Send + Sync {
	/// Returns the configuration schema for this directory implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Fetches the current order list.
	async fn fetch_orders(&self) -> Result<Vec<Order>, DirectoryError>;

	/// Returns a push subscription if the directory delivers updates itself.
	///
	/// Directories returning `None` are polled.
	fn subscribe(&self) -> Option<watch::Receiver<Vec<Order>>> {
		None
	}
}

/// Type alias for order directory factory functions.
pub type DirectoryFactory =
	fn(&toml::Value) -> Result<Box<dyn OrderDirectoryInterface>, DirectoryError>;

/// Registry trait for order directory implementations.
pub trait DirectoryRegistry: ImplementationRegistry<Factory = DirectoryFactory> {}

/// Get all registered order directory implementations.
pub fn get_all_implementations() -> Vec<(&'static str, DirectoryFactory)> {
	use implementations::{http, memory};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Service that turns an order directory into a live order feed.
pub struct OrderDirectory {
	implementation: std::sync::Arc<dyn OrderDirectoryInterface>,
	poll_interval: Duration,
	poller: Mutex<Option<JoinHandle<()>>>,
}

impl OrderDirectory {
	pub fn new(implementation: Box<dyn OrderDirectoryInterface>, poll_interval: Duration) -> Self {
		Self {
			implementation: implementation.into(),
			poll_interval,
			poller: Mutex::new(None),
		}
	}

	/// Starts the order feed.
	///
	/// Push directories hand out their own subscription. Other directories are
	/// fetched once up front and then polled in a background task, which only
	/// notifies subscribers when the order list actually changed.
	pub async fn start(&self) -> Result<watch::Receiver<Vec<Order>>, DirectoryError> {
		if let Some(receiver) = self.implementation.subscribe() {
			tracing::info!(component = "orders", mode = "push", "Order feed started");
			return Ok(receiver);
		}

		let mut poller = self.poller.lock().await;
		if poller.is_some() {
			return Err(DirectoryError::AlreadyStarted);
		}

		let initial = self.implementation.fetch_orders().await?;
		let (sender, receiver) = watch::channel(initial);

		let implementation = self.implementation.clone();
		let mut interval = tokio::time::interval(self.poll_interval);
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		*poller = Some(tokio::spawn(async move {
			// First tick completes immediately and the initial list is already sent
			interval.tick().await;
			loop {
				interval.tick().await;
				match implementation.fetch_orders().await {
					Ok(orders) => {
						sender.send_if_modified(|current| {
							if *current == orders {
								false
							} else {
								*current = orders;
								true
							}
						});
					},
					Err(e) => {
						tracing::warn!(component = "orders", error = %e, "Failed to refresh orders");
					},
				}
				if sender.is_closed() {
					break;
				}
			}
		}));

		tracing::info!(
			component = "orders",
			mode = "poll",
			interval_secs = self.poll_interval.as_secs(),
			"Order feed started"
		);
		Ok(receiver)
	}

	/// Stops background polling, if any.
	pub async fn stop(&self) {
		if let Some(handle) = self.poller.lock().await.take() {
			handle.abort();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_types::{KitchenStatus, Schema, ValidationError};

	struct ScriptedDirectory {
		lists: std::sync::Mutex<Vec<Vec<Order>>>,
	}

	impl ScriptedDirectory {
		fn new(lists: Vec<Vec<Order>>) -> Self {
			Self {
				lists: std::sync::Mutex::new(lists),
			}
		}
	}

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	#[async_trait]
	impl OrderDirectoryInterface for ScriptedDirectory {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn fetch_orders(&self) -> Result<Vec<Order>, DirectoryError> {
			let mut lists = self.lists.lock().unwrap();
			if lists.len() > 1 {
				Ok(lists.remove(0))
			} else {
				Ok(lists.first().cloned().unwrap_or_default())
			}
		}
	}

	fn order(id: &str, status: KitchenStatus) -> Order {
		Order {
			id: id.to_string(),
			status,
			delivery_info: None,
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_polled_directory_publishes_changes() {
		let directory = OrderDirectory::new(
			Box::new(ScriptedDirectory::new(vec![
				vec![order("O1", KitchenStatus::Preparing)],
				vec![order("O1", KitchenStatus::Preparing)],
				vec![order("O1", KitchenStatus::Ready)],
			])),
			Duration::from_secs(5),
		);

		let mut receiver = directory.start().await.unwrap();
		assert_eq!(receiver.borrow_and_update()[0].status, KitchenStatus::Preparing);

		// Unchanged list on the first poll, ready on the second
		receiver.changed().await.unwrap();
		assert_eq!(receiver.borrow_and_update()[0].status, KitchenStatus::Ready);

		directory.stop().await;
	}

	#[tokio::test]
	async fn test_second_start_rejected_for_polled_directory() {
		let directory = OrderDirectory::new(
			Box::new(ScriptedDirectory::new(vec![vec![]])),
			Duration::from_secs(5),
		);
		let _receiver = directory.start().await.unwrap();
		assert!(matches!(
			directory.start().await,
			Err(DirectoryError::AlreadyStarted)
		));
		directory.stop().await;
	}

	#[tokio::test]
	async fn test_push_directory_uses_own_subscription() {
		let memory = implementations::memory::MemoryDirectory::default();
		let directory = OrderDirectory::new(Box::new(memory.clone()), Duration::from_secs(5));

		let mut receiver = directory.start().await.unwrap();
		memory.set_orders(vec![order("O7", KitchenStatus::Pending)]);
		receiver.changed().await.unwrap();
		assert_eq!(receiver.borrow()[0].id, "O7");
	}
}

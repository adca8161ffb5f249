//! In-memory order directory.
//!
//! Holds the order list in a `watch` channel and pushes every replacement to
//! subscribers. Used in development, in tests, and when the terminal receives
//! orders through its own API.

use crate::{DirectoryError, DirectoryFactory, DirectoryRegistry, OrderDirectoryInterface};
use async_trait::async_trait;
use courier_types::{ConfigSchema, ImplementationRegistry, Order, Schema, ValidationError};
use std::sync::Arc;
use tokio::sync::watch;

/// In-memory order directory with push updates.
///
/// Cloning yields a handle to the same order list.
#[derive(Clone)]
pub struct MemoryDirectory {
	sender: Arc<watch::Sender<Vec<Order>>>,
}

impl MemoryDirectory {
	pub fn new(orders: Vec<Order>) -> Self {
		Self {
			sender: Arc::new(watch::Sender::new(orders)),
		}
	}

	/// Replaces the whole order list.
	pub fn set_orders(&self, orders: Vec<Order>) {
		self.sender.send_replace(orders);
	}

	/// Inserts an order or replaces the order with the same id.
	pub fn upsert(&self, order: Order) {
		self.sender.send_modify(|orders| {
			match orders.iter_mut().find(|existing| existing.id == order.id) {
				Some(existing) => *existing = order,
				None => orders.push(order),
			}
		});
	}

	/// Removes an order, returning true if it was present.
	pub fn remove(&self, order_id: &str) -> bool {
		self.sender.send_if_modified(|orders| {
			let before = orders.len();
			orders.retain(|order| order.id != order_id);
			orders.len() != before
		})
	}

	pub fn orders(&self) -> Vec<Order> {
		self.sender.borrow().clone()
	}
}

impl Default for MemoryDirectory {
	fn default() -> Self {
		Self::new(Vec::new())
	}
}

#[async_trait]
impl OrderDirectoryInterface for MemoryDirectory {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryDirectorySchema)
	}

	async fn fetch_orders(&self) -> Result<Vec<Order>, DirectoryError> {
		Ok(self.orders())
	}

	fn subscribe(&self) -> Option<watch::Receiver<Vec<Order>>> {
		Some(self.sender.subscribe())
	}
}

/// Configuration schema for MemoryDirectory.
pub struct MemoryDirectorySchema;

impl ConfigSchema for MemoryDirectorySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory directory has no configuration
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory order directory.
pub fn create_directory(
	config: &toml::Value,
) -> Result<Box<dyn OrderDirectoryInterface>, DirectoryError> {
	MemoryDirectorySchema
		.validate(config)
		.map_err(|e| DirectoryError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryDirectory::default()))
}

/// Registry for the memory order directory implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = DirectoryFactory;

	fn factory() -> Self::Factory {
		create_directory
	}
}

impl DirectoryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_types::KitchenStatus;

	fn order(id: &str, status: KitchenStatus) -> Order {
		Order {
			id: id.to_string(),
			status,
			delivery_info: None,
		}
	}

	#[tokio::test]
	async fn test_upsert_and_remove() {
		let directory = MemoryDirectory::default();
		let mut receiver = directory.subscribe().unwrap();

		directory.upsert(order("O1", KitchenStatus::Pending));
		directory.upsert(order("O2", KitchenStatus::Preparing));
		directory.upsert(order("O1", KitchenStatus::Ready));
		assert!(receiver.has_changed().unwrap());

		let orders = directory.fetch_orders().await.unwrap();
		assert_eq!(orders.len(), 2);
		assert_eq!(orders[0].status, KitchenStatus::Ready);

		receiver.borrow_and_update();
		assert!(directory.remove("O2"));
		assert!(receiver.has_changed().unwrap());

		receiver.borrow_and_update();
		assert!(!directory.remove("O2"));
		assert!(!receiver.has_changed().unwrap());
	}
}

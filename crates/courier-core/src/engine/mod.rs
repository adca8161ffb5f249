//! Dispatch engine driving the orchestrator from the order feed.
//!
//! The engine observes two inputs, the live order list and the dispatch
//! policy, and hands every change to the orchestrator. It also logs the
//! orchestrator's events and stops the order feed on shutdown.

pub mod event_bus;
pub mod lifecycle;

use crate::dispatch::DispatchOrchestrator;
use courier_config::Config;
use courier_orders::OrderDirectory;
use courier_types::{truncate_id, DispatchEvent, DispatchPolicy};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Service error: {0}")]
	Service(String),
}

/// Main dispatch engine.
#[derive(Clone)]
pub struct DispatchEngine {
	/// Service configuration.
	pub(crate) config: Config,
	/// Dispatch orchestrator owning all per-order runtime state.
	pub(crate) orchestrator: Arc<DispatchOrchestrator>,
	/// Order directory providing the live order feed.
	pub(crate) directory: Arc<OrderDirectory>,
	/// Current dispatch policy; updates re-run auto-dispatch evaluation.
	pub(crate) policy: Arc<watch::Sender<DispatchPolicy>>,
	/// Event bus shared with the orchestrator.
	pub(crate) event_bus: event_bus::EventBus,
}

impl DispatchEngine {
	pub fn new(
		config: Config,
		orchestrator: Arc<DispatchOrchestrator>,
		directory: Arc<OrderDirectory>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let policy = Arc::new(watch::Sender::new(orchestrator.policy()));
		Self {
			config,
			orchestrator,
			directory,
			policy,
			event_bus,
		}
	}

	/// Runs the engine until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for shutdown signal");
			}
		})
		.await
	}

	/// Runs the engine until `shutdown` completes or the order feed closes.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		self.initialize().await?;

		let mut orders = self
			.directory
			.start()
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;
		let mut policy = self.policy.subscribe();
		let mut events = self.event_bus.subscribe();
		tokio::pin!(shutdown);

		let snapshot = orders.borrow_and_update().clone();
		self.orchestrator.sync_orders(&snapshot);
		let current = *policy.borrow_and_update();
		self.orchestrator.set_policy(current);

		loop {
			tokio::select! {
				changed = orders.changed() => {
					if changed.is_err() {
						tracing::warn!("Order feed closed");
						break;
					}
					let snapshot = orders.borrow_and_update().clone();
					self.orchestrator.sync_orders(&snapshot);
				}

				Ok(()) = policy.changed() => {
					let current = *policy.borrow_and_update();
					self.orchestrator.set_policy(current);
				}

				Ok(event) = events.recv() => {
					log_event(&event);
				}

				_ = &mut shutdown => {
					break;
				}
			}
		}

		self.shutdown().await
	}

	/// Replaces the dispatch policy.
	pub fn update_policy(&self, policy: DispatchPolicy) {
		self.policy.send_replace(policy);
	}

	pub fn policy(&self) -> DispatchPolicy {
		*self.policy.borrow()
	}

	pub fn orchestrator(&self) -> &Arc<DispatchOrchestrator> {
		&self.orchestrator
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}
}

fn log_event(event: &DispatchEvent) {
	match event {
		DispatchEvent::StateChanged { order_id, state } => {
			tracing::debug!(order_id = %truncate_id(order_id), state = %state, "Dispatch state changed");
		},
		DispatchEvent::QuoteReceived { order_id, quote } => {
			tracing::debug!(
				order_id = %truncate_id(order_id),
				provider = %quote.provider,
				fee = %quote.fee,
				"Quote held"
			);
		},
		DispatchEvent::Dispatched { order_id, result } => {
			tracing::info!(
				order_id = %truncate_id(order_id),
				delivery_id = %result.delivery_external_id,
				tracking_url = result.tracking_url.as_deref().unwrap_or("-"),
				"Courier on the way"
			);
		},
		DispatchEvent::Failed { order_id, error } => {
			tracing::warn!(order_id = %truncate_id(order_id), error = %error, "Dispatch failed");
		},
		DispatchEvent::Pruned { order_ids } => {
			tracing::debug!(count = order_ids.len(), "Dropped state for inactive orders");
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::EventBus;
	use courier_config::builders::config::ConfigBuilder;
	use courier_gateway::implementations::memory::MemoryGateway;
	use courier_gateway::{ExpiredQuoteClassifier, GatewayService};
	use courier_orders::implementations::memory::MemoryDirectory;
	use courier_types::{DeliveryInfo, DeliveryProvider, DispatchState, KitchenStatus, Order};
	use std::time::Duration;
	use tokio::sync::{broadcast, oneshot};

	struct Harness {
		engine: DispatchEngine,
		gateway: MemoryGateway,
		directory: MemoryDirectory,
	}

	fn harness(auto_dispatch: bool) -> Harness {
		let config = ConfigBuilder::new().auto_dispatch(auto_dispatch).build();
		let gateway = MemoryGateway::default();
		let directory = MemoryDirectory::default();
		let event_bus = EventBus::default();
		let orchestrator = Arc::new(DispatchOrchestrator::new(
			Arc::new(GatewayService::new(
				Box::new(gateway.clone()),
				ExpiredQuoteClassifier::default(),
			)),
			config.dispatch.policy(),
			event_bus.clone(),
		));
		let engine = DispatchEngine::new(
			config,
			orchestrator,
			Arc::new(OrderDirectory::new(
				Box::new(directory.clone()),
				Duration::from_secs(1),
			)),
			event_bus,
		);
		Harness {
			engine,
			gateway,
			directory,
		}
	}

	fn ready(id: &str) -> Order {
		Order {
			id: id.to_string(),
			status: KitchenStatus::Ready,
			delivery_info: Some(DeliveryInfo::default()),
		}
	}

	async fn wait_for_dispatch(events: &mut broadcast::Receiver<DispatchEvent>) -> String {
		loop {
			if let DispatchEvent::Dispatched { order_id, .. } = events.recv().await.unwrap() {
				return order_id;
			}
		}
	}

	#[tokio::test]
	async fn test_engine_dispatches_orders_from_feed() {
		let Harness {
			engine,
			gateway,
			directory,
		} = harness(true);
		let mut events = engine.event_bus().subscribe();
		let (stop, stopped) = oneshot::channel::<()>();

		let runner = engine.clone();
		let task = tokio::spawn(async move {
			runner
				.run_until(async {
					stopped.await.ok();
				})
				.await
		});

		directory.set_orders(vec![ready("O1")]);
		assert_eq!(wait_for_dispatch(&mut events).await, "O1");

		stop.send(()).unwrap();
		task.await.unwrap().unwrap();
		assert_eq!(gateway.accept_calls(), 1);
		assert_eq!(
			engine.orchestrator().get_dispatch_state("O1"),
			DispatchState::Dispatched
		);
	}

	#[tokio::test]
	async fn test_policy_update_triggers_dispatch() {
		let Harness {
			engine,
			gateway,
			directory,
		} = harness(false);
		directory.set_orders(vec![ready("O1")]);
		let mut events = engine.event_bus().subscribe();
		let (stop, stopped) = oneshot::channel::<()>();

		let runner = engine.clone();
		let task = tokio::spawn(async move {
			runner
				.run_until(async {
					stopped.await.ok();
				})
				.await
		});

		engine.update_policy(DispatchPolicy {
			auto_dispatch: true,
			provider: DeliveryProvider::DoorDash,
		});
		assert_eq!(wait_for_dispatch(&mut events).await, "O1");
		assert!(engine.policy().auto_dispatch);

		stop.send(()).unwrap();
		task.await.unwrap().unwrap();
		assert_eq!(gateway.quote_calls(), 1);
	}
}

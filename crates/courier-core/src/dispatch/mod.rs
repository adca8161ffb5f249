//! Dispatch orchestrator.
//!
//! Decides when an order gets a courier and exposes the query surface the
//! terminal's UI reads. Automatic and manual triggers share one sequence, run
//! as an independent task per attempt. A synchronous claim on the order's
//! local state, taken before the first network call, keeps two attempts for
//! the same order from running at once.

mod sequence;

use crate::engine::event_bus::EventBus;
use crate::reconcile;
use crate::state::DispatchRuntimeState;
use arc_swap::ArcSwap;
use courier_gateway::{GatewayError, GatewayService};
use courier_types::{
	truncate_id, DeliveryProvider, DispatchEvent, DispatchPolicy, DispatchState, Order, Quote,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Shown when a quote request fails without a message.
pub const QUOTE_FALLBACK: &str = "Failed to get delivery quote";
/// Shown when a dispatch fails without a message.
pub const DISPATCH_FALLBACK: &str = "Failed to dispatch driver";

/// Terminal failure of a dispatch attempt.
///
/// The display text is what the operator sees next to the order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
	#[error("Delivery provider is not configured.")]
	NotConfigured,
	#[error("Delivery provider credentials are not configured.")]
	CredentialsMissing,
	#[error("{0}")]
	Quote(String),
	#[error("{0}")]
	Accept(String),
	#[error("{0}")]
	Unexpected(String),
}

impl DispatchError {
	pub(crate) fn quote(error: &GatewayError) -> Self {
		Self::Quote(message_or(error, QUOTE_FALLBACK))
	}

	pub(crate) fn accept(error: &GatewayError) -> Self {
		Self::Accept(message_or(error, DISPATCH_FALLBACK))
	}
}

fn message_or(error: &GatewayError, fallback: &str) -> String {
	let message = error.to_string();
	if message.trim().is_empty() {
		fallback.to_string()
	} else {
		message
	}
}

/// What started a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
	/// Policy-driven attempt; accepts the quote without confirmation.
	Auto,
	/// Operator action; a freshly obtained quote is shown before accepting.
	Manual,
}

/// Order ids in the working set (pending, preparing, ready) and the ready set.
#[derive(Debug, Default, PartialEq, Eq)]
struct OrderSets {
	working: BTreeSet<String>,
	ready: BTreeSet<String>,
}

impl OrderSets {
	fn from_orders(orders: &[Order]) -> Self {
		let mut sets = Self::default();
		for order in orders.iter().filter(|order| order.is_active()) {
			sets.working.insert(order.id.clone());
			if order.is_ready() {
				sets.ready.insert(order.id.clone());
			}
		}
		sets
	}
}

/// Orchestrates courier dispatch for the terminal's orders.
pub struct DispatchOrchestrator {
	gateway: Arc<GatewayService>,
	runtime: DispatchRuntimeState,
	/// Latest order snapshot from the order directory, keyed by id.
	orders: ArcSwap<HashMap<String, Order>>,
	sets: ArcSwap<OrderSets>,
	policy: ArcSwap<DispatchPolicy>,
	event_bus: EventBus,
}

impl DispatchOrchestrator {
	pub fn new(gateway: Arc<GatewayService>, policy: DispatchPolicy, event_bus: EventBus) -> Self {
		Self {
			gateway,
			runtime: DispatchRuntimeState::new(),
			orders: ArcSwap::from_pointee(HashMap::new()),
			sets: ArcSwap::from_pointee(OrderSets::default()),
			policy: ArcSwap::from_pointee(policy),
			event_bus,
		}
	}

	pub fn policy(&self) -> DispatchPolicy {
		**self.policy.load()
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn runtime(&self) -> &DispatchRuntimeState {
		&self.runtime
	}

	pub fn order(&self, order_id: &str) -> Option<Order> {
		self.orders.load().get(order_id).cloned()
	}

	/// Returns true when the operator may start a dispatch for the order.
	///
	/// Requires delivery information, a configured gateway with the selected
	/// provider, no attempt in flight and no active backend dispatch. An order
	/// whose displayed state is already `Dispatched` also answers false, which
	/// covers a local dispatch the backend has not reported yet.
	pub fn can_dispatch(&self, order_id: &str) -> bool {
		let Some(order) = self.order(order_id) else {
			return false;
		};
		order.delivery_info.is_some()
			&& self.gateway.is_configured()
			&& self.gateway.is_provider_configured_for(self.policy().provider)
			&& !self.runtime.state(order_id).is_some_and(|state| state.is_in_flight())
			&& !order.has_active_dispatch()
			&& self.get_dispatch_state(order_id) != DispatchState::Dispatched
	}

	/// Returns the dispatch state shown for the order.
	pub fn get_dispatch_state(&self, order_id: &str) -> DispatchState {
		let backend = self
			.orders
			.load()
			.get(order_id)
			.map(reconcile::backend_state)
			.unwrap_or_default();
		reconcile::displayed_state(self.runtime.state(order_id), backend)
	}

	/// Returns the last dispatch error, hidden once the order is dispatched.
	pub fn get_dispatch_error(&self, order_id: &str) -> Option<String> {
		if self.get_dispatch_state(order_id) == DispatchState::Dispatched {
			return None;
		}
		self.runtime.error(order_id)
	}

	pub fn is_dispatching_delivery(&self, order_id: &str) -> bool {
		self.get_dispatch_state(order_id).is_in_flight()
	}

	pub fn get_delivery_quote(&self, order_id: &str) -> Option<Quote> {
		self.runtime.quote(order_id)
	}

	/// Starts a manual dispatch attempt without waiting for it.
	///
	/// Returns the attempt's task, or `None` when no attempt was started.
	pub fn on_dispatch_driver(self: &Arc<Self>, order_id: &str) -> Option<JoinHandle<()>> {
		self.start(order_id, Trigger::Manual)
	}

	/// Replaces the order snapshot and reacts to changes in the order sets.
	///
	/// A changed working set prunes runtime state. A changed ready set prunes
	/// trigger markers and re-evaluates auto-dispatch.
	pub fn sync_orders(self: &Arc<Self>, orders: &[Order]) -> Vec<JoinHandle<()>> {
		self.orders.store(Arc::new(
			orders
				.iter()
				.map(|order| (order.id.clone(), order.clone()))
				.collect(),
		));

		let sets = Arc::new(OrderSets::from_orders(orders));
		let previous = self.sets.swap(Arc::clone(&sets));

		if previous.working != sets.working {
			let pruned = self.runtime.prune(&sets.working);
			if !pruned.is_empty() {
				tracing::debug!(count = pruned.len(), "Pruned dispatch state");
				self.event_bus
					.publish(DispatchEvent::Pruned { order_ids: pruned })
					.ok();
			}
		}

		if previous.ready != sets.ready {
			self.runtime.prune_triggers(&sets.ready);
			return self.evaluate_auto_dispatch();
		}
		Vec::new()
	}

	/// Replaces the dispatch policy, re-evaluating auto-dispatch if it changed.
	pub fn set_policy(self: &Arc<Self>, policy: DispatchPolicy) -> Vec<JoinHandle<()>> {
		let previous = self.policy.swap(Arc::new(policy));
		if *previous == policy {
			return Vec::new();
		}
		tracing::info!(
			auto_dispatch = policy.auto_dispatch,
			provider = %policy.provider,
			"Dispatch policy updated"
		);
		self.evaluate_auto_dispatch()
	}

	/// Gives every ready order not yet triggered in its ready episode an
	/// automatic attempt.
	pub fn evaluate_auto_dispatch(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
		let policy = self.policy();
		if !policy.auto_dispatch {
			return Vec::new();
		}
		if !self.provider_ready(policy.provider) {
			tracing::debug!(provider = %policy.provider, "Auto-dispatch skipped, provider not ready");
			return Vec::new();
		}

		let sets = self.sets.load_full();
		let mut handles = Vec::new();
		for order_id in &sets.ready {
			if !self.runtime.mark_triggered(order_id) {
				continue;
			}
			tracing::debug!(order_id = %truncate_id(order_id), "Auto-dispatch triggered");
			handles.extend(self.start(order_id, Trigger::Auto));
		}
		handles
	}

	fn provider_ready(&self, provider: DeliveryProvider) -> bool {
		provider.is_daas()
			&& self.gateway.is_configured()
			&& self.gateway.is_provider_configured_for(provider)
	}

	fn is_working(&self, order_id: &str) -> bool {
		self.sets.load().working.contains(order_id)
	}

	/// Runs the synchronous checks of the dispatch sequence and claims the
	/// order before spawning the asynchronous part.
	///
	/// Manual attempts are not gated on provider configuration here: an
	/// unconfigured provider fails at the credential step with an error the
	/// operator can see.
	fn start(self: &Arc<Self>, order_id: &str, trigger: Trigger) -> Option<JoinHandle<()>> {
		if self.runtime.state(order_id).is_some_and(|state| state.is_in_flight()) {
			tracing::debug!(order_id = %truncate_id(order_id), "Dispatch already in progress");
			return None;
		}

		let order = self.order(order_id)?;
		if order.delivery_info.is_none() {
			return None;
		}

		if !self.gateway.is_configured() {
			self.fail(order_id, &DispatchError::NotConfigured);
			return None;
		}
		if self.get_dispatch_state(order_id) == DispatchState::Dispatched {
			tracing::debug!(order_id = %truncate_id(order_id), "Order already dispatched");
			return None;
		}

		let claim = if self.runtime.quote(order_id).is_some() {
			DispatchState::Dispatching
		} else {
			DispatchState::Quoting
		};
		if !self.runtime.try_claim(order_id, claim) {
			return None;
		}
		self.runtime.clear_error(order_id);
		self.event_bus
			.publish(DispatchEvent::StateChanged {
				order_id: order_id.to_string(),
				state: claim,
			})
			.ok();

		let orchestrator = Arc::clone(self);
		let order_id = order_id.to_string();
		Some(tokio::spawn(async move {
			orchestrator.run(order_id, trigger).await;
		}))
	}

	/// Records a local state, publishing it when it changed.
	fn set_state(&self, order_id: &str, state: DispatchState) {
		if self.runtime.set_state(order_id, state) != Some(state) {
			self.event_bus
				.publish(DispatchEvent::StateChanged {
					order_id: order_id.to_string(),
					state,
				})
				.ok();
		}
	}

	fn fail(&self, order_id: &str, error: &DispatchError) {
		self.runtime.set_error(order_id, error.to_string());
		self.set_state(order_id, DispatchState::Failed);
		self.event_bus
			.publish(DispatchEvent::Failed {
				order_id: order_id.to_string(),
				error: error.to_string(),
			})
			.ok();
	}
}

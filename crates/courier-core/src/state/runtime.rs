//! Copy-on-write stores for held quotes, local states and local errors.
//!
//! Every store is an `ArcSwap` over an immutable map. Writers build a new map
//! and swap it in with `rcu`, so readers always load a complete snapshot and
//! never wait on a lock.

use arc_swap::ArcSwap;
use courier_types::{DispatchState, Quote};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Per-order dispatch runtime state.
#[derive(Default)]
pub struct DispatchRuntimeState {
	quotes: ArcSwap<HashMap<String, Quote>>,
	states: ArcSwap<HashMap<String, DispatchState>>,
	errors: ArcSwap<HashMap<String, String>>,
	/// Orders already given an automatic attempt in their current ready episode.
	triggered: ArcSwap<HashSet<String>>,
}

impl DispatchRuntimeState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn quote(&self, order_id: &str) -> Option<Quote> {
		self.quotes.load().get(order_id).cloned()
	}

	/// Holds a quote for the order, replacing any previously held one.
	pub fn set_quote(&self, order_id: &str, quote: Quote) {
		insert(&self.quotes, order_id, quote);
	}

	pub fn discard_quote(&self, order_id: &str) -> Option<Quote> {
		remove(&self.quotes, order_id)
	}

	pub fn state(&self, order_id: &str) -> Option<DispatchState> {
		self.states.load().get(order_id).copied()
	}

	/// Records the local state, returning the previous one.
	pub fn set_state(&self, order_id: &str, state: DispatchState) -> Option<DispatchState> {
		insert(&self.states, order_id, state)
	}

	/// Atomically moves the order into `state` unless an attempt is already in flight.
	///
	/// Returns false when another attempt holds the order.
	pub fn try_claim(&self, order_id: &str, state: DispatchState) -> bool {
		let previous = self.states.rcu(|current| {
			if current.get(order_id).is_some_and(DispatchState::is_in_flight) {
				Arc::clone(current)
			} else {
				let mut next = (**current).clone();
				next.insert(order_id.to_string(), state);
				Arc::new(next)
			}
		});
		!previous.get(order_id).is_some_and(DispatchState::is_in_flight)
	}

	pub fn error(&self, order_id: &str) -> Option<String> {
		self.errors.load().get(order_id).cloned()
	}

	pub fn set_error(&self, order_id: &str, error: impl Into<String>) {
		insert(&self.errors, order_id, error.into());
	}

	pub fn clear_error(&self, order_id: &str) {
		remove(&self.errors, order_id);
	}

	/// Marks the order as auto-triggered, returning false if it already was.
	pub fn mark_triggered(&self, order_id: &str) -> bool {
		let previous = self.triggered.rcu(|current| {
			if current.contains(order_id) {
				Arc::clone(current)
			} else {
				let mut next = (**current).clone();
				next.insert(order_id.to_string());
				Arc::new(next)
			}
		});
		!previous.contains(order_id)
	}

	pub fn is_triggered(&self, order_id: &str) -> bool {
		self.triggered.load().contains(order_id)
	}

	/// Drops quote, state and error entries for orders outside the working set.
	///
	/// Returns the ids that were dropped, sorted.
	pub fn prune(&self, working: &BTreeSet<String>) -> Vec<String> {
		let mut pruned = BTreeSet::new();
		pruned.extend(retain(&self.quotes, working));
		pruned.extend(retain(&self.states, working));
		pruned.extend(retain(&self.errors, working));
		pruned.into_iter().collect()
	}

	/// Drops trigger markers for orders that are no longer ready.
	pub fn prune_triggers(&self, ready: &BTreeSet<String>) {
		self.triggered.rcu(|current| {
			if current.iter().all(|id| ready.contains(id)) {
				Arc::clone(current)
			} else {
				Arc::new(
					current
						.iter()
						.filter(|id| ready.contains(*id))
						.cloned()
						.collect::<HashSet<_>>(),
				)
			}
		});
	}

	/// Drops quote, state and error entries for a single order.
	pub fn forget(&self, order_id: &str) {
		remove(&self.quotes, order_id);
		remove(&self.states, order_id);
		remove(&self.errors, order_id);
	}

	/// Ids of all orders holding any quote, state or error entry.
	pub fn tracked_orders(&self) -> BTreeSet<String> {
		self.quotes
			.load()
			.keys()
			.chain(self.states.load().keys())
			.chain(self.errors.load().keys())
			.cloned()
			.collect()
	}
}

fn insert<V: Clone>(map: &ArcSwap<HashMap<String, V>>, key: &str, value: V) -> Option<V> {
	let previous = map.rcu(|current| {
		let mut next = (**current).clone();
		next.insert(key.to_string(), value.clone());
		next
	});
	previous.get(key).cloned()
}

fn remove<V: Clone>(map: &ArcSwap<HashMap<String, V>>, key: &str) -> Option<V> {
	let previous = map.rcu(|current| {
		if !current.contains_key(key) {
			return Arc::clone(current);
		}
		let mut next = (**current).clone();
		next.remove(key);
		Arc::new(next)
	});
	previous.get(key).cloned()
}

fn retain<V: Clone>(map: &ArcSwap<HashMap<String, V>>, keep: &BTreeSet<String>) -> Vec<String> {
	let previous = map.rcu(|current| {
		if current.keys().all(|key| keep.contains(key)) {
			return Arc::clone(current);
		}
		Arc::new(
			current
				.iter()
				.filter(|(key, _)| keep.contains(*key))
				.map(|(key, value)| (key.clone(), value.clone()))
				.collect::<HashMap<_, _>>(),
		)
	});
	previous
		.keys()
		.filter(|key| !keep.contains(*key))
		.cloned()
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use courier_types::DeliveryProvider;
	use rust_decimal::Decimal;

	fn quote(id: &str) -> Quote {
		let now = Utc::now();
		Quote {
			provider: DeliveryProvider::DoorDash,
			quote_id: id.to_string(),
			fee: Decimal::new(625, 2),
			estimated_pickup_at: now,
			estimated_delivery_at: now,
			expires_at: now,
		}
	}

	fn ids(ids: &[&str]) -> BTreeSet<String> {
		ids.iter().map(|id| id.to_string()).collect()
	}

	#[test]
	fn test_claim_is_refused_while_in_flight() {
		let state = DispatchRuntimeState::new();
		assert!(state.try_claim("O1", DispatchState::Quoting));
		assert!(!state.try_claim("O1", DispatchState::Dispatching));
		assert_eq!(state.state("O1"), Some(DispatchState::Quoting));

		state.set_state("O1", DispatchState::Failed);
		assert!(state.try_claim("O1", DispatchState::Dispatching));
		assert_eq!(state.state("O1"), Some(DispatchState::Dispatching));
	}

	#[test]
	fn test_one_quote_per_order() {
		let state = DispatchRuntimeState::new();
		state.set_quote("O1", quote("Q1"));
		state.set_quote("O1", quote("Q2"));
		assert_eq!(state.quote("O1").unwrap().quote_id, "Q2");
		assert_eq!(state.discard_quote("O1").unwrap().quote_id, "Q2");
		assert!(state.quote("O1").is_none());
		assert!(state.discard_quote("O1").is_none());
	}

	#[test]
	fn test_snapshots_are_not_mutated_in_place() {
		let state = DispatchRuntimeState::new();
		state.set_error("O1", "boom");
		let before = state.errors.load_full();
		state.clear_error("O1");
		assert_eq!(before.get("O1").map(String::as_str), Some("boom"));
		assert!(state.error("O1").is_none());
	}

	#[test]
	fn test_prune_drops_orders_outside_working_set() {
		let state = DispatchRuntimeState::new();
		state.set_quote("O1", quote("Q1"));
		state.set_state("O2", DispatchState::Failed);
		state.set_error("O2", "Quote expired");
		state.set_state("O3", DispatchState::Idle);

		let pruned = state.prune(&ids(&["O3"]));
		assert_eq!(pruned, vec!["O1".to_string(), "O2".to_string()]);
		assert_eq!(state.tracked_orders(), ids(&["O3"]));
		assert!(state.prune(&ids(&["O3"])).is_empty());
	}

	#[test]
	fn test_trigger_markers() {
		let state = DispatchRuntimeState::new();
		assert!(state.mark_triggered("O1"));
		assert!(!state.mark_triggered("O1"));
		assert!(state.mark_triggered("O2"));

		state.prune_triggers(&ids(&["O2"]));
		assert!(!state.is_triggered("O1"));
		assert!(state.is_triggered("O2"));
		assert!(state.mark_triggered("O1"));
	}
}

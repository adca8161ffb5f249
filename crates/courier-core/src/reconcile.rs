//! Reconciliation of the local dispatch view with backend-reported status.
//!
//! Two sources are merged on every read and never collapsed into one stored
//! value: the orchestrator's optimistic local state and the state derived
//! from the delivery information the backend attached to the order.

use courier_types::{DispatchState, Order};

/// Derives a dispatch state from the backend's delivery information.
///
/// Uses the same classification as `Order::has_active_dispatch`, so an order
/// the backend reports as underway is always shown as dispatched.
pub fn backend_state(order: &Order) -> DispatchState {
	match &order.delivery_info {
		Some(info) if info.has_active_dispatch() => DispatchState::Dispatched,
		Some(info) if info.is_failed() => DispatchState::Failed,
		_ => DispatchState::Idle,
	}
}

/// Merges the local and backend views into the state shown to the operator.
///
/// A backend dispatch always wins. A backend failure is hidden while a local
/// attempt is in flight, since the backend read predates the retry.
pub fn displayed_state(local: Option<DispatchState>, backend: DispatchState) -> DispatchState {
	match backend {
		DispatchState::Dispatched => DispatchState::Dispatched,
		DispatchState::Failed if !local.is_some_and(|state| state.is_in_flight()) => {
			DispatchState::Failed
		},
		_ => local.unwrap_or(backend),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_types::{DeliveryInfo, DispatchStatus, KitchenStatus};

	fn order(status: Option<DispatchStatus>, external_id: Option<&str>) -> Order {
		Order {
			id: "O1".to_string(),
			status: KitchenStatus::Ready,
			delivery_info: Some(DeliveryInfo {
				dispatch_status: status,
				delivery_external_id: external_id.map(str::to_string),
			}),
		}
	}

	#[test]
	fn test_backend_state_classification() {
		assert_eq!(backend_state(&order(None, None)), DispatchState::Idle);
		assert_eq!(backend_state(&order(None, Some("D1"))), DispatchState::Dispatched);
		assert_eq!(
			backend_state(&order(Some(DispatchStatus::Quoted), Some("D1"))),
			DispatchState::Idle
		);
		assert_eq!(
			backend_state(&order(Some(DispatchStatus::DriverAtPickup), None)),
			DispatchState::Dispatched
		);
		assert_eq!(
			backend_state(&order(Some(DispatchStatus::Cancelled), Some("D1"))),
			DispatchState::Failed
		);

		let mut pickup = order(None, None);
		pickup.delivery_info = None;
		assert_eq!(backend_state(&pickup), DispatchState::Idle);
	}

	#[test]
	fn test_backend_dispatch_wins_over_local_state() {
		for local in [
			None,
			Some(DispatchState::Idle),
			Some(DispatchState::Quoting),
			Some(DispatchState::Failed),
		] {
			assert_eq!(
				displayed_state(local, DispatchState::Dispatched),
				DispatchState::Dispatched
			);
		}
	}

	#[test]
	fn test_backend_failure_hidden_while_in_flight() {
		assert_eq!(
			displayed_state(Some(DispatchState::Dispatching), DispatchState::Failed),
			DispatchState::Dispatching
		);
		assert_eq!(
			displayed_state(Some(DispatchState::Quoting), DispatchState::Failed),
			DispatchState::Quoting
		);
		assert_eq!(
			displayed_state(Some(DispatchState::Idle), DispatchState::Failed),
			DispatchState::Failed
		);
		assert_eq!(displayed_state(None, DispatchState::Failed), DispatchState::Failed);
	}

	#[test]
	fn test_local_state_used_otherwise() {
		assert_eq!(displayed_state(None, DispatchState::Idle), DispatchState::Idle);
		assert_eq!(
			displayed_state(Some(DispatchState::Failed), DispatchState::Idle),
			DispatchState::Failed
		);
		assert_eq!(
			displayed_state(Some(DispatchState::Dispatched), DispatchState::Idle),
			DispatchState::Dispatched
		);
	}
}

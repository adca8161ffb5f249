//! Order types as reported by the order directory.
//!
//! The dispatch layer never writes orders. It reads the kitchen status to
//! decide which orders are in the working and ready sets, and reads the
//! backend-authoritative delivery information to reconcile its own view.

use serde::{Deserialize, Serialize};

/// An order on the terminal as reported by the order directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Kitchen status of the order.
	pub status: KitchenStatus,
	/// Delivery details, present only for delivery orders.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivery_info: Option<DeliveryInfo>,
}

impl Order {
	/// Returns true while the order is pending, preparing or ready.
	pub fn is_active(&self) -> bool {
		matches!(
			self.status,
			KitchenStatus::Pending | KitchenStatus::Preparing | KitchenStatus::Ready
		)
	}

	/// Returns true while the order is waiting for pickup.
	pub fn is_ready(&self) -> bool {
		self.status == KitchenStatus::Ready
	}

	/// Returns true when a courier dispatch is underway or finished for this order.
	///
	/// Orders without delivery information never have an active dispatch.
	pub fn has_active_dispatch(&self) -> bool {
		self.delivery_info
			.as_ref()
			.is_some_and(DeliveryInfo::has_active_dispatch)
	}
}

/// Kitchen status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KitchenStatus {
	Pending,
	Preparing,
	Ready,
	Completed,
	Cancelled,
}

/// Backend-authoritative delivery information attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
	/// Courier lifecycle status as last reported by the backend.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dispatch_status: Option<DispatchStatus>,
	/// Provider-side identifier of the delivery, once one exists.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivery_external_id: Option<String>,
}

impl DeliveryInfo {
	/// Returns true when the backend reports a dispatch that must not be repeated.
	///
	/// Without a recorded status the presence of an external delivery id decides.
	/// Quoted, failed and cancelled deliveries can be dispatched again; every
	/// status from `DISPATCH_REQUESTED` through `DELIVERED` cannot.
	pub fn has_active_dispatch(&self) -> bool {
		match self.dispatch_status {
			None => self.delivery_external_id.is_some(),
			Some(status) => status.is_courier_lifecycle(),
		}
	}

	/// Returns true when the backend reports the delivery as failed or cancelled.
	pub fn is_failed(&self) -> bool {
		matches!(
			self.dispatch_status,
			Some(DispatchStatus::Failed | DispatchStatus::Cancelled)
		)
	}
}

/// Delivery status reported by the backend for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchStatus {
	Quoted,
	DispatchRequested,
	DriverAssigned,
	DriverEnRouteToPickup,
	DriverAtPickup,
	PickedUp,
	DriverEnRouteToDropoff,
	DriverAtDropoff,
	Delivered,
	Cancelled,
	Failed,
}

impl DispatchStatus {
	/// Returns true for statuses from `DISPATCH_REQUESTED` through `DELIVERED`.
	pub fn is_courier_lifecycle(&self) -> bool {
		!matches!(
			self,
			DispatchStatus::Quoted | DispatchStatus::Cancelled | DispatchStatus::Failed
		)
	}
}

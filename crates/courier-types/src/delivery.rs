//! Delivery dispatch types for the courier system.
//!
//! This module defines the values exchanged with the delivery provider
//! gateway (quotes and dispatch results), the closed set of providers a
//! terminal can be configured with, the dispatch policy, and the local
//! dispatch lifecycle tracked per order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delivery provider selected for the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryProvider {
	/// No delivery handling at all.
	#[default]
	None,
	/// The restaurant delivers with its own staff.
	#[serde(rename = "self")]
	SelfDelivery,
	DoorDash,
	Uber,
}

impl DeliveryProvider {
	/// Returns true for third-party courier networks that need live credentials.
	pub fn is_daas(&self) -> bool {
		matches!(self, DeliveryProvider::DoorDash | DeliveryProvider::Uber)
	}

	/// Returns the configuration name of the provider.
	pub fn as_str(&self) -> &'static str {
		match self {
			DeliveryProvider::None => "none",
			DeliveryProvider::SelfDelivery => "self",
			DeliveryProvider::DoorDash => "doordash",
			DeliveryProvider::Uber => "uber",
		}
	}
}

impl fmt::Display for DeliveryProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DeliveryProvider {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"none" => Ok(DeliveryProvider::None),
			"self" => Ok(DeliveryProvider::SelfDelivery),
			"doordash" => Ok(DeliveryProvider::DoorDash),
			"uber" => Ok(DeliveryProvider::Uber),
			other => Err(format!("Unknown delivery provider: {}", other)),
		}
	}
}

/// A priced, time-limited delivery offer from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
	/// Provider that issued the quote.
	pub provider: DeliveryProvider,
	/// Provider-side quote identifier, passed back when accepting.
	pub quote_id: String,
	/// Delivery fee charged by the provider.
	pub fee: Decimal,
	/// Estimated courier arrival at the restaurant.
	pub estimated_pickup_at: DateTime<Utc>,
	/// Estimated arrival at the customer.
	pub estimated_delivery_at: DateTime<Utc>,
	/// Time after which the provider rejects acceptance of this quote.
	pub expires_at: DateTime<Utc>,
}

/// Outcome of accepting a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
	/// Provider-side identifier of the created delivery.
	pub delivery_external_id: String,
	/// Customer-facing tracking link, when the provider offers one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tracking_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub estimated_delivery_at: Option<DateTime<Utc>>,
}

/// Local, optimistic view of an order's dispatch progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
	#[default]
	Idle,
	Quoting,
	Dispatching,
	Dispatched,
	Failed,
}

impl DispatchState {
	/// Returns true while a quote request or an accept call is outstanding.
	pub fn is_in_flight(&self) -> bool {
		matches!(self, DispatchState::Quoting | DispatchState::Dispatching)
	}
}

impl fmt::Display for DispatchState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			DispatchState::Idle => "idle",
			DispatchState::Quoting => "quoting",
			DispatchState::Dispatching => "dispatching",
			DispatchState::Dispatched => "dispatched",
			DispatchState::Failed => "failed",
		};
		f.write_str(name)
	}
}

/// Dispatch policy of the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPolicy {
	/// Whether ready orders are dispatched without operator action.
	pub auto_dispatch: bool,
	/// Active delivery provider.
	pub provider: DeliveryProvider,
}

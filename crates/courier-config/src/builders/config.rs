//! Configuration builder for creating test and development configurations.
//!
//! Produces a `Config` backed by the in-memory gateway and order directory,
//! so tests can exercise the dispatch engine without any network access.

use crate::{
	default_expired_quote_pattern, ApiConfig, Config, DispatchConfig, GatewayConfig,
	OrdersConfig, TerminalConfig,
};
use courier_types::DeliveryProvider;
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	terminal_id: String,
	auto_dispatch: bool,
	provider: DeliveryProvider,
	expired_quote_pattern: String,
	gateway_primary: String,
	orders_primary: String,
	poll_interval_seconds: u64,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			terminal_id: "test-terminal".to_string(),
			auto_dispatch: false,
			provider: DeliveryProvider::DoorDash,
			expired_quote_pattern: default_expired_quote_pattern(),
			gateway_primary: "memory".to_string(),
			orders_primary: "memory".to_string(),
			poll_interval_seconds: 1,
			api: None,
		}
	}

	pub fn terminal_id(mut self, id: impl Into<String>) -> Self {
		self.terminal_id = id.into();
		self
	}

	pub fn auto_dispatch(mut self, enabled: bool) -> Self {
		self.auto_dispatch = enabled;
		self
	}

	pub fn provider(mut self, provider: DeliveryProvider) -> Self {
		self.provider = provider;
		self
	}

	pub fn expired_quote_pattern(mut self, pattern: impl Into<String>) -> Self {
		self.expired_quote_pattern = pattern.into();
		self
	}

	/// Sets the primary gateway implementation.
	pub fn gateway_primary(mut self, primary: impl Into<String>) -> Self {
		self.gateway_primary = primary.into();
		self
	}

	/// Sets the primary order directory implementation.
	pub fn orders_primary(mut self, primary: impl Into<String>) -> Self {
		self.orders_primary = primary.into();
		self
	}

	pub fn poll_interval_seconds(mut self, interval: u64) -> Self {
		self.poll_interval_seconds = interval;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with an empty table for each primary implementation.
	pub fn build(self) -> Config {
		let empty = || toml::Value::Table(toml::map::Map::new());
		Config {
			terminal: TerminalConfig {
				id: self.terminal_id,
			},
			dispatch: DispatchConfig {
				auto_dispatch: self.auto_dispatch,
				provider: self.provider,
				expired_quote_pattern: self.expired_quote_pattern,
			},
			gateway: GatewayConfig {
				implementations: HashMap::from([(self.gateway_primary.clone(), empty())]),
				primary: self.gateway_primary,
			},
			orders: OrdersConfig {
				implementations: HashMap::from([(self.orders_primary.clone(), empty())]),
				primary: self.orders_primary,
				poll_interval_seconds: self.poll_interval_seconds,
			},
			api: self.api,
		}
	}
}

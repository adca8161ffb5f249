//! Builder pattern for constructing dispatch engines.
//!
//! Composes a `DispatchEngine` from the configured gateway and order
//! directory implementations using factory functions, so the binary decides
//! which implementations exist and the configuration decides which one runs.

use crate::dispatch::DispatchOrchestrator;
use crate::engine::{event_bus::EventBus, DispatchEngine};
use courier_config::Config;
use courier_gateway::{ExpiredQuoteClassifier, GatewayError, GatewayInterface, GatewayService};
use courier_orders::{DirectoryError, OrderDirectory, OrderDirectoryInterface};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct CourierFactories<GF, DF> {
	pub gateway_factories: HashMap<String, GF>,
	pub directory_factories: HashMap<String, DF>,
}

/// Builder for constructing a DispatchEngine with pluggable implementations.
pub struct CourierBuilder {
	config: Config,
}

impl CourierBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the DispatchEngine from the primary gateway and order directory.
	pub fn build<GF, DF>(self, factories: CourierFactories<GF, DF>) -> Result<DispatchEngine, BuilderError>
	where
		GF: Fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>,
		DF: Fn(&toml::Value) -> Result<Box<dyn OrderDirectoryInterface>, DirectoryError>,
	{
		let gateway = load_primary(
			"gateway",
			&self.config.gateway.primary,
			&self.config.gateway.implementations,
			&factories.gateway_factories,
		)?;
		let directory = load_primary(
			"orders",
			&self.config.orders.primary,
			&self.config.orders.implementations,
			&factories.directory_factories,
		)?;

		let classifier = ExpiredQuoteClassifier::new(&self.config.dispatch.expired_quote_pattern)
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let gateway = Arc::new(GatewayService::new(gateway, classifier));

		let directory = Arc::new(OrderDirectory::new(
			directory,
			Duration::from_secs(self.config.orders.poll_interval_seconds),
		));

		let event_bus = EventBus::new(1000);
		let orchestrator = Arc::new(DispatchOrchestrator::new(
			gateway,
			self.config.dispatch.policy(),
			event_bus.clone(),
		));

		Ok(DispatchEngine::new(
			self.config,
			orchestrator,
			directory,
			event_bus,
		))
	}
}

/// Creates every configured implementation of a component and returns the primary.
///
/// Implementations without a registered factory are skipped; one that fails
/// to build aborts the whole build.
fn load_primary<F, T, E>(
	component: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<T, BuilderError>
where
	F: Fn(&toml::Value) -> Result<T, E>,
	E: std::fmt::Display,
{
	let mut loaded = HashMap::new();
	for (name, config) in implementations {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component, implementation = %name, "No factory registered");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				let is_primary = name == primary;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
				loaded.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	loaded.remove(primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"Primary {} '{}' failed to load or has no registered factory",
			component, primary
		))
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_config::builders::config::ConfigBuilder;
	use courier_gateway::GatewayFactory;
	use courier_orders::DirectoryFactory;

	fn factories() -> CourierFactories<GatewayFactory, DirectoryFactory> {
		CourierFactories {
			gateway_factories: courier_gateway::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			directory_factories: courier_orders::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[test]
	fn test_builds_engine_from_memory_implementations() {
		let config = ConfigBuilder::new().auto_dispatch(true).build();
		let engine = CourierBuilder::new(config).build(factories()).unwrap();
		assert!(engine.policy().auto_dispatch);
		assert_eq!(engine.config().terminal.id, "test-terminal");
	}

	#[test]
	fn test_missing_factory_is_reported() {
		let config = ConfigBuilder::new().build();
		let empty: CourierFactories<GatewayFactory, DirectoryFactory> = CourierFactories {
			gateway_factories: HashMap::new(),
			directory_factories: HashMap::new(),
		};
		assert!(matches!(
			CourierBuilder::new(config).build(empty),
			Err(BuilderError::MissingComponent(msg)) if msg.contains("gateway")
		));
	}

	#[test]
	fn test_invalid_implementation_config_fails() {
		let mut config = ConfigBuilder::new().build();
		config.gateway.implementations.insert(
			"memory".to_string(),
			toml::from_str("configured = \"yes\"").unwrap(),
		);
		assert!(matches!(
			CourierBuilder::new(config).build(factories()),
			Err(BuilderError::Config(_))
		));
	}
}

//! In-memory gateway implementation for development and testing.
//!
//! Quotes and dispatch results are produced locally. Responses can be
//! scripted ahead of time to reproduce provider failures such as expired
//! quotes, and every call is counted so tests can assert on exactly how the
//! orchestrator used the gateway.

use crate::{GatewayError, GatewayFactory, GatewayInterface, GatewayRegistry};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use courier_types::{
	ConfigSchema, DeliveryProvider, DispatchResult, Field, FieldType, ImplementationRegistry,
	Quote, Schema, ValidationError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Configuration for the in-memory gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryGatewayConfig {
	/// Whether the delivery subsystem reports itself as configured.
	#[serde(default = "default_true")]
	pub configured: bool,
	/// Providers the gateway reports a configuration for.
	#[serde(default = "default_providers")]
	pub providers: Vec<DeliveryProvider>,
	/// Whether credential confirmation succeeds.
	#[serde(default = "default_true")]
	pub credentials_confirmed: bool,
	/// Fee attached to generated quotes.
	#[serde(default = "default_fee")]
	pub fee: Decimal,
	/// Lifetime of generated quotes.
	#[serde(default = "default_quote_ttl_seconds")]
	pub quote_ttl_seconds: i64,
}

fn default_true() -> bool {
	true
}

fn default_providers() -> Vec<DeliveryProvider> {
	vec![DeliveryProvider::DoorDash, DeliveryProvider::Uber]
}

fn default_fee() -> Decimal {
	Decimal::new(500, 2)
}

fn default_quote_ttl_seconds() -> i64 {
	300
}

impl Default for MemoryGatewayConfig {
	fn default() -> Self {
		Self {
			configured: true,
			providers: default_providers(),
			credentials_confirmed: true,
			fee: default_fee(),
			quote_ttl_seconds: default_quote_ttl_seconds(),
		}
	}
}

#[derive(Default)]
struct Script {
	quotes: VecDeque<Result<Quote, GatewayError>>,
	accepts: VecDeque<Result<DispatchResult, GatewayError>>,
	accepted_quote_ids: Vec<String>,
}

struct Inner {
	config: MemoryGatewayConfig,
	providers: HashSet<DeliveryProvider>,
	script: Mutex<Script>,
	quote_calls: AtomicUsize,
	accept_calls: AtomicUsize,
	credential_checks: AtomicUsize,
}

/// In-memory gateway.
///
/// Cloning yields a handle to the same scripted state, so a test can keep
/// one clone while the orchestrator owns another.
#[derive(Clone)]
pub struct MemoryGateway {
	inner: Arc<Inner>,
}

impl MemoryGateway {
	pub fn new(config: MemoryGatewayConfig) -> Self {
		let providers = config.providers.iter().copied().collect();
		Self {
			inner: Arc::new(Inner {
				config,
				providers,
				script: Mutex::new(Script::default()),
				quote_calls: AtomicUsize::new(0),
				accept_calls: AtomicUsize::new(0),
				credential_checks: AtomicUsize::new(0),
			}),
		}
	}

	/// Queues the response for the next quote request.
	pub async fn push_quote(&self, response: Result<Quote, GatewayError>) {
		self.inner.script.lock().await.quotes.push_back(response);
	}

	/// Queues the response for the next accept call.
	pub async fn push_accept(&self, response: Result<DispatchResult, GatewayError>) {
		self.inner.script.lock().await.accepts.push_back(response);
	}

	pub fn quote_calls(&self) -> usize {
		self.inner.quote_calls.load(Ordering::SeqCst)
	}

	pub fn accept_calls(&self) -> usize {
		self.inner.accept_calls.load(Ordering::SeqCst)
	}

	pub fn credential_checks(&self) -> usize {
		self.inner.credential_checks.load(Ordering::SeqCst)
	}

	/// Quote ids passed to accept calls, in call order.
	pub async fn accepted_quote_ids(&self) -> Vec<String> {
		self.inner.script.lock().await.accepted_quote_ids.clone()
	}

	fn generate_quote(&self, sequence: usize) -> Quote {
		let now = Utc::now();
		let provider = self
			.inner
			.config
			.providers
			.first()
			.copied()
			.unwrap_or_default();
		Quote {
			provider,
			quote_id: format!("Q{}", sequence),
			fee: self.inner.config.fee,
			estimated_pickup_at: now + Duration::minutes(10),
			estimated_delivery_at: now + Duration::minutes(35),
			expires_at: now + Duration::seconds(self.inner.config.quote_ttl_seconds),
		}
	}
}

impl Default for MemoryGateway {
	fn default() -> Self {
		Self::new(MemoryGatewayConfig::default())
	}
}

#[async_trait]
impl GatewayInterface for MemoryGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryGatewaySchema)
	}

	fn is_configured(&self) -> bool {
		self.inner.config.configured
	}

	fn is_provider_configured_for(&self, provider: DeliveryProvider) -> bool {
		self.inner.providers.contains(&provider)
	}

	async fn ensure_provider_configured(
		&self,
		provider: DeliveryProvider,
	) -> Result<bool, GatewayError> {
		self.inner.credential_checks.fetch_add(1, Ordering::SeqCst);
		Ok(self.inner.config.credentials_confirmed && self.inner.providers.contains(&provider))
	}

	async fn request_quote(&self, _order_id: &str) -> Result<Quote, GatewayError> {
		let sequence = self.inner.quote_calls.fetch_add(1, Ordering::SeqCst) + 1;
		let scripted = self.inner.script.lock().await.quotes.pop_front();
		scripted.unwrap_or_else(|| Ok(self.generate_quote(sequence)))
	}

	async fn accept_quote(
		&self,
		_order_id: &str,
		quote_id: &str,
	) -> Result<DispatchResult, GatewayError> {
		let sequence = self.inner.accept_calls.fetch_add(1, Ordering::SeqCst) + 1;
		let mut script = self.inner.script.lock().await;
		script.accepted_quote_ids.push(quote_id.to_string());
		script.accepts.pop_front().unwrap_or_else(|| {
			Ok(DispatchResult {
				delivery_external_id: format!("D{}", sequence),
				tracking_url: None,
				estimated_delivery_at: None,
			})
		})
	}
}

/// Configuration schema for MemoryGateway.
pub struct MemoryGatewaySchema;

impl ConfigSchema for MemoryGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("configured", FieldType::Boolean),
				Field::new("credentials_confirmed", FieldType::Boolean),
				Field::new("providers", FieldType::Array(Box::new(FieldType::String))),
				Field::new("fee", FieldType::String),
				Field::new(
					"quote_ttl_seconds",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a memory gateway from configuration.
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	MemoryGatewaySchema
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	let gateway_config: MemoryGatewayConfig = config
		.clone()
		.try_into()
		.map_err(|e| GatewayError::Configuration(format!("Invalid memory gateway config: {}", e)))?;

	Ok(Box::new(MemoryGateway::new(gateway_config)))
}

/// Registry for the memory gateway implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = GatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl GatewayRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_generated_quotes_and_dispatches() {
		let gateway = MemoryGateway::default();

		let quote = gateway.request_quote("O1").await.unwrap();
		assert_eq!(quote.quote_id, "Q1");
		assert_eq!(quote.fee, Decimal::new(500, 2));
		assert!(quote.expires_at > Utc::now());

		let result = gateway.accept_quote("O1", &quote.quote_id).await.unwrap();
		assert_eq!(result.delivery_external_id, "D1");
		assert_eq!(gateway.quote_calls(), 1);
		assert_eq!(gateway.accept_calls(), 1);
		assert_eq!(gateway.accepted_quote_ids().await, vec!["Q1".to_string()]);
	}

	#[tokio::test]
	async fn test_scripted_responses_take_precedence() {
		let gateway = MemoryGateway::default();
		gateway
			.push_accept(Err(GatewayError::Provider("Quote expired".into())))
			.await;

		let err = gateway.accept_quote("O1", "Q9").await.unwrap_err();
		assert_eq!(err.to_string(), "Quote expired");

		// Script exhausted, back to generated results
		assert!(gateway.accept_quote("O1", "Q10").await.is_ok());
	}

	#[tokio::test]
	async fn test_provider_configuration_flags() {
		let gateway = MemoryGateway::new(MemoryGatewayConfig {
			providers: vec![DeliveryProvider::Uber],
			credentials_confirmed: false,
			..Default::default()
		});

		assert!(gateway.is_configured());
		assert!(gateway.is_provider_configured_for(DeliveryProvider::Uber));
		assert!(!gateway.is_provider_configured_for(DeliveryProvider::DoorDash));
		assert!(!gateway
			.ensure_provider_configured(DeliveryProvider::Uber)
			.await
			.unwrap());
		assert_eq!(gateway.credential_checks(), 1);
	}

	#[test]
	fn test_factory_reads_toml() {
		let config: toml::Value = toml::from_str(
			r#"
			providers = ["uber"]
			fee = "7.50"
			"#,
		)
		.unwrap();
		let gateway = create_gateway(&config).unwrap();
		assert!(gateway.is_provider_configured_for(DeliveryProvider::Uber));
		assert!(!gateway.is_provider_configured_for(DeliveryProvider::DoorDash));
	}

	#[test]
	fn test_factory_rejects_bad_types() {
		let config: toml::Value = toml::from_str("configured = \"yes\"").unwrap();
		assert!(matches!(
			create_gateway(&config),
			Err(GatewayError::Configuration(_))
		));
	}
}

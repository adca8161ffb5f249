//! Delivery provider gateway module for the courier dispatch system.
//!
//! This module abstracts the network client that talks to third-party
//! delivery-as-a-service providers. The dispatch orchestrator only ever asks
//! it for a quote, asks it to accept a quote, and checks whether the selected
//! provider is configured. Implementations decide how those calls reach the
//! provider.

use async_trait::async_trait;
use courier_types::{
	ConfigSchema, DeliveryProvider, DispatchResult, ImplementationRegistry, Quote,
};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors that can occur during gateway operations.
///
/// Provider errors carry the provider's message verbatim; it is shown to the
/// operator and inspected for expired-quote classification.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
	/// Error reported by the delivery provider.
	#[error("{0}")]
	Provider(String),
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The gateway has no usable provider configuration.
	#[error("Delivery provider is not configured.")]
	NotConfigured,
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for delivery provider gateways.
#[async_trait]
pub trait GatewayInterface: Send + Sync {
	/// Returns the configuration schema for this gateway implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Returns true when the delivery subsystem as a whole is configured.
	fn is_configured(&self) -> bool;

	/// Returns true when the given provider has a configuration on this gateway.
	fn is_provider_configured_for(&self, provider: DeliveryProvider) -> bool;

	/// Confirms with the backend that live credentials exist for the provider.
	async fn ensure_provider_configured(
		&self,
		provider: DeliveryProvider,
	) -> Result<bool, GatewayError>;

	/// Requests a delivery quote for an order.
	async fn request_quote(&self, order_id: &str) -> Result<Quote, GatewayError>;

	/// Accepts a previously obtained quote, dispatching a driver.
	async fn accept_quote(
		&self,
		order_id: &str,
		quote_id: &str,
	) -> Result<DispatchResult, GatewayError>;
}

/// Type alias for gateway factory functions.
pub type GatewayFactory = fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>;

/// Registry trait for gateway implementations.
pub trait GatewayRegistry: ImplementationRegistry<Factory = GatewayFactory> {}

/// Get all registered gateway implementations.
///
/// Returns a vector of (name, factory) tuples for all available gateway implementations.
pub fn get_all_implementations() -> Vec<(&'static str, GatewayFactory)> {
	use implementations::{http, memory};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Default classifier pattern: providers say "expired", "gone" or answer 410.
static DEFAULT_EXPIRED_PATTERN: Lazy<Regex> = Lazy::new(|| {
	RegexBuilder::new("expired|gone|410")
		.case_insensitive(true)
		.build()
		.expect("default expired-quote pattern is valid")
});

/// Classifies gateway errors as expired-quote errors.
///
/// Providers report expiry only in free-form text, so the classification is a
/// case-insensitive pattern match on the error message.
#[derive(Debug, Clone)]
pub struct ExpiredQuoteClassifier {
	pattern: Regex,
}

impl ExpiredQuoteClassifier {
	/// Builds a classifier from a case-insensitive pattern.
	pub fn new(pattern: &str) -> Result<Self, GatewayError> {
		let pattern = RegexBuilder::new(pattern)
			.case_insensitive(true)
			.build()
			.map_err(|e| GatewayError::Configuration(format!("Invalid expired pattern: {}", e)))?;
		Ok(Self { pattern })
	}

	/// Returns true when the error reports an expired or vanished quote.
	pub fn is_expired(&self, error: &GatewayError) -> bool {
		self.pattern.is_match(&error.to_string())
	}
}

impl Default for ExpiredQuoteClassifier {
	fn default() -> Self {
		Self {
			pattern: DEFAULT_EXPIRED_PATTERN.clone(),
		}
	}
}

/// Service wrapping the primary gateway implementation.
///
/// Adds logging around every provider call and owns the expired-quote
/// classifier used by the dispatch orchestrator.
pub struct GatewayService {
	/// The underlying gateway implementation.
	implementation: Box<dyn GatewayInterface>,
	classifier: ExpiredQuoteClassifier,
}

impl GatewayService {
	/// Creates a new GatewayService with the specified implementation.
	pub fn new(implementation: Box<dyn GatewayInterface>, classifier: ExpiredQuoteClassifier) -> Self {
		Self {
			implementation,
			classifier,
		}
	}

	pub fn is_configured(&self) -> bool {
		self.implementation.is_configured()
	}

	pub fn is_provider_configured_for(&self, provider: DeliveryProvider) -> bool {
		self.implementation.is_provider_configured_for(provider)
	}

	/// Confirms live credentials for the selected provider.
	pub async fn ensure_selected_provider_configured(
		&self,
		provider: DeliveryProvider,
	) -> Result<bool, GatewayError> {
		let confirmed = self.implementation.ensure_provider_configured(provider).await?;
		if !confirmed {
			tracing::debug!(provider = %provider, "Provider credentials not confirmed");
		}
		Ok(confirmed)
	}

	/// Requests a delivery quote for an order.
	pub async fn request_quote(&self, order_id: &str) -> Result<Quote, GatewayError> {
		let quote = self.implementation.request_quote(order_id).await?;
		tracing::debug!(
			quote_id = %quote.quote_id,
			fee = %quote.fee,
			expires_at = %quote.expires_at,
			"Received quote"
		);
		Ok(quote)
	}

	/// Accepts a quote, dispatching a driver.
	pub async fn accept_quote(
		&self,
		order_id: &str,
		quote_id: &str,
	) -> Result<DispatchResult, GatewayError> {
		self.implementation.accept_quote(order_id, quote_id).await
	}

	/// Returns true when the error reports an expired or vanished quote.
	pub fn is_expired_quote_error(&self, error: &GatewayError) -> bool {
		self.classifier.is_expired(error)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_classifier_matches_expiry_messages() {
		let classifier = ExpiredQuoteClassifier::default();
		for message in [
			"Quote expired",
			"QUOTE EXPIRED at 18:05",
			"Resource is gone",
			"Request failed with status 410",
		] {
			assert!(classifier.is_expired(&GatewayError::Provider(message.to_string())));
		}
	}

	#[test]
	fn test_default_classifier_ignores_other_errors() {
		let classifier = ExpiredQuoteClassifier::default();
		assert!(!classifier.is_expired(&GatewayError::Provider("Address undeliverable".into())));
		assert!(!classifier.is_expired(&GatewayError::NotConfigured));
		assert!(!classifier.is_expired(&GatewayError::Network("connection reset".into())));
	}

	#[test]
	fn test_custom_pattern() {
		let classifier = ExpiredQuoteClassifier::new("quote_stale").unwrap();
		assert!(classifier.is_expired(&GatewayError::Provider("QUOTE_STALE".into())));
		assert!(!classifier.is_expired(&GatewayError::Provider("Quote expired".into())));
		assert!(ExpiredQuoteClassifier::new("(").is_err());
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["http", "memory"]);
	}
}

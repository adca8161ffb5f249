//! HTTP gateway implementation backed by the point-of-sale delivery API.
//!
//! The terminal never talks to a courier network directly. The backend owns
//! provider credentials and exposes quote, accept and credential-status
//! endpoints; this implementation calls them with a bearer token.

use crate::{GatewayError, GatewayFactory, GatewayInterface, GatewayRegistry};
use async_trait::async_trait;
use courier_types::{
	ConfigSchema, DeliveryProvider, DispatchResult, Field, FieldType, ImplementationRegistry,
	Quote, Schema, SecretString, ValidationError,
};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::instrument;

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpGatewayConfig {
	/// Base URL of the delivery API, without trailing slash.
	pub base_url: String,
	/// Bearer token for the delivery API.
	pub api_token: SecretString,
	/// Providers this terminal holds a configuration for.
	#[serde(default)]
	pub configured_providers: Vec<DeliveryProvider>,
	/// Request timeout in seconds.
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
	15
}

/// Credential status reported by the backend for a provider.
#[derive(Debug, Deserialize)]
struct ProviderStatus {
	configured: bool,
}

/// Error body returned by the delivery API.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
	error: Option<String>,
	message: Option<String>,
}

/// HTTP gateway implementation.
pub struct HttpGateway {
	client: reqwest::Client,
	base_url: String,
	api_token: SecretString,
	providers: HashSet<DeliveryProvider>,
}

impl HttpGateway {
	pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_seconds))
			.pool_idle_timeout(Duration::from_secs(90))
			.build()
			.map_err(|e| GatewayError::Configuration(format!("Failed to build client: {}", e)))?;

		Ok(Self {
			client,
			base_url: config.base_url.trim_end_matches('/').to_string(),
			api_token: config.api_token,
			providers: config.configured_providers.into_iter().collect(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	/// Sends a request and decodes a successful JSON body, mapping failures to
	/// the provider's own message.
	async fn send<T: serde::de::DeserializeOwned>(
		&self,
		request: reqwest::RequestBuilder,
	) -> Result<T, GatewayError> {
		let response = request
			.bearer_auth(self.api_token.expose_secret())
			.send()
			.await
			.map_err(|e| GatewayError::Network(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return response
				.json::<T>()
				.await
				.map_err(|e| GatewayError::Network(format!("Invalid response body: {}", e)));
		}

		let body = response.text().await.unwrap_or_default();
		Err(GatewayError::Provider(error_message(status, &body)))
	}
}

/// Builds the operator-facing message for a failed delivery API call.
///
/// The status code is kept in the message so that expiry reported only as
/// `410 Gone` is still recognised by the expired-quote classifier.
fn error_message(status: StatusCode, body: &str) -> String {
	let message = match serde_json::from_str::<ErrorBody>(body) {
		Ok(parsed) => parsed.message.or(parsed.error),
		// Plain-text bodies are used as-is when short enough to show
		Err(_) => Some(body.trim().to_string()).filter(|text| text.len() <= 200),
	}
	.filter(|message| !message.trim().is_empty());

	match message {
		Some(message) => format!("{} (HTTP {})", message, status.as_u16()),
		None => format!("Request failed with status {}", status.as_u16()),
	}
}

#[async_trait]
impl GatewayInterface for HttpGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpGatewaySchema)
	}

	fn is_configured(&self) -> bool {
		!self.base_url.is_empty() && !self.api_token.is_empty()
	}

	fn is_provider_configured_for(&self, provider: DeliveryProvider) -> bool {
		provider.is_daas() && self.providers.contains(&provider)
	}

	#[instrument(skip_all, fields(provider = %provider))]
	async fn ensure_provider_configured(
		&self,
		provider: DeliveryProvider,
	) -> Result<bool, GatewayError> {
		if !self.is_provider_configured_for(provider) {
			return Ok(false);
		}
		let status: ProviderStatus = self
			.send(
				self.client
					.get(self.url(&format!("/delivery/providers/{}/status", provider))),
			)
			.await?;
		Ok(status.configured)
	}

	#[instrument(skip_all, fields(order_id = %order_id))]
	async fn request_quote(&self, order_id: &str) -> Result<Quote, GatewayError> {
		self.send(
			self.client
				.post(self.url(&format!("/delivery/orders/{}/quote", order_id))),
		)
		.await
	}

	#[instrument(skip_all, fields(order_id = %order_id, quote_id = %quote_id))]
	async fn accept_quote(
		&self,
		order_id: &str,
		quote_id: &str,
	) -> Result<DispatchResult, GatewayError> {
		self.send(
			self.client
				.post(self.url(&format!("/delivery/orders/{}/accept", order_id)))
				.json(&serde_json::json!({ "quoteId": quote_id })),
		)
		.await
	}
}

/// Configuration schema for HttpGateway.
pub struct HttpGatewaySchema;

impl ConfigSchema for HttpGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("base_url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("base_url must start with http:// or https://".to_string()),
					}
				}),
				Field::new("api_token", FieldType::String),
			],
			vec![
				Field::new(
					"configured_providers",
					FieldType::Array(Box::new(FieldType::String)),
				)
				.with_validator(|value| {
					let providers = value.as_array().map(Vec::as_slice).unwrap_or_default();
					for provider in providers.iter().filter_map(|p| p.as_str()) {
						let parsed: DeliveryProvider = provider.parse()?;
						if !parsed.is_daas() {
							return Err(format!("'{}' is not a courier network", provider));
						}
					}
					Ok(())
				}),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create an HTTP gateway from configuration.
///
/// Configuration parameters:
/// - `base_url`: delivery API base URL (required)
/// - `api_token`: bearer token (required)
/// - `configured_providers`: courier networks enabled for this terminal
/// - `timeout_seconds`: request timeout, 1-120 (default 15)
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	HttpGatewaySchema
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	let gateway_config: HttpGatewayConfig = config
		.clone()
		.try_into()
		.map_err(|e| GatewayError::Configuration(format!("Invalid http gateway config: {}", e)))?;

	Ok(Box::new(HttpGateway::new(gateway_config)?))
}

/// Registry for the HTTP gateway implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = GatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl GatewayRegistry for Registry {}

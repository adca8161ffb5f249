//! HTTP order directory backed by the point-of-sale order API.
//!
//! Fetches the open orders of the terminal's location; the directory service
//! polls it at the configured interval.

use crate::{DirectoryError, DirectoryFactory, DirectoryRegistry, OrderDirectoryInterface};
use async_trait::async_trait;
use courier_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Order, Schema, SecretString,
	ValidationError,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

/// Configuration for the HTTP order directory.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpDirectoryConfig {
	/// Base URL of the order API, without trailing slash.
	pub base_url: String,
	/// Optional bearer token.
	pub api_token: Option<SecretString>,
	/// Request timeout in seconds.
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
	10
}

/// HTTP order directory implementation.
pub struct HttpDirectory {
	client: reqwest::Client,
	orders_url: String,
	api_token: Option<SecretString>,
}

impl HttpDirectory {
	pub fn new(config: HttpDirectoryConfig) -> Result<Self, DirectoryError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_seconds))
			.build()
			.map_err(|e| DirectoryError::Configuration(format!("Failed to build client: {}", e)))?;

		Ok(Self {
			client,
			orders_url: orders_url(&config.base_url),
			api_token: config.api_token,
		})
	}
}

/// Builds the URL listing orders in the working set.
fn orders_url(base_url: &str) -> String {
	format!(
		"{}/orders?status=pending,preparing,ready",
		base_url.trim_end_matches('/')
	)
}

#[async_trait]
impl OrderDirectoryInterface for HttpDirectory {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpDirectorySchema)
	}

	#[instrument(skip_all)]
	async fn fetch_orders(&self) -> Result<Vec<Order>, DirectoryError> {
		let mut request = self.client.get(&self.orders_url);
		if let Some(token) = &self.api_token {
			request = request.bearer_auth(token.expose_secret());
		}

		let response = request
			.send()
			.await
			.map_err(|e| DirectoryError::Network(e.to_string()))?
			.error_for_status()
			.map_err(|e| DirectoryError::Network(e.to_string()))?;

		response
			.json::<Vec<Order>>()
			.await
			.map_err(|e| DirectoryError::InvalidData(e.to_string()))
	}
}

/// Configuration schema for HttpDirectory.
pub struct HttpDirectorySchema;

impl ConfigSchema for HttpDirectorySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					_ => Err("base_url must start with http:// or https://".to_string()),
				}
			})],
			vec![
				Field::new("api_token", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(60),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create an HTTP order directory from configuration.
pub fn create_directory(
	config: &toml::Value,
) -> Result<Box<dyn OrderDirectoryInterface>, DirectoryError> {
	HttpDirectorySchema
		.validate(config)
		.map_err(|e| DirectoryError::Configuration(e.to_string()))?;

	let directory_config: HttpDirectoryConfig = config.clone().try_into().map_err(|e| {
		DirectoryError::Configuration(format!("Invalid http directory config: {}", e))
	})?;

	Ok(Box::new(HttpDirectory::new(directory_config)?))
}

/// Registry for the HTTP order directory implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = DirectoryFactory;

	fn factory() -> Self::Factory {
		create_directory
	}
}

impl DirectoryRegistry for Registry {}

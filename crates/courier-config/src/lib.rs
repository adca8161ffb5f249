//! Configuration module for the courier dispatch system.
//!
//! This module provides structures and utilities for managing terminal
//! configuration. Configuration is loaded from a TOML file, `${VAR}` and
//! `${VAR:-default}` references are resolved from the environment, and the
//! result is validated before any service is constructed.

#[cfg(any(test, feature = "testing"))]
pub mod builders;

use courier_types::{DeliveryProvider, DispatchPolicy};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for a dispatch terminal.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this terminal.
	pub terminal: TerminalConfig,
	/// Dispatch policy and quote handling.
	pub dispatch: DispatchConfig,
	/// Delivery provider gateway implementations.
	pub gateway: GatewayConfig,
	/// Order directory implementations.
	pub orders: OrdersConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Identity of the terminal.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TerminalConfig {
	/// Unique identifier for this terminal, used in logs.
	pub id: String,
}

/// Dispatch policy and quote handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
	/// Whether ready orders are dispatched without operator action.
	#[serde(default)]
	pub auto_dispatch: bool,
	/// Active delivery provider.
	#[serde(default)]
	pub provider: DeliveryProvider,
	/// Case-insensitive pattern identifying expired-quote errors from the provider.
	#[serde(default = "default_expired_quote_pattern")]
	pub expired_quote_pattern: String,
}

impl DispatchConfig {
	/// Returns the initial dispatch policy described by this section.
	pub fn policy(&self) -> DispatchPolicy {
		DispatchPolicy {
			auto_dispatch: self.auto_dispatch,
			provider: self.provider,
		}
	}
}

/// Returns the default expired-quote pattern.
///
/// Providers report an expired quote as "expired", "gone" or an HTTP 410.
pub fn default_expired_quote_pattern() -> String {
	"expired|gone|410".to_string()
}

/// Configuration for the delivery provider gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of gateway implementation names to their raw TOML configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the order directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of order directory implementation names to their raw TOML configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds between order list refreshes for polled directories.
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
}

fn default_poll_interval_seconds() -> u64 {
	5
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3100
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable VAR_NAME.
/// Supports default values with `${VAR_NAME:-default_value}`.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path.as_ref()).await?;
		content.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - Terminal ID must not be empty
	/// - Gateway and order directory primaries must be configured implementations
	/// - Poll interval must be between 1 and 300 seconds
	/// - The expired-quote pattern must compile
	/// - An enabled API must bind a non-zero port
	fn validate(&self) -> Result<(), ConfigError> {
		if self.terminal.id.is_empty() {
			return Err(ConfigError::Validation("Terminal ID cannot be empty".into()));
		}

		if self.gateway.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Gateway primary implementation cannot be empty".into(),
			));
		}
		if !self
			.gateway
			.implementations
			.contains_key(&self.gateway.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary gateway '{}' not found in implementations",
				self.gateway.primary
			)));
		}

		if self.orders.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Orders primary implementation cannot be empty".into(),
			));
		}
		if !self
			.orders
			.implementations
			.contains_key(&self.orders.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary order directory '{}' not found in implementations",
				self.orders.primary
			)));
		}
		if self.orders.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Orders poll_interval_seconds must be greater than 0".into(),
			));
		}
		if self.orders.poll_interval_seconds > 300 {
			return Err(ConfigError::Validation(
				"Orders poll_interval_seconds cannot exceed 300".into(),
			));
		}

		if self.dispatch.expired_quote_pattern.is_empty() {
			return Err(ConfigError::Validation(
				"Dispatch expired_quote_pattern cannot be empty".into(),
			));
		}
		Regex::new(&self.dispatch.expired_quote_pattern).map_err(|e| {
			ConfigError::Validation(format!("Invalid expired_quote_pattern: {}", e))
		})?;

		if let Some(ref api) = self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation(
					"API port must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses and validates configuration from a TOML string.
///
/// Environment variables are resolved before parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const MINIMAL: &str = r#"
[terminal]
id = "front-counter"

[dispatch]
auto_dispatch = true
provider = "doordash"

[gateway]
primary = "memory"
[gateway.implementations.memory]

[orders]
primary = "memory"
[orders.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("COURIER_TEST_HOST", "localhost");
		std::env::set_var("COURIER_TEST_PORT", "8080");

		let input = "url = \"http://${COURIER_TEST_HOST}:${COURIER_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8080\"");

		std::env::remove_var("COURIER_TEST_HOST");
		std::env::remove_var("COURIER_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${COURIER_MISSING_VAR:-fallback}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${COURIER_MISSING_VAR}\"");
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("COURIER_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.terminal.id, "front-counter");
		assert_eq!(config.orders.poll_interval_seconds, 5);
		assert_eq!(config.dispatch.expired_quote_pattern, "expired|gone|410");
		assert_eq!(
			config.dispatch.policy(),
			DispatchPolicy {
				auto_dispatch: true,
				provider: DeliveryProvider::DoorDash,
			}
		);
		assert!(config.api.is_none());
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let config_str = MINIMAL.replace("primary = \"memory\"\n[gateway", "primary = \"http\"\n[gateway");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary gateway 'http'"));
	}

	#[test]
	fn test_invalid_expired_pattern_rejected() {
		let config_str = MINIMAL.replace(
			"provider = \"doordash\"",
			"provider = \"doordash\"\nexpired_quote_pattern = \"(unclosed\"",
		);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_poll_interval_bounds() {
		let config_str = MINIMAL.replace(
			"primary = \"memory\"\n[orders.implementations",
			"primary = \"memory\"\npoll_interval_seconds = 0\n[orders.implementations",
		);
		assert!(config_str.parse::<Config>().is_err());
	}

	#[test]
	fn test_unknown_provider_rejected() {
		let config_str = MINIMAL.replace("\"doordash\"", "\"lyft\"");
		assert!(matches!(
			config_str.parse::<Config>(),
			Err(ConfigError::Parse(_))
		));
	}

	#[tokio::test]
	async fn test_from_file_resolves_env() {
		std::env::set_var("COURIER_TEST_TERMINAL", "bar-terminal");
		let mut file = tempfile::NamedTempFile::new().unwrap();
		let contents = MINIMAL.replace("\"front-counter\"", "\"${COURIER_TEST_TERMINAL}\"");
		file.write_all(contents.as_bytes()).unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		assert_eq!(config.terminal.id, "bar-terminal");

		std::env::remove_var("COURIER_TEST_TERMINAL");
	}

	#[tokio::test]
	async fn test_from_file_missing() {
		let result = Config::from_file("/nonexistent/courier.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}
}

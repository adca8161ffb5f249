//! Main entry point for the courier dispatch service.
//!
//! Runs the dispatch engine for one restaurant terminal: it watches the
//! terminal's orders, dispatches couriers for ready delivery orders according
//! to the dispatch policy, and optionally serves the operator API.

use clap::Parser;
use courier_config::Config;
use courier_core::{CourierBuilder, CourierFactories, DispatchEngine};
use std::path::PathBuf;
use std::sync::Arc;

mod server;

use courier_gateway::implementations::{
	http::create_gateway as create_http_gateway, memory::create_gateway as create_memory_gateway,
};
use courier_orders::implementations::{
	http::create_directory as create_http_directory,
	memory::create_directory as create_memory_directory,
};

/// Command-line arguments for the courier service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "COURIER_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started courier service");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.terminal.id);

	let engine = Arc::new(build_engine(config.clone())?);

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let engine_task = engine.run();
			let api_task = server::start_server(api_config, Arc::clone(&engine));

			tokio::select! {
				result = engine_task => {
					tracing::info!("Dispatch engine finished");
					result?;
				}
				result = api_task => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting dispatch engine only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped courier service");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the dispatch engine with every available implementation registered.
fn build_engine(config: Config) -> Result<DispatchEngine, Box<dyn std::error::Error>> {
	let gateway_factories = create_factory_map!(
		courier_gateway::GatewayInterface,
		courier_gateway::GatewayError,
		"http" => create_http_gateway,
		"memory" => create_memory_gateway,
	);

	let directory_factories = create_factory_map!(
		courier_orders::OrderDirectoryInterface,
		courier_orders::DirectoryError,
		"http" => create_http_directory,
		"memory" => create_memory_directory,
	);

	let factories = CourierFactories {
		gateway_factories,
		directory_factories,
	};

	Ok(CourierBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_config::builders::ConfigBuilder;
	use std::io::Write;

	#[test]
	fn test_args_defaults() {
		let args = Args::try_parse_from(["courier"]).unwrap();
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args =
			Args::try_parse_from(["courier", "-c", "terminal.toml", "--log-level", "debug"]).unwrap();
		assert_eq!(args.config, PathBuf::from("terminal.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[test]
	fn test_create_factory_map_macro() {
		let factories = create_factory_map!(
			courier_gateway::GatewayInterface,
			courier_gateway::GatewayError,
			"memory" => create_memory_gateway,
		);

		assert_eq!(factories.len(), 1);
		assert!(factories.contains_key("memory"));
	}

	#[test]
	fn test_build_engine_with_memory_implementations() {
		let config = ConfigBuilder::new().terminal_id("front-counter").build();
		let engine = build_engine(config).unwrap();
		assert_eq!(engine.config().terminal.id, "front-counter");
	}

	#[tokio::test]
	async fn test_build_engine_from_config_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[terminal]
id = "drive-thru"

[dispatch]
auto_dispatch = true
provider = "uber"

[gateway]
primary = "memory"
[gateway.implementations.memory]
providers = ["uber"]

[orders]
primary = "memory"
[orders.implementations.memory]
"#
		)
		.unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		let engine = build_engine(config).unwrap();
		assert!(engine.policy().auto_dispatch);
		assert_eq!(
			engine.policy().provider,
			courier_types::DeliveryProvider::Uber
		);
	}
}

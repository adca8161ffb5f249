//! Startup and shutdown of the dispatch engine.

use super::{DispatchEngine, EngineError};

impl DispatchEngine {
	/// Logs the dispatch setup the engine starts with.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let policy = self.policy();
		tracing::info!(
			terminal = %self.config.terminal.id,
			auto_dispatch = policy.auto_dispatch,
			provider = %policy.provider,
			"Initializing dispatch engine"
		);
		Ok(())
	}

	/// Stops the order feed.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down dispatch engine");
		self.directory.stop().await;
		Ok(())
	}
}

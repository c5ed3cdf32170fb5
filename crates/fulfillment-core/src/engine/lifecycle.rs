//! Lifecycle management for the fulfillment engine.
//!
//! Handles initialization and shutdown procedures, ensuring the sweep
//! task does not outlive the engine.

use super::{EngineError, FulfillmentEngine};

impl FulfillmentEngine {
	/// Performs any initialization required before running.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!(service = %self.config.service.id, "Initializing fulfillment engine");
		Ok(())
	}

	/// Performs cleanup operations.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down fulfillment engine");

		if let Some(task) = self.sweep_task.lock().await.take() {
			task.abort();
		}

		Ok(())
	}
}

//! Builder pattern for constructing fulfillment engines.
//!
//! Composes a FulfillmentEngine from pluggable implementations using
//! factory functions, validating configuration as it goes. The storage
//! health check runs here: an unreachable store refuses to build rather
//! than serving without persistence.

use crate::engine::FulfillmentEngine;
use fulfillment_account::implementations::store::StoreAccounts;
use fulfillment_account::AccountService;
use fulfillment_config::Config;
use fulfillment_mailer::{MailerError, MailerInterface, MailerService};
use fulfillment_storage::{StorageError, StorageInterface, StorageService};
use fulfillment_types::{SharedClock, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Storage unavailable: {0}")]
	Storage(String),
}

/// Container for the factory functions needed to build an engine.
pub struct EngineFactories<SF, MF> {
	pub storage_factories: HashMap<String, SF>,
	pub mailer_factories: HashMap<String, MF>,
}

/// Builder for constructing a FulfillmentEngine with pluggable
/// implementations.
pub struct EngineBuilder {
	config: Config,
	clock: Option<SharedClock>,
}

impl EngineBuilder {
	/// Creates a new EngineBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: None,
		}
	}

	/// Overrides the engine clock. Defaults to the system clock.
	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.clock = Some(clock);
		self
	}

	/// Builds the FulfillmentEngine using factories for each component
	/// type.
	pub async fn build<SF, MF>(
		self,
		factories: EngineFactories<SF, MF>,
	) -> Result<FulfillmentEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		MF: Fn(&toml::Value) -> Result<Box<dyn MailerInterface>, MailerError>,
	{
		// Primary storage backend
		let storage_name = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(storage_name)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"No configuration for storage implementation '{}'",
					storage_name
				))
			})?;
		let storage_factory = factories.storage_factories.get(storage_name).ok_or_else(|| {
			BuilderError::Config(format!("Unknown storage implementation '{}'", storage_name))
		})?;
		let backend = storage_factory(storage_config).map_err(|e| {
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				storage_name, e
			))
		})?;
		tracing::info!(component = "storage", implementation = %storage_name, "Loaded");

		let storage = Arc::new(StorageService::new(backend));

		// Refuse to serve without a reachable store
		storage
			.health_check()
			.await
			.map_err(|e| BuilderError::Storage(e.to_string()))?;

		// Mail transport
		let mailer_name = &self.config.mailer.primary;
		let mailer_config = self
			.config
			.mailer
			.implementations
			.get(mailer_name)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"No configuration for mailer implementation '{}'",
					mailer_name
				))
			})?;
		let mailer_factory = factories.mailer_factories.get(mailer_name).ok_or_else(|| {
			BuilderError::Config(format!("Unknown mailer implementation '{}'", mailer_name))
		})?;
		let transport = mailer_factory(mailer_config).map_err(|e| {
			BuilderError::Config(format!(
				"Failed to create mailer implementation '{}': {}",
				mailer_name, e
			))
		})?;
		tracing::info!(component = "mailer", implementation = %mailer_name, "Loaded");

		let mailer = Arc::new(MailerService::new(transport));
		let accounts = Arc::new(AccountService::new(Box::new(StoreAccounts::new(
			storage.clone(),
		))));
		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

		Ok(FulfillmentEngine::new(
			self.config,
			storage,
			accounts,
			mailer,
			clock,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn factories() -> EngineFactories<
		fulfillment_storage::StorageFactory,
		fulfillment_mailer::MailerFactory,
	> {
		let mut storage_factories = HashMap::new();
		for (name, factory) in fulfillment_storage::get_all_implementations() {
			storage_factories.insert(name.to_string(), factory);
		}
		let mut mailer_factories = HashMap::new();
		for (name, factory) in fulfillment_mailer::get_all_implementations() {
			mailer_factories.insert(name.to_string(), factory);
		}
		EngineFactories {
			storage_factories,
			mailer_factories,
		}
	}

	const MINIMAL: &str = r#"
[service]
id = "fulfillment-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[mailer]
primary = "log"
[mailer.implementations.log]
"#;

	#[tokio::test]
	async fn builds_engine_from_minimal_config() {
		let config = Config::from_toml_str(MINIMAL).unwrap();
		let engine = EngineBuilder::new(config).build(factories()).await.unwrap();
		let (orders, total) = engine
			.orders()
			.list_orders_by_owner("guest", None, 10, 0)
			.await
			.unwrap();
		assert!(orders.is_empty());
		assert_eq!(total, 0);
	}

	#[tokio::test]
	async fn unknown_storage_implementation_is_rejected() {
		let raw = MINIMAL.replace("primary = \"memory\"", "primary = \"cluster\"").replace(
			"[storage.implementations.memory]",
			"[storage.implementations.cluster]",
		);
		let config = Config::from_toml_str(&raw).unwrap();
		let result = EngineBuilder::new(config).build(factories()).await;
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}
}

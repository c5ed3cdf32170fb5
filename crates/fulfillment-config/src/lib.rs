//! Configuration module for the fulfillment engine.
//!
//! This module provides structures and utilities for managing engine
//! configuration. It supports loading configuration from TOML files and
//! validates that every referenced implementation actually has a
//! configuration table before the engine starts wiring components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
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
		// Keep the message, drop the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the fulfillment engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this engine instance.
	pub service: ServiceConfig,
	/// Configuration for the document-store backend.
	pub storage: StorageConfig,
	/// Configuration for outbound email.
	pub mailer: MailerConfig,
	/// Configuration for the auto-completion sweep.
	#[serde(default)]
	pub sweep: SweepConfig,
}

/// Configuration specific to the engine instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
	/// Capacity of the engine's event bus channel.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
	256
}

/// Configuration for the document-store backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for outbound email.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailerConfig {
	/// Which transport to use as primary.
	pub primary: String,
	/// Map of mail transport names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the auto-completion sweep.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
	/// Seconds between sweep passes.
	#[serde(default = "default_sweep_interval_seconds")]
	pub interval_seconds: u64,
	/// Hours an in-flight order may sit past confirmation before the
	/// sweep promotes it to delivered.
	#[serde(default = "default_grace_period_hours")]
	pub grace_period_hours: u64,
	/// Seconds after boot before the first sweep pass.
	#[serde(default = "default_startup_delay_seconds")]
	pub startup_delay_seconds: u64,
}

impl Default for SweepConfig {
	fn default() -> Self {
		Self {
			interval_seconds: default_sweep_interval_seconds(),
			grace_period_hours: default_grace_period_hours(),
			startup_delay_seconds: default_startup_delay_seconds(),
		}
	}
}

/// Returns the default interval between sweep passes (one hour).
fn default_sweep_interval_seconds() -> u64 {
	3600
}

/// Returns the default grace window after confirmation (two days).
fn default_grace_period_hours() -> u64 {
	48
}

/// Returns the default delay before the first sweep pass.
fn default_startup_delay_seconds() -> u64 {
	5
}

impl Config {
	/// Parses and validates configuration from a TOML string.
	pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(raw)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads and validates configuration from a file.
	pub async fn from_file_async(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let raw = tokio::fs::read_to_string(path).await?;
		Self::from_toml_str(&raw)
	}

	/// Checks cross-field consistency the type system cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("service.id must not be empty".into()));
		}
		if !self.storage.implementations.contains_key(&self.storage.primary) {
			return Err(ConfigError::Validation(format!(
				"storage.primary '{}' has no configuration table",
				self.storage.primary
			)));
		}
		if !self.mailer.implementations.contains_key(&self.mailer.primary) {
			return Err(ConfigError::Validation(format!(
				"mailer.primary '{}' has no configuration table",
				self.mailer.primary
			)));
		}
		if self.sweep.interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"sweep.interval_seconds must be positive".into(),
			));
		}
		if self.sweep.grace_period_hours == 0 {
			return Err(ConfigError::Validation(
				"sweep.grace_period_hours must be positive".into(),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const MINIMAL: &str = r#"
[service]
id = "fulfillment-1"

[storage]
primary = "memory"
[storage.implementations.memory]

[mailer]
primary = "log"
[mailer.implementations.log]
"#;

	#[test]
	fn minimal_config_parses_with_defaults() {
		let config = Config::from_toml_str(MINIMAL).unwrap();
		assert_eq!(config.service.id, "fulfillment-1");
		assert_eq!(config.sweep.interval_seconds, 3600);
		assert_eq!(config.sweep.grace_period_hours, 48);
		assert_eq!(config.service.event_capacity, 256);
	}

	#[test]
	fn primary_without_table_is_rejected() {
		let raw = r#"
[service]
id = "fulfillment-1"

[storage]
primary = "file"
[storage.implementations.memory]

[mailer]
primary = "log"
[mailer.implementations.log]
"#;
		assert!(matches!(
			Config::from_toml_str(raw),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn sweep_overrides_apply() {
		let raw = format!("{}\n[sweep]\ninterval_seconds = 60\ngrace_period_hours = 1\n", MINIMAL);
		let config = Config::from_toml_str(&raw).unwrap();
		assert_eq!(config.sweep.interval_seconds, 60);
		assert_eq!(config.sweep.grace_period_hours, 1);
	}

	#[tokio::test]
	async fn loads_from_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.toml");
		fs::write(&path, MINIMAL).unwrap();

		let config = Config::from_file_async(&path).await.unwrap();
		assert_eq!(config.storage.primary, "memory");
	}
}

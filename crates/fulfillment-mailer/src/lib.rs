//! Email delivery module for the fulfillment engine.
//!
//! This module handles outbound transactional email, currently only the
//! order confirmation sent after checkout. Transports are pluggable: an
//! HTTP-API transport for production and a log-only transport for
//! development. Sending is always best-effort; callers log failures and
//! never propagate them.

use async_trait::async_trait;
use fulfillment_types::{ConfigSchema, ImplementationRegistry};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod log;
}

pub mod templates;

/// Errors that can occur during email delivery.
#[derive(Debug, Error)]
pub enum MailerError {
	/// Network communication with the mail provider failed.
	#[error("Network error: {0}")]
	Network(String),
	/// The provider rejected the message.
	#[error("Rejected: {0}")]
	Rejected(String),
	/// Configuration validation failed.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for mail transports.
#[async_trait]
pub trait MailerInterface: Send + Sync {
	/// Returns the configuration schema for this transport.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Sends one HTML email.
	async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailerError>;
}

/// Type alias for mailer factory functions.
pub type MailerFactory = fn(&toml::Value) -> Result<Box<dyn MailerInterface>, MailerError>;

/// Registry trait for mailer implementations.
pub trait MailerRegistry: ImplementationRegistry<Factory = MailerFactory> {}

/// Get all registered mailer implementations.
pub fn get_all_implementations() -> Vec<(&'static str, MailerFactory)> {
	use implementations::{http, log};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(log::Registry::NAME, log::Registry::factory()),
	]
}

/// Service that manages outbound email.
pub struct MailerService {
	transport: Box<dyn MailerInterface>,
}

impl MailerService {
	/// Creates a new MailerService with the specified transport.
	pub fn new(transport: Box<dyn MailerInterface>) -> Self {
		Self { transport }
	}

	/// Sends one HTML email through the configured transport.
	pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailerError> {
		self.transport.send(to, subject, html).await
	}
}

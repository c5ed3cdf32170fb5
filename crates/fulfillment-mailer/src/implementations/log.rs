//! Log-only mail transport.
//!
//! Records the message in the log instead of sending it. Used in
//! development and anywhere no mail provider is configured.

use crate::{MailerError, MailerInterface};
use async_trait::async_trait;
use fulfillment_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};

/// Transport that logs messages instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl MailerInterface for LogMailer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogMailerSchema)
	}

	async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailerError> {
		tracing::info!(
			to = %to,
			subject = %subject,
			bytes = html.len(),
			"Email suppressed by log transport"
		);
		Ok(())
	}
}

/// Configuration schema for LogMailer.
pub struct LogMailerSchema;

impl ConfigSchema for LogMailerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// No configuration required
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Registry for the log mail transport.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = crate::MailerFactory;

	fn factory() -> Self::Factory {
		create_mailer
	}
}

impl crate::MailerRegistry for Registry {}

/// Factory function to create the log transport.
pub fn create_mailer(_config: &toml::Value) -> Result<Box<dyn MailerInterface>, MailerError> {
	Ok(Box::new(LogMailer))
}

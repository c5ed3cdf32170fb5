//! HTTP-API mail transport.
//!
//! Submits messages to a transactional-mail provider over its JSON HTTP
//! endpoint. The endpoint URL, API key and sender address come from
//! configuration.

use crate::{MailerError, MailerInterface};
use async_trait::async_trait;
use fulfillment_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	ValidationError};
use serde_json::json;

/// Mail transport over a provider's HTTP API.
pub struct HttpMailer {
	client: reqwest::Client,
	endpoint: String,
	api_key: String,
	from_address: String,
}

impl HttpMailer {
	pub fn new(endpoint: String, api_key: String, from_address: String) -> Self {
		Self {
			client: reqwest::Client::new(),
			endpoint,
			api_key,
			from_address,
		}
	}
}

#[async_trait]
impl MailerInterface for HttpMailer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpMailerSchema)
	}

	async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailerError> {
		let body = json!({
			"from": self.from_address,
			"to": to,
			"subject": subject,
			"html": html,
		});

		let response = self
			.client
			.post(&self.endpoint)
			.bearer_auth(&self.api_key)
			.json(&body)
			.send()
			.await
			.map_err(|e| MailerError::Network(e.to_string()))?;

		if !response.status().is_success() {
			let status = response.status();
			let detail = response.text().await.unwrap_or_default();
			return Err(MailerError::Rejected(format!("{}: {}", status, detail)));
		}

		Ok(())
	}
}

/// Configuration schema for HttpMailer.
pub struct HttpMailerSchema;

impl ConfigSchema for HttpMailerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("endpoint", FieldType::String),
				Field::new("api_key", FieldType::String),
				Field::new("from_address", FieldType::String),
			],
			vec![],
		);
		schema.validate(config)
	}
}

/// Registry for the HTTP mail transport.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = crate::MailerFactory;

	fn factory() -> Self::Factory {
		create_mailer
	}
}

impl crate::MailerRegistry for Registry {}

/// Factory function to create an HTTP mail transport from configuration.
///
/// Configuration parameters:
/// - `endpoint`: provider submission URL (required)
/// - `api_key`: bearer token (required)
/// - `from_address`: sender address (required)
pub fn create_mailer(config: &toml::Value) -> Result<Box<dyn MailerInterface>, MailerError> {
	HttpMailerSchema
		.validate(config)
		.map_err(|e| MailerError::Configuration(e.to_string()))?;

	let field = |name: &str| -> Result<String, MailerError> {
		config
			.get(name)
			.and_then(|v| v.as_str())
			.map(str::to_string)
			.ok_or_else(|| MailerError::Configuration(format!("Missing '{}'", name)))
	};

	Ok(Box::new(HttpMailer::new(
		field("endpoint")?,
		field("api_key")?,
		field("from_address")?,
	)))
}

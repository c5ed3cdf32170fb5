//! Account lookup module for the fulfillment engine.
//!
//! Accounts belong to the excluded user-management subsystem; this module
//! only reads them. It provides the lookup interface the engine consumes
//! for guest-to-account reconciliation and for resolving an order owner's
//! on-file email address.

use async_trait::async_trait;
use fulfillment_types::AccountRecord;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod store;
}

/// Errors that can occur during account lookups.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The underlying account store failed.
	#[error("Lookup failed: {0}")]
	Lookup(String),
}

/// Trait defining the interface for account lookup implementations.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Finds an account by its exact stored phone value.
	async fn find_by_phone(&self, phone: &str) -> Result<Option<AccountRecord>, AccountError>;

	/// Finds an account by id.
	async fn find_by_id(&self, id: &str) -> Result<Option<AccountRecord>, AccountError>;

	/// Returns every account, for the normalized-phone fallback scan.
	async fn list_all(&self) -> Result<Vec<AccountRecord>, AccountError>;
}

/// Strips whitespace and common punctuation from a phone string.
///
/// Stored phone values and checkout input disagree on formatting
/// ("090 123 4567" vs "0901234567"), so matching happens on this
/// normalized form.
pub fn normalize_phone(phone: &str) -> String {
	phone
		.chars()
		.filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')' | '.'))
		.collect()
}

/// Service that resolves accounts for the fulfillment engine.
///
/// Wraps a lookup implementation and owns the phone-matching cascade:
/// exact stored value, then the normalized form, then a full scan
/// normalizing every stored phone. The final scan is O(n) and acceptable
/// only at the expected account volume.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	/// Creates a new AccountService with the specified implementation.
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	/// Finds the account matching a (possibly differently formatted)
	/// phone number.
	pub async fn find_by_phone(
		&self,
		phone: &str,
	) -> Result<Option<AccountRecord>, AccountError> {
		// Exact match first
		if let Some(account) = self.implementation.find_by_phone(phone).await? {
			return Ok(Some(account));
		}

		let normalized = normalize_phone(phone);
		if normalized != phone {
			if let Some(account) = self.implementation.find_by_phone(&normalized).await? {
				return Ok(Some(account));
			}
		}

		// Fallback: normalize every stored phone and compare
		let accounts = self.implementation.list_all().await?;
		Ok(accounts
			.into_iter()
			.find(|account| normalize_phone(&account.phone) == normalized))
	}

	/// Finds an account by id.
	pub async fn find_by_id(&self, id: &str) -> Result<Option<AccountRecord>, AccountError> {
		self.implementation.find_by_id(id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::sync::Arc;

	struct FixtureAccounts {
		by_id: HashMap<String, AccountRecord>,
	}

	#[async_trait]
	impl AccountInterface for FixtureAccounts {
		async fn find_by_phone(
			&self,
			phone: &str,
		) -> Result<Option<AccountRecord>, AccountError> {
			Ok(self.by_id.values().find(|a| a.phone == phone).cloned())
		}

		async fn find_by_id(&self, id: &str) -> Result<Option<AccountRecord>, AccountError> {
			Ok(self.by_id.get(id).cloned())
		}

		async fn list_all(&self) -> Result<Vec<AccountRecord>, AccountError> {
			Ok(self.by_id.values().cloned().collect())
		}
	}

	fn service() -> AccountService {
		let account = AccountRecord {
			id: "acc-1".into(),
			phone: "0901234567".into(),
			emails: vec!["owner@example.com".into()],
			name: Some("A. Customer".into()),
		};
		let mut by_id = HashMap::new();
		by_id.insert(account.id.clone(), account);
		AccountService::new(Box::new(FixtureAccounts { by_id }))
	}

	#[tokio::test]
	async fn exact_phone_matches() {
		let found = service().find_by_phone("0901234567").await.unwrap();
		assert_eq!(found.unwrap().id, "acc-1");
	}

	#[tokio::test]
	async fn formatted_phone_matches_through_normalization() {
		let found = service().find_by_phone("090 123 4567").await.unwrap();
		assert_eq!(found.unwrap().id, "acc-1");

		let found = service().find_by_phone("(090) 123-4567").await.unwrap();
		assert_eq!(found.unwrap().id, "acc-1");
	}

	#[tokio::test]
	async fn unknown_phone_misses() {
		let found = service().find_by_phone("0999999999").await.unwrap();
		assert!(found.is_none());
	}

	#[tokio::test]
	async fn fallback_scan_normalizes_stored_phones() {
		let account = AccountRecord {
			id: "acc-2".into(),
			phone: "091 555-0000".into(),
			emails: vec![],
			name: None,
		};
		let mut by_id = HashMap::new();
		by_id.insert(account.id.clone(), account);
		let service = AccountService::new(Box::new(FixtureAccounts { by_id }));

		let found = service.find_by_phone("0915550000").await.unwrap();
		assert_eq!(found.unwrap().id, "acc-2");
	}

	#[tokio::test]
	async fn shared_service_is_send_sync() {
		// AccountService is shared across engine tasks behind an Arc.
		fn assert_shareable<T: Send + Sync>(_: &T) {}
		let service = Arc::new(service());
		assert_shareable(&service);
	}
}

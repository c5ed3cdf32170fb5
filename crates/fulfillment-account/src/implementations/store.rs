//! Document-store-backed account lookup.
//!
//! Reads the shared `users` collection written by the user-management
//! subsystem. This is the production implementation; tests stub the
//! interface directly.

use crate::{AccountError, AccountInterface};
use async_trait::async_trait;
use fulfillment_storage::StorageService;
use fulfillment_types::{AccountRecord, Collection, Filter, FindOptions};
use std::sync::Arc;

/// Account lookup over the shared document store.
pub struct StoreAccounts {
	storage: Arc<StorageService>,
}

impl StoreAccounts {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}
}

#[async_trait]
impl AccountInterface for StoreAccounts {
	async fn find_by_phone(&self, phone: &str) -> Result<Option<AccountRecord>, AccountError> {
		self.storage
			.find_one(Collection::Accounts, &Filter::new().eq("phone", phone))
			.await
			.map_err(|e| AccountError::Lookup(e.to_string()))
	}

	async fn find_by_id(&self, id: &str) -> Result<Option<AccountRecord>, AccountError> {
		self.storage
			.find_one(Collection::Accounts, &Filter::new().eq("id", id))
			.await
			.map_err(|e| AccountError::Lookup(e.to_string()))
	}

	async fn list_all(&self) -> Result<Vec<AccountRecord>, AccountError> {
		self.storage
			.find_many(Collection::Accounts, &Filter::new(), &FindOptions::new())
			.await
			.map_err(|e| AccountError::Lookup(e.to_string()))
	}
}

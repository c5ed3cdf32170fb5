//! Identity resolution for caller-supplied order references.
//!
//! Every entry point that accepts an order reference goes through here.
//! The priority rule lives in [`OrderRef::parse`]; this resolver only
//! executes the lookups the classification allows. A ticket-format
//! reference is never attempted as a store key and a raw key is never
//! minted into a ticket, so the two addressing schemes cannot shadow
//! each other.

use crate::orders::OrderError;
use fulfillment_storage::StorageService;
use fulfillment_types::{Collection, Filter, Order, OrderRef};
use std::sync::Arc;

/// Resolves order references against the store.
pub struct IdentityResolver {
	storage: Arc<StorageService>,
}

impl IdentityResolver {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Finds the order a reference addresses, or `NotFound`.
	pub async fn resolve(&self, reference: &OrderRef) -> Result<Order, OrderError> {
		let found = match reference {
			OrderRef::Ticket(raw) => self.by_ticket(raw).await?,
			OrderRef::RawKey(raw) => match self.by_ticket(raw).await? {
				Some(order) => Some(order),
				None => self.by_key(raw).await?,
			},
			OrderRef::Ambiguous(raw) => self.by_ticket(raw).await?,
		};
		found.ok_or_else(|| OrderError::NotFound(reference.as_str().to_string()))
	}

	async fn by_ticket(&self, ticket: &str) -> Result<Option<Order>, OrderError> {
		self.storage
			.find_one(Collection::Orders, &Filter::new().eq("ticketNumber", ticket))
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))
	}

	async fn by_key(&self, key: &str) -> Result<Option<Order>, OrderError> {
		self.storage
			.find_one(Collection::Orders, &Filter::new().eq("id", key))
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))
	}
}

//! In-memory storage backend for the fulfillment engine.
//!
//! This module provides a memory-based implementation of the
//! StorageInterface trait, useful for testing and development scenarios
//! where persistence is not required. All filtered updates run under one
//! write lock, which is what makes them behave as atomic compare-and-set
//! operations.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use fulfillment_types::{
	ConfigSchema, Filter, FindOptions, ImplementationRegistry, Schema, SortOrder, Update,
	ValidationError,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory storage implementation.
///
/// Documents live in per-collection vectors in insertion order,
/// protected by a read-write lock. No persistence across restarts.
pub struct MemoryStorage {
	collections: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			collections: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

/// Sorts documents in place by a field according to the options.
pub(crate) fn sort_documents(documents: &mut [Value], options: &FindOptions) {
	if let Some((field, order)) = &options.sort {
		documents.sort_by(|a, b| {
			let left = a.get(field.as_str());
			let right = b.get(field.as_str());
			let ordering = match (left, right) {
				(Some(l), Some(r)) => {
					fulfillment_types::storage::compare(l, r).unwrap_or(Ordering::Equal)
				},
				(Some(_), None) => Ordering::Greater,
				(None, Some(_)) => Ordering::Less,
				(None, None) => Ordering::Equal,
			};
			match order {
				SortOrder::Ascending => ordering,
				SortOrder::Descending => ordering.reverse(),
			}
		});
	}
}

/// Applies skip and limit to an already-sorted result set.
pub(crate) fn paginate(documents: Vec<Value>, options: &FindOptions) -> Vec<Value> {
	let skipped = documents.into_iter().skip(options.skip);
	match options.limit {
		Some(limit) => skipped.take(limit).collect(),
		None => skipped.collect(),
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn insert(&self, collection: &str, mut document: Value) -> Result<String, StorageError> {
		// An empty id counts as unassigned
		let existing_id = document
			.get("id")
			.and_then(Value::as_str)
			.filter(|id| !id.is_empty())
			.map(str::to_string);
		let id = match existing_id {
			Some(existing) => existing,
			None => {
				let assigned = Uuid::new_v4().to_string();
				if let Some(object) = document.as_object_mut() {
					object.insert("id".into(), Value::String(assigned.clone()));
				} else {
					return Err(StorageError::Backend(
						"Document must be a JSON object".into(),
					));
				}
				assigned
			},
		};
		let mut collections = self.collections.write().await;
		collections.entry(collection.to_string()).or_default().push(document);
		Ok(id)
	}

	async fn find_one(
		&self,
		collection: &str,
		filter: &Filter,
	) -> Result<Option<Value>, StorageError> {
		let collections = self.collections.read().await;
		Ok(collections
			.get(collection)
			.and_then(|documents| documents.iter().find(|d| filter.matches(d)).cloned()))
	}

	async fn find_many(
		&self,
		collection: &str,
		filter: &Filter,
		options: &FindOptions,
	) -> Result<Vec<Value>, StorageError> {
		let collections = self.collections.read().await;
		let mut matched: Vec<Value> = collections
			.get(collection)
			.map(|documents| documents.iter().filter(|d| filter.matches(d)).cloned().collect())
			.unwrap_or_default();
		sort_documents(&mut matched, options);
		Ok(paginate(matched, options))
	}

	async fn update_one(
		&self,
		collection: &str,
		filter: &Filter,
		update: &Update,
	) -> Result<u64, StorageError> {
		let mut collections = self.collections.write().await;
		let Some(documents) = collections.get_mut(collection) else {
			return Ok(0);
		};
		match documents.iter_mut().find(|d| filter.matches(d)) {
			Some(document) => {
				update.apply(document);
				Ok(1)
			},
			None => Ok(0),
		}
	}

	async fn update_many(
		&self,
		collection: &str,
		filter: &Filter,
		update: &Update,
	) -> Result<u64, StorageError> {
		let mut collections = self.collections.write().await;
		let Some(documents) = collections.get_mut(collection) else {
			return Ok(0);
		};
		let mut modified = 0;
		for document in documents.iter_mut().filter(|d| filter.matches(d)) {
			update.apply(document);
			modified += 1;
		}
		Ok(modified)
	}

	async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError> {
		let mut collections = self.collections.write().await;
		let Some(documents) = collections.get_mut(collection) else {
			return Ok(0);
		};
		match documents.iter().position(|d| filter.matches(d)) {
			Some(index) => {
				documents.remove(index);
				Ok(1)
			},
			None => Ok(0),
		}
	}

	async fn count_documents(
		&self,
		collection: &str,
		filter: &Filter,
	) -> Result<u64, StorageError> {
		let collections = self.collections.read().await;
		Ok(collections
			.get(collection)
			.map(|documents| documents.iter().filter(|d| filter.matches(d)).count() as u64)
			.unwrap_or(0))
	}

	async fn health_check(&self) -> Result<(), StorageError> {
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_types::Condition;
	use serde_json::json;

	#[tokio::test]
	async fn insert_assigns_store_key() {
		let storage = MemoryStorage::new();
		let id = storage
			.insert("orders", json!({"status": "pending"}))
			.await
			.unwrap();
		assert!(Uuid::parse_str(&id).is_ok());

		let found = storage
			.find_one("orders", &Filter::new().eq("id", id))
			.await
			.unwrap();
		assert!(found.is_some());
	}

	#[tokio::test]
	async fn conditional_update_misses_when_precondition_changed() {
		let storage = MemoryStorage::new();
		let id = storage
			.insert("orders", json!({"status": "pending"}))
			.await
			.unwrap();

		let stale = Filter::new().eq("id", id.clone()).eq("status", "shipping");
		let modified = storage
			.update_one("orders", &stale, &Update::new().set("status", "delivered"))
			.await
			.unwrap();
		assert_eq!(modified, 0);

		let current = Filter::new().eq("id", id).eq("status", "pending");
		let modified = storage
			.update_one("orders", &current, &Update::new().set("status", "confirmed"))
			.await
			.unwrap();
		assert_eq!(modified, 1);
	}

	#[tokio::test]
	async fn update_many_touches_only_matching_documents() {
		let storage = MemoryStorage::new();
		for status in ["processing", "shipping", "delivered"] {
			storage
				.insert("orders", json!({"status": status}))
				.await
				.unwrap();
		}

		let filter = Filter::new().field(
			"status",
			Condition::In(vec![json!("processing"), json!("shipping")]),
		);
		let modified = storage
			.update_many("orders", &filter, &Update::new().set("status", "delivered"))
			.await
			.unwrap();
		assert_eq!(modified, 2);

		let delivered = storage
			.count_documents("orders", &Filter::new().eq("status", "delivered"))
			.await
			.unwrap();
		assert_eq!(delivered, 3);
	}

	#[tokio::test]
	async fn find_many_sorts_and_paginates() {
		let storage = MemoryStorage::new();
		for (i, ts) in ["2026-01-01T00:00:00Z", "2026-01-03T00:00:00Z", "2026-01-02T00:00:00Z"]
			.iter()
			.enumerate()
		{
			storage
				.insert("notifications", json!({"seq": i, "createdAt": ts}))
				.await
				.unwrap();
		}

		let options = FindOptions::new()
			.sort("createdAt", SortOrder::Descending)
			.limit(2);
		let found = storage
			.find_many("notifications", &Filter::new(), &options)
			.await
			.unwrap();
		assert_eq!(found.len(), 2);
		assert_eq!(found[0]["createdAt"], "2026-01-03T00:00:00Z");
		assert_eq!(found[1]["createdAt"], "2026-01-02T00:00:00Z");
	}

	#[tokio::test]
	async fn racing_conditional_updates_have_one_winner() {
		let storage = Arc::new(MemoryStorage::new());
		let id = storage
			.insert("orders", json!({"status": "shipping"}))
			.await
			.unwrap();

		let mut handles = Vec::new();
		for target in ["cancelled", "delivered"] {
			let storage = storage.clone();
			let id = id.clone();
			handles.push(tokio::spawn(async move {
				let filter = Filter::new().eq("id", id).eq("status", "shipping");
				storage
					.update_one("orders", &filter, &Update::new().set("status", target))
					.await
					.unwrap()
			}));
		}

		let mut total = 0;
		for handle in handles {
			total += handle.await.unwrap();
		}
		assert_eq!(total, 1);
	}
}

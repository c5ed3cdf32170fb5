//! Document storage module for the fulfillment engine.
//!
//! This module provides the generic document-store interface the engine
//! consumes: filtered lookups, conditional updates and batch updates over
//! named collections. Backends are pluggable; an in-memory implementation
//! serves tests and development, a file-backed implementation provides
//! single-node persistence.

use async_trait::async_trait;
use fulfillment_types::{
	Collection, ConfigSchema, Filter, FindOptions, ImplementationRegistry, Update,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// A requested document is not found.
	#[error("Not found")]
	NotFound,
	/// Serialization or deserialization failed.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The storage backend failed.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Configuration validation failed.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for document-store backends.
///
/// Backends operate on raw JSON documents grouped into collections. The
/// filtered update operations are required to be atomic per call: a
/// concurrent writer observes either none or all of an update's effects,
/// and the returned count reflects documents that actually matched at
/// apply time.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Inserts a document, assigning and returning its store key. A
	/// pre-existing `id` field is kept as-is.
	async fn insert(&self, collection: &str, document: Value) -> Result<String, StorageError>;

	/// Returns the first document matching the filter.
	async fn find_one(
		&self,
		collection: &str,
		filter: &Filter,
	) -> Result<Option<Value>, StorageError>;

	/// Returns all documents matching the filter, honoring sort, skip and
	/// limit options.
	async fn find_many(
		&self,
		collection: &str,
		filter: &Filter,
		options: &FindOptions,
	) -> Result<Vec<Value>, StorageError>;

	/// Applies the update to the first matching document. Returns the
	/// number of documents modified (0 or 1).
	async fn update_one(
		&self,
		collection: &str,
		filter: &Filter,
		update: &Update,
	) -> Result<u64, StorageError>;

	/// Applies the update to every matching document in one atomic pass.
	/// Returns the number of documents modified.
	async fn update_many(
		&self,
		collection: &str,
		filter: &Filter,
		update: &Update,
	) -> Result<u64, StorageError>;

	/// Deletes the first matching document. Returns the number deleted.
	async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError>;

	/// Counts documents matching the filter.
	async fn count_documents(&self, collection: &str, filter: &Filter)
		-> Result<u64, StorageError>;

	/// Verifies the backend is reachable and writable. Called once at
	/// boot; a failure here must prevent the engine from serving.
	async fn health_check(&self) -> Result<(), StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns (name, factory) tuples for every available backend; the service
/// binary feeds these into the builder's factory map.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level storage service that provides typed operations.
///
/// Wraps a backend and converts between domain types and raw documents, so
/// callers never touch `serde_json::Value` directly.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Inserts a typed document and returns its assigned store key.
	pub async fn insert<T: Serialize>(
		&self,
		collection: Collection,
		value: &T,
	) -> Result<String, StorageError> {
		let document =
			serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.insert(collection.as_str(), document).await
	}

	/// Finds and deserializes the first matching document.
	pub async fn find_one<T: DeserializeOwned>(
		&self,
		collection: Collection,
		filter: &Filter,
	) -> Result<Option<T>, StorageError> {
		let found = self.backend.find_one(collection.as_str(), filter).await?;
		found
			.map(|document| {
				serde_json::from_value(document)
					.map_err(|e| StorageError::Serialization(e.to_string()))
			})
			.transpose()
	}

	/// Finds and deserializes all matching documents.
	pub async fn find_many<T: DeserializeOwned>(
		&self,
		collection: Collection,
		filter: &Filter,
		options: &FindOptions,
	) -> Result<Vec<T>, StorageError> {
		let found = self
			.backend
			.find_many(collection.as_str(), filter, options)
			.await?;
		found
			.into_iter()
			.map(|document| {
				serde_json::from_value(document)
					.map_err(|e| StorageError::Serialization(e.to_string()))
			})
			.collect()
	}

	/// Applies a conditional update to the first matching document.
	pub async fn update_one(
		&self,
		collection: Collection,
		filter: &Filter,
		update: &Update,
	) -> Result<u64, StorageError> {
		self.backend
			.update_one(collection.as_str(), filter, update)
			.await
	}

	/// Applies a conditional update to every matching document.
	pub async fn update_many(
		&self,
		collection: Collection,
		filter: &Filter,
		update: &Update,
	) -> Result<u64, StorageError> {
		self.backend
			.update_many(collection.as_str(), filter, update)
			.await
	}

	/// Deletes the first matching document.
	pub async fn delete_one(
		&self,
		collection: Collection,
		filter: &Filter,
	) -> Result<u64, StorageError> {
		self.backend.delete_one(collection.as_str(), filter).await
	}

	/// Counts documents matching the filter.
	pub async fn count_documents(
		&self,
		collection: Collection,
		filter: &Filter,
	) -> Result<u64, StorageError> {
		self.backend
			.count_documents(collection.as_str(), filter)
			.await
	}

	/// Verifies the backend is reachable.
	pub async fn health_check(&self) -> Result<(), StorageError> {
		self.backend.health_check().await
	}
}

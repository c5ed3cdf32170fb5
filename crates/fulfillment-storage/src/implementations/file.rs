//! File-backed storage backend for the fulfillment engine.
//!
//! Persists each collection as a JSON array in its own file under a base
//! directory. An exclusive advisory lock on the directory prevents two
//! processes from sharing it; within the process a mutex serializes
//! read-modify-write cycles so filtered updates stay atomic. Writes go
//! through a temporary file and rename, so readers never observe a
//! half-written collection.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use fs2::FileExt;
use fulfillment_types::{
	ConfigSchema, Field, FieldType, Filter, FindOptions, ImplementationRegistry, Schema, Update,
	ValidationError,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::memory::{paginate, sort_documents};

/// File-backed storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	/// Held for the life of the backend; releasing it would let another
	/// process open the same directory.
	_dir_lock: std::fs::File,
	write_guard: Mutex<()>,
}

impl FileStorage {
	/// Opens (or creates) a storage directory and takes the exclusive
	/// directory lock.
	pub fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
		let base_path = base_path.as_ref().to_path_buf();
		std::fs::create_dir_all(&base_path)
			.map_err(|e| StorageError::Backend(format!("Failed to create storage dir: {}", e)))?;

		let lock_path = base_path.join(".lock");
		let dir_lock = std::fs::File::create(&lock_path)
			.map_err(|e| StorageError::Backend(format!("Failed to create lock file: {}", e)))?;
		dir_lock.try_lock_exclusive().map_err(|e| {
			StorageError::Backend(format!(
				"Storage directory {} is locked by another process: {}",
				base_path.display(),
				e
			))
		})?;

		Ok(Self {
			base_path,
			_dir_lock: dir_lock,
			write_guard: Mutex::new(()),
		})
	}

	fn collection_path(&self, collection: &str) -> PathBuf {
		self.base_path.join(format!("{}.json", collection))
	}

	async fn load(&self, collection: &str) -> Result<Vec<Value>, StorageError> {
		let path = self.collection_path(collection);
		match fs::read(&path).await {
			Ok(bytes) => serde_json::from_slice(&bytes)
				.map_err(|e| StorageError::Serialization(e.to_string())),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn persist(&self, collection: &str, documents: &[Value]) -> Result<(), StorageError> {
		let bytes = serde_json::to_vec(documents)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		let path = self.collection_path(collection);
		let tmp = self.base_path.join(format!("{}.json.tmp", collection));
		fs::write(&tmp, bytes)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&tmp, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn insert(&self, collection: &str, mut document: Value) -> Result<String, StorageError> {
		let _guard = self.write_guard.lock().await;
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
		let mut documents = self.load(collection).await?;
		documents.push(document);
		self.persist(collection, &documents).await?;
		Ok(id)
	}

	async fn find_one(
		&self,
		collection: &str,
		filter: &Filter,
	) -> Result<Option<Value>, StorageError> {
		let documents = self.load(collection).await?;
		Ok(documents.into_iter().find(|d| filter.matches(d)))
	}

	async fn find_many(
		&self,
		collection: &str,
		filter: &Filter,
		options: &FindOptions,
	) -> Result<Vec<Value>, StorageError> {
		let documents = self.load(collection).await?;
		let mut matched: Vec<Value> =
			documents.into_iter().filter(|d| filter.matches(d)).collect();
		sort_documents(&mut matched, options);
		Ok(paginate(matched, options))
	}

	async fn update_one(
		&self,
		collection: &str,
		filter: &Filter,
		update: &Update,
	) -> Result<u64, StorageError> {
		let _guard = self.write_guard.lock().await;
		let mut documents = self.load(collection).await?;
		match documents.iter_mut().find(|d| filter.matches(d)) {
			Some(document) => {
				update.apply(document);
				self.persist(collection, &documents).await?;
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
		let _guard = self.write_guard.lock().await;
		let mut documents = self.load(collection).await?;
		let mut modified = 0;
		for document in documents.iter_mut().filter(|d| filter.matches(d)) {
			update.apply(document);
			modified += 1;
		}
		if modified > 0 {
			self.persist(collection, &documents).await?;
		}
		Ok(modified)
	}

	async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StorageError> {
		let _guard = self.write_guard.lock().await;
		let mut documents = self.load(collection).await?;
		match documents.iter().position(|d| filter.matches(d)) {
			Some(index) => {
				documents.remove(index);
				self.persist(collection, &documents).await?;
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
		let documents = self.load(collection).await?;
		Ok(documents.iter().filter(|d| filter.matches(d)).count() as u64)
	}

	async fn health_check(&self) -> Result<(), StorageError> {
		let probe = self.base_path.join(".probe");
		fs::write(&probe, b"ok")
			.await
			.map_err(|e| StorageError::Backend(format!("Storage dir not writable: {}", e)))?;
		fs::remove_file(&probe)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![Field::new("path", FieldType::String)], vec![]);
		schema.validate(config)
	}
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `path`: base directory for collection files (required)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	let path = config
		.get("path")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StorageError::Configuration("Missing 'path'".into()))?;
	Ok(Box::new(FileStorage::new(path)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use tempfile::TempDir;

	#[tokio::test]
	async fn documents_survive_reopen() {
		let dir = TempDir::new().unwrap();
		let id = {
			let storage = FileStorage::new(dir.path()).unwrap();
			storage
				.insert("orders", json!({"status": "pending"}))
				.await
				.unwrap()
		};

		let storage = FileStorage::new(dir.path()).unwrap();
		let found = storage
			.find_one("orders", &Filter::new().eq("id", id))
			.await
			.unwrap();
		assert_eq!(found.unwrap()["status"], "pending");
	}

	#[tokio::test]
	async fn conditional_update_persists() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path()).unwrap();
		let id = storage
			.insert("orders", json!({"status": "pending"}))
			.await
			.unwrap();

		let modified = storage
			.update_one(
				"orders",
				&Filter::new().eq("id", id.clone()).eq("status", "pending"),
				&Update::new().set("status", "confirmed"),
			)
			.await
			.unwrap();
		assert_eq!(modified, 1);

		let found = storage
			.find_one("orders", &Filter::new().eq("id", id))
			.await
			.unwrap();
		assert_eq!(found.unwrap()["status"], "confirmed");
	}

	#[tokio::test]
	async fn health_check_probes_the_directory() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path()).unwrap();
		storage.health_check().await.unwrap();
	}
}

//! Notification dispatch module for the fulfillment engine.
//!
//! Notifications are persisted, read-trackable records addressed to staff
//! or to one account. This module owns their collection: creation,
//! read-state changes, listing and deletion. Creation is at-least-once;
//! callers treat a dispatch failure as their own isolated concern and
//! never fail the originating operation over it.

use chrono::Utc;
use fulfillment_storage::StorageService;
use fulfillment_types::{
	Collection, Filter, FindOptions, NewNotification, Notification, SortOrder, TargetType,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Default page size for notification listings.
const DEFAULT_LIST_LIMIT: usize = 50;

/// Hard cap on notification listings.
const MAX_LIST_LIMIT: usize = 100;

/// Errors that can occur during notification operations.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// The notification store failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Service owning the notification collection.
pub struct NotificationService {
	storage: Arc<StorageService>,
}

impl NotificationService {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Persists a new notification and returns its assigned id.
	pub async fn create(&self, new: NewNotification) -> Result<String, NotifyError> {
		let now = Utc::now();
		let document = json!({
			"targetType": new.target.target_type(),
			"targetId": new.target.target_id(),
			"type": new.kind,
			"title": new.title,
			"message": new.message,
			"data": new.data,
			"link": new.link,
			"read": false,
			"createdAt": now,
			"updatedAt": now,
		});
		let id = self
			.storage
			.insert(Collection::Notifications, &document)
			.await
			.map_err(|e| NotifyError::Storage(e.to_string()))?;
		tracing::debug!(
			notification_id = %id,
			kind = ?new.kind,
			target = %new.target.target_type(),
			"Created notification"
		);
		Ok(id)
	}

	/// Marks one notification as read.
	pub async fn mark_read(&self, id: &str) -> Result<(), NotifyError> {
		self.storage
			.update_one(
				Collection::Notifications,
				&Filter::new().eq("id", id),
				&fulfillment_types::Update::new()
					.set("read", true)
					.set("updatedAt", json!(Utc::now())),
			)
			.await
			.map_err(|e| NotifyError::Storage(e.to_string()))?;
		Ok(())
	}

	/// Marks every unread notification for a target as read.
	pub async fn mark_all_read(
		&self,
		target_type: TargetType,
		target_id: Option<&str>,
	) -> Result<u64, NotifyError> {
		let mut filter = Filter::new()
			.eq("targetType", target_type.as_str())
			.eq("read", false);
		if let Some(target_id) = target_id {
			filter = filter.eq("targetId", target_id);
		}
		self.storage
			.update_many(
				Collection::Notifications,
				&filter,
				&fulfillment_types::Update::new()
					.set("read", true)
					.set("updatedAt", json!(Utc::now())),
			)
			.await
			.map_err(|e| NotifyError::Storage(e.to_string()))
	}

	/// Lists notifications for a target, newest first.
	pub async fn list(
		&self,
		target_type: TargetType,
		target_id: Option<&str>,
		unread_only: bool,
		limit: Option<usize>,
	) -> Result<Vec<Notification>, NotifyError> {
		let mut filter = Filter::new().eq("targetType", target_type.as_str());
		if let Some(target_id) = target_id {
			filter = filter.eq("targetId", target_id);
		}
		if unread_only {
			filter = filter.eq("read", false);
		}
		let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
		let options = FindOptions::new()
			.sort("createdAt", SortOrder::Descending)
			.limit(limit);
		self.storage
			.find_many(Collection::Notifications, &filter, &options)
			.await
			.map_err(|e| NotifyError::Storage(e.to_string()))
	}

	/// Counts unread notifications for a target.
	pub async fn unread_count(
		&self,
		target_type: TargetType,
		target_id: Option<&str>,
	) -> Result<u64, NotifyError> {
		let mut filter = Filter::new()
			.eq("targetType", target_type.as_str())
			.eq("read", false);
		if let Some(target_id) = target_id {
			filter = filter.eq("targetId", target_id);
		}
		self.storage
			.count_documents(Collection::Notifications, &filter)
			.await
			.map_err(|e| NotifyError::Storage(e.to_string()))
	}

	/// Deletes one notification. Explicit operator action only; nothing
	/// in the engine calls this on its own.
	pub async fn delete(&self, id: &str) -> Result<(), NotifyError> {
		self.storage
			.delete_one(Collection::Notifications, &Filter::new().eq("id", id))
			.await
			.map_err(|e| NotifyError::Storage(e.to_string()))?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_storage::implementations::memory::MemoryStorage;
	use fulfillment_types::{NotificationTarget, NotificationType};

	fn service() -> NotificationService {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		NotificationService::new(storage)
	}

	fn sample(target: NotificationTarget, title: &str) -> NewNotification {
		NewNotification {
			target,
			kind: NotificationType::NewOrder,
			title: title.into(),
			message: "message".into(),
			data: json!({"orderId": "o-1"}),
			link: "/collections/orders/MD1".into(),
		}
	}

	#[tokio::test]
	async fn created_notifications_start_unread() {
		let service = service();
		service
			.create(sample(NotificationTarget::Admin, "one"))
			.await
			.unwrap();

		let unread = service.unread_count(TargetType::Admin, None).await.unwrap();
		assert_eq!(unread, 1);
	}

	#[tokio::test]
	async fn list_is_scoped_to_target() {
		let service = service();
		service
			.create(sample(NotificationTarget::Admin, "staff"))
			.await
			.unwrap();
		service
			.create(sample(NotificationTarget::User("acc-1".into()), "mine"))
			.await
			.unwrap();
		service
			.create(sample(NotificationTarget::User("acc-2".into()), "theirs"))
			.await
			.unwrap();

		let mine = service
			.list(TargetType::User, Some("acc-1"), false, None)
			.await
			.unwrap();
		assert_eq!(mine.len(), 1);
		assert_eq!(mine[0].title, "mine");
	}

	#[tokio::test]
	async fn mark_all_read_clears_unread_count() {
		let service = service();
		for title in ["a", "b", "c"] {
			service
				.create(sample(NotificationTarget::User("acc-1".into()), title))
				.await
				.unwrap();
		}

		let cleared = service
			.mark_all_read(TargetType::User, Some("acc-1"))
			.await
			.unwrap();
		assert_eq!(cleared, 3);
		let unread = service
			.unread_count(TargetType::User, Some("acc-1"))
			.await
			.unwrap();
		assert_eq!(unread, 0);
	}

	#[tokio::test]
	async fn mark_read_flips_one_flag() {
		let service = service();
		let id = service
			.create(sample(NotificationTarget::Admin, "one"))
			.await
			.unwrap();
		service
			.create(sample(NotificationTarget::Admin, "two"))
			.await
			.unwrap();

		service.mark_read(&id).await.unwrap();
		let unread = service.unread_count(TargetType::Admin, None).await.unwrap();
		assert_eq!(unread, 1);
	}

	#[tokio::test]
	async fn delete_removes_the_record() {
		let service = service();
		let id = service
			.create(sample(NotificationTarget::Admin, "gone"))
			.await
			.unwrap();
		service.delete(&id).await.unwrap();
		let listed = service.list(TargetType::Admin, None, false, None).await.unwrap();
		assert!(listed.is_empty());
	}
}

//! Notification records and addressing.
//!
//! Notifications are persisted, read-trackable documents addressed either to
//! the whole staff or to one account. They are created by the dispatcher and
//! never mutated afterwards except for the read flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audience class of a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
	/// Broadcast to staff.
	Admin,
	/// Addressed to one registered account.
	User,
}

impl TargetType {
	pub fn as_str(&self) -> &'static str {
		match self {
			TargetType::Admin => "admin",
			TargetType::User => "user",
		}
	}
}

impl fmt::Display for TargetType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Fully-addressed notification target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
	Admin,
	User(String),
}

impl NotificationTarget {
	pub fn target_type(&self) -> TargetType {
		match self {
			NotificationTarget::Admin => TargetType::Admin,
			NotificationTarget::User(_) => TargetType::User,
		}
	}

	/// The addressed account id, `None` for staff broadcasts.
	pub fn target_id(&self) -> Option<&str> {
		match self {
			NotificationTarget::Admin => None,
			NotificationTarget::User(id) => Some(id),
		}
	}
}

/// Business event a notification reports.
///
/// Wire names are shared with the unmigrated admin/client frontends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
	NewOrder,
	OrderCreated,
	OrderConfirmed,
	OrderShipping,
	OrderDelivered,
	OrderCancelled,
	OrderReturnRequested,
	OrderReturnApproved,
	OrderReturnRejected,
}

/// A notification yet to be persisted.
#[derive(Debug, Clone)]
pub struct NewNotification {
	pub target: NotificationTarget,
	pub kind: NotificationType,
	pub title: String,
	pub message: String,
	/// Opaque payload describing the originating event.
	pub data: serde_json::Value,
	pub link: String,
}

/// A persisted notification document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
	pub id: String,
	pub target_type: TargetType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_id: Option<String>,
	#[serde(rename = "type")]
	pub kind: NotificationType,
	pub title: String,
	pub message: String,
	#[serde(default)]
	pub data: serde_json::Value,
	pub link: String,
	pub read: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn notification_type_uses_wire_names() {
		assert_eq!(
			serde_json::to_string(&NotificationType::OrderReturnRequested).unwrap(),
			"\"order_return_requested\""
		);
		assert_eq!(
			serde_json::to_string(&NotificationType::NewOrder).unwrap(),
			"\"new_order\""
		);
	}

	#[test]
	fn target_addressing() {
		let t = NotificationTarget::User("acc-9".into());
		assert_eq!(t.target_type(), TargetType::User);
		assert_eq!(t.target_id(), Some("acc-9"));
		assert_eq!(NotificationTarget::Admin.target_id(), None);
	}
}

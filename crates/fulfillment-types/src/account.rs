//! Account-lookup collaborator types.
//!
//! Accounts are owned by the excluded user-management subsystem; the
//! fulfillment engine only reads them for guest reconciliation and for
//! resolving an owner's on-file email address.

use serde::{Deserialize, Serialize};

/// A registered account as stored by the user-management subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
	pub id: String,
	pub phone: String,
	/// On-file email addresses, first entry preferred.
	#[serde(default)]
	pub emails: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

impl AccountRecord {
	/// The preferred on-file email, when any is recorded.
	pub fn preferred_email(&self) -> Option<&str> {
		self.emails.first().map(String::as_str)
	}
}

//! Order domain types for the fulfillment engine.
//!
//! This module defines the persisted order document, its status lifecycle,
//! the checkout payload accepted by the order factory, and the typed order
//! reference used by every entry point that accepts a caller-supplied
//! order identifier.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Literal prefix of every ticket number.
///
/// Persisted orders in the unmigrated store carry this prefix, so it must
/// not change while the cart/catalog system still reads the same
/// collections.
pub const TICKET_PREFIX: &str = "MD";

/// Owner sentinel for orders placed without a registered account.
pub const GUEST_OWNER: &str = "guest";

/// Builds a ticket number from a creation timestamp.
///
/// Ticket numbers are the prefix followed by the creation time in epoch
/// milliseconds. Uniqueness is by convention only; two creations in the
/// same millisecond would collide and no store-level constraint prevents it.
pub fn ticket_number(created_at: DateTime<Utc>) -> String {
	format!("{}{}", TICKET_PREFIX, created_at.timestamp_millis())
}

/// Owner of an order: a registered account or an anonymous guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerRef {
	/// Registered account identifier.
	Account(String),
	/// Anonymous checkout; serialized as the literal sentinel string.
	Guest,
}

impl OwnerRef {
	pub fn is_guest(&self) -> bool {
		matches!(self, OwnerRef::Guest)
	}

	/// Returns the account id, or `None` for guests.
	pub fn account_id(&self) -> Option<&str> {
		match self {
			OwnerRef::Account(id) => Some(id),
			OwnerRef::Guest => None,
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			OwnerRef::Account(id) => id,
			OwnerRef::Guest => GUEST_OWNER,
		}
	}
}

impl fmt::Display for OwnerRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl From<&str> for OwnerRef {
	fn from(value: &str) -> Self {
		if value == GUEST_OWNER {
			OwnerRef::Guest
		} else {
			OwnerRef::Account(value.to_string())
		}
	}
}

impl Serialize for OwnerRef {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for OwnerRef {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		Ok(OwnerRef::from(raw.as_str()))
	}
}

/// A caller-supplied order reference, classified once at the boundary.
///
/// The dual addressing scheme (human ticket number vs store-assigned key)
/// is resolved by a fixed priority rule that lives here, not re-derived at
/// each call site: a reference in ticket format is NEVER attempted as a
/// store key, and vice versa a raw key is never minted into a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
	/// Matches the ticket format (prefix + digits); looked up by ticket
	/// number only.
	Ticket(String),
	/// Syntactically a store key; tried as a ticket number first (legacy
	/// references), then as an internal key.
	RawKey(String),
	/// Matches neither scheme; tried as a ticket number only.
	Ambiguous(String),
}

impl OrderRef {
	/// Classifies a raw reference string.
	pub fn parse(raw: &str) -> Self {
		let rest = raw.strip_prefix(TICKET_PREFIX);
		if let Some(digits) = rest {
			if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
				return OrderRef::Ticket(raw.to_string());
			}
		}
		if Uuid::parse_str(raw).is_ok() {
			return OrderRef::RawKey(raw.to_string());
		}
		OrderRef::Ambiguous(raw.to_string())
	}

	/// The raw reference as supplied by the caller.
	pub fn as_str(&self) -> &str {
		match self {
			OrderRef::Ticket(s) | OrderRef::RawKey(s) | OrderRef::Ambiguous(s) => s,
		}
	}
}

impl fmt::Display for OrderRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Status of an order in its fulfillment lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order has been created and awaits staff confirmation.
	Pending,
	/// Order has been confirmed by staff.
	Confirmed,
	/// Order is being picked and packed.
	Processing,
	/// Order has left the warehouse.
	Shipping,
	/// Order has reached the customer.
	Delivered,
	/// Order was cancelled; terminal.
	Cancelled,
	/// Customer asked to return a delivered order.
	ReturnRequested,
	/// Return was approved; terminal.
	Returned,
}

impl OrderStatus {
	/// Whether the status accepts no further transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
	}

	/// Whether staff may set this status through the generic transition
	/// entry point. The return sub-states have dedicated entry points.
	pub fn is_staff_settable(&self) -> bool {
		!matches!(self, OrderStatus::ReturnRequested | OrderStatus::Returned)
	}

	/// Wire name of the status (matches the persisted snake_case form).
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Confirmed => "confirmed",
			OrderStatus::Processing => "processing",
			OrderStatus::Shipping => "shipping",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
			OrderStatus::ReturnRequested => "return_requested",
			OrderStatus::Returned => "returned",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(OrderStatus::Pending),
			"confirmed" => Ok(OrderStatus::Confirmed),
			"processing" => Ok(OrderStatus::Processing),
			"shipping" => Ok(OrderStatus::Shipping),
			"delivered" => Ok(OrderStatus::Delivered),
			"cancelled" => Ok(OrderStatus::Cancelled),
			"return_requested" => Ok(OrderStatus::ReturnRequested),
			"returned" => Ok(OrderStatus::Returned),
			other => Err(format!("unknown order status: {}", other)),
		}
	}
}

/// Settlement state of an order's payment.
///
/// Only the status field is tracked; no actual transfer happens here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
	Unpaid,
	Pending,
	Paid,
	Failed,
}

impl PaymentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			PaymentStatus::Unpaid => "unpaid",
			PaymentStatus::Pending => "pending",
			PaymentStatus::Paid => "paid",
			PaymentStatus::Failed => "failed",
		}
	}
}

impl fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PaymentStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"unpaid" => Ok(PaymentStatus::Unpaid),
			"pending" => Ok(PaymentStatus::Pending),
			"paid" => Ok(PaymentStatus::Paid),
			"failed" => Ok(PaymentStatus::Failed),
			other => Err(format!("unknown payment status: {}", other)),
		}
	}
}

/// Payment method requiring cash settlement on delivery.
///
/// Orders paid this way start as `unpaid` rather than `pending`.
pub const PAYMENT_METHOD_COD: &str = "cod";

/// A line snapshot captured at order time.
///
/// Never re-derived from the live catalog; the name, price and image are
/// frozen as they were when the customer checked out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
	/// Reference to the catalog product, kept as an opaque string.
	pub product_ref: String,
	pub name: String,
	pub unit_price: Decimal,
	pub quantity: u32,
	#[serde(default)]
	pub unit: Option<String>,
	#[serde(default)]
	pub image: Option<String>,
}

/// Pricing snapshot computed once at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
	pub subtotal: Decimal,
	pub discount: Decimal,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub voucher_code: Option<String>,
	pub voucher_discount: Decimal,
	pub shipping_fee: Decimal,
	pub total: Decimal,
}

/// Denormalized shipping destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
	pub name: String,
	pub phone: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	pub street: String,
	pub ward: String,
	pub district: String,
	pub province: String,
}

/// Denormalized customer contact details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
	pub name: String,
	pub phone: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
}

/// Invoice details captured when the customer requires one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInfo {
	pub company_name: String,
	pub tax_code: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
}

/// One entry of the append-only status audit trail.
///
/// The shape of this entry is a wire-compatible invariant: the unmigrated
/// cart/catalog system reads the same collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
	pub status: OrderStatus,
	pub note: String,
	pub timestamp: DateTime<Utc>,
}

/// A persisted order document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Store-assigned unique key, immutable.
	pub id: String,
	/// Human-readable identifier, generated at creation, immutable.
	pub ticket_number: String,
	/// Human-editable label, defaulted from the creation date.
	pub order_name: String,
	/// Registered account id, or the guest sentinel.
	pub owner_ref: OwnerRef,
	pub items: Vec<LineItem>,
	pub customer_info: CustomerInfo,
	pub shipping_address: ShippingAddress,
	pub payment_method: String,
	pub payment_status: PaymentStatus,
	#[serde(default)]
	pub require_invoice: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub invoice_info: Option<InvoiceInfo>,
	#[serde(default)]
	pub note: String,
	pub pricing: Pricing,
	pub status: OrderStatus,
	pub status_history: Vec<StatusHistoryEntry>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub confirmed_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cancelled_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub return_requested_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub returned_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub return_rejected_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub return_reason: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub return_rejection_reason: Option<String>,
}

impl Order {
	/// Customer-facing display name, preferring the contact name captured
	/// at checkout.
	pub fn customer_name(&self) -> &str {
		if !self.customer_info.name.is_empty() {
			&self.customer_info.name
		} else {
			&self.shipping_address.name
		}
	}
}

/// Contact details supplied by an anonymous checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	pub phone: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
}

/// Cart checkout payload accepted by the order factory.
///
/// Pricing fields are trusted verbatim; the factory snapshots them without
/// validating against current catalog prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
	/// Authenticated account id, when the caller is logged in.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub account_id: Option<String>,
	/// Contact details for anonymous checkouts.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub guest_info: Option<GuestInfo>,
	pub items: Vec<LineItem>,
	pub address: ShippingAddress,
	pub payment_method: String,
	#[serde(default)]
	pub require_invoice: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub invoice_info: Option<InvoiceInfo>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub order_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub note: Option<String>,
	pub pricing: Pricing,
}

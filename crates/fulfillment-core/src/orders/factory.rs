//! Order creation from cart checkout payloads.
//!
//! Creation snapshots everything the payload carries (items, address,
//! pricing) without consulting the live catalog, attributes the order to
//! an account where one can be found, and persists it in `pending`. The
//! notification fan-out and the cart cleanup that follow are best-effort;
//! neither can fail the create call.

use crate::orders::{OrderError, OrderService};
use fulfillment_types::{
	ticket_number, CheckoutPayload, Collection, CustomerInfo, EngineEvent, Filter, Order,
	OrderEvent, OrderStatus, OwnerRef, PaymentStatus, StatusHistoryEntry, Update,
	PAYMENT_METHOD_COD,
};
use serde_json::{json, Value};
use std::collections::HashSet;

impl OrderService {
	/// Creates an order from a checkout payload.
	pub async fn create_order(&self, payload: CheckoutPayload) -> Result<Order, OrderError> {
		validate_checkout(&payload)?;

		let now = self.clock.now();
		let ticket = ticket_number(now);
		let owner_ref = self.resolve_owner(&payload).await?;

		let order_name = payload
			.order_name
			.clone()
			.filter(|name| !name.trim().is_empty())
			.unwrap_or_else(|| format!("Order {}", now.format("%d/%m/%Y")));

		// COD settles in cash at the door; everything else awaits the
		// payment provider.
		let payment_status = if payload.payment_method == PAYMENT_METHOD_COD {
			PaymentStatus::Unpaid
		} else {
			PaymentStatus::Pending
		};

		let customer_info = CustomerInfo {
			name: payload.address.name.clone(),
			phone: payload.address.phone.clone(),
			email: payload.invoice_info.as_ref().and_then(|i| i.email.clone()),
		};

		let fallback_email = payload
			.address
			.email
			.clone()
			.or_else(|| payload.guest_info.as_ref().and_then(|g| g.email.clone()));

		let mut order = Order {
			// Assigned by the store on insert
			id: String::new(),
			ticket_number: ticket.clone(),
			order_name,
			owner_ref,
			items: payload.items.clone(),
			customer_info,
			shipping_address: payload.address.clone(),
			payment_method: payload.payment_method.clone(),
			payment_status,
			require_invoice: payload.require_invoice,
			invoice_info: payload.invoice_info.clone(),
			note: payload.note.clone().unwrap_or_default(),
			pricing: payload.pricing.clone(),
			status: OrderStatus::Pending,
			status_history: vec![StatusHistoryEntry {
				status: OrderStatus::Pending,
				note: "order created".into(),
				timestamp: now,
			}],
			created_at: now,
			updated_at: now,
			confirmed_at: None,
			delivered_at: None,
			cancelled_at: None,
			return_requested_at: None,
			returned_at: None,
			return_rejected_at: None,
			return_reason: None,
			return_rejection_reason: None,
		};

		order.id = self
			.storage
			.insert(Collection::Orders, &order)
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))?;

		tracing::info!(
			order_id = %order.id,
			ticket = %order.ticket_number,
			owner = %order.owner_ref,
			total = %order.pricing.total,
			"Created order"
		);

		self.event_bus
			.publish(EngineEvent::Order(OrderEvent::Created {
				order: order.clone(),
				fallback_email,
			}))
			.ok();

		// Best-effort cross-store cleanup; carts and orders share no
		// transaction, so a failure here leaves a stale cart, not a
		// broken order.
		if let Some(account_id) = order.owner_ref.account_id() {
			if let Err(e) = self.remove_ordered_items(account_id, &order).await {
				tracing::warn!(
					order_id = %order.id,
					error = %e,
					"Failed to remove ordered items from cart"
				);
			}
		}

		Ok(order)
	}

	/// Determines who owns the new order.
	///
	/// An authenticated account id is used directly. Guest checkouts with
	/// a phone number are reconciled against registered accounts; a match
	/// attributes the order to that account instead of the guest
	/// sentinel.
	async fn resolve_owner(&self, payload: &CheckoutPayload) -> Result<OwnerRef, OrderError> {
		if let Some(account_id) = payload
			.account_id
			.as_deref()
			.filter(|id| !id.is_empty() && *id != fulfillment_types::GUEST_OWNER)
		{
			return Ok(OwnerRef::Account(account_id.to_string()));
		}

		if let Some(guest) = &payload.guest_info {
			if !guest.phone.trim().is_empty() {
				match self.accounts.find_by_phone(&guest.phone).await {
					Ok(Some(account)) => {
						tracing::info!(
							account_id = %account.id,
							"Guest checkout linked to existing account"
						);
						return Ok(OwnerRef::Account(account.id));
					},
					Ok(None) => {},
					Err(e) => {
						// Reconciliation is an enrichment step; a lookup
						// failure degrades to a guest order.
						tracing::warn!(error = %e, "Account reconciliation failed");
					},
				}
			}
		}

		Ok(OwnerRef::Guest)
	}

	/// Removes the ordered line items from the owner's persistent cart.
	///
	/// Product references are compared as strings to tolerate mixed id
	/// representations left behind by the unmigrated cart writer.
	async fn remove_ordered_items(
		&self,
		account_id: &str,
		order: &Order,
	) -> Result<(), OrderError> {
		let filter = Filter::new().eq("owner", account_id);
		let cart: Option<Value> = self
			.storage
			.find_one(Collection::Carts, &filter)
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))?;

		let Some(cart) = cart else {
			return Ok(());
		};
		let Some(cart_items) = cart.get("items").and_then(Value::as_array) else {
			return Ok(());
		};
		if cart_items.is_empty() {
			return Ok(());
		}

		let ordered: HashSet<String> = order
			.items
			.iter()
			.map(|item| item.product_ref.clone())
			.collect();

		let remaining: Vec<Value> = cart_items
			.iter()
			.filter(|item| {
				let product_ref = item
					.get("productRef")
					.map(value_as_ref_string)
					.unwrap_or_default();
				!ordered.contains(&product_ref)
			})
			.cloned()
			.collect();

		if remaining.len() == cart_items.len() {
			return Ok(());
		}

		tracing::debug!(
			order_id = %order.id,
			before = cart_items.len(),
			after = remaining.len(),
			"Removing ordered items from cart"
		);

		self.storage
			.update_one(
				Collection::Carts,
				&filter,
				&Update::new()
					.set("items", Value::Array(remaining))
					.set("updatedAt", json!(self.clock.now())),
			)
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))?;
		Ok(())
	}
}

/// String form of a product reference regardless of how the writer
/// encoded it.
fn value_as_ref_string(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// Rejects structurally unusable checkouts before any write.
fn validate_checkout(payload: &CheckoutPayload) -> Result<(), OrderError> {
	if payload.items.is_empty() {
		return Err(OrderError::Validation(
			"checkout requires at least one line item".into(),
		));
	}
	if payload.items.iter().any(|item| item.quantity == 0) {
		return Err(OrderError::Validation(
			"line item quantity must be at least 1".into(),
		));
	}
	if payload.address.name.trim().is_empty() {
		return Err(OrderError::Validation(
			"shipping address requires a recipient name".into(),
		));
	}
	if payload.address.phone.trim().is_empty() {
		return Err(OrderError::Validation(
			"shipping address requires a phone number".into(),
		));
	}
	Ok(())
}

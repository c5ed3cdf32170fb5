//! Order state machine implementation.
//!
//! The single place that writes order status. Every transition is one
//! conditional update keyed on (order id, observed status): if the status
//! changed underneath us the update matches nothing and the caller gets a
//! `Conflict` carrying the order's current status. The store's filtered
//! update is the only concurrency primitive; there are no in-process
//! locks around order state.

use crate::orders::OrderError;
use fulfillment_storage::StorageService;
use fulfillment_types::{
	Collection, Filter, Order, OrderStatus, SharedClock, Update,
};
use serde_json::json;
use std::sync::Arc;

/// Manages order state transitions and persistence.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
	clock: SharedClock,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>, clock: SharedClock) -> Self {
		Self { storage, clock }
	}

	/// Transitions an order to a new status, appending one history entry.
	pub async fn transition(
		&self,
		order: &Order,
		new_status: OrderStatus,
		note: impl Into<String>,
	) -> Result<Order, OrderError> {
		self.transition_with(order, new_status, note, Update::new()).await
	}

	/// Transitions an order to a new status with additional field writes
	/// folded into the same conditional update.
	///
	/// Stamps the lifecycle timestamp of the new status only on first
	/// arrival, and always appends exactly one `statusHistory` entry.
	pub async fn transition_with(
		&self,
		order: &Order,
		new_status: OrderStatus,
		note: impl Into<String>,
		extra: Update,
	) -> Result<Order, OrderError> {
		let now = self.clock.now();
		let note = note.into();

		let mut update = extra
			.set("status", json!(new_status))
			.set("updatedAt", json!(now))
			.push(
				"statusHistory",
				json!({
					"status": new_status,
					"note": note,
					"timestamp": now,
				}),
			);

		// First-arrival lifecycle stamps
		match new_status {
			OrderStatus::Confirmed if order.confirmed_at.is_none() => {
				update = update.set("confirmedAt", json!(now));
			},
			OrderStatus::Delivered if order.delivered_at.is_none() => {
				update = update.set("deliveredAt", json!(now));
			},
			OrderStatus::Cancelled if order.cancelled_at.is_none() => {
				update = update.set("cancelledAt", json!(now));
			},
			OrderStatus::ReturnRequested if order.return_requested_at.is_none() => {
				update = update.set("returnRequestedAt", json!(now));
			},
			OrderStatus::Returned if order.returned_at.is_none() => {
				update = update.set("returnedAt", json!(now));
			},
			_ => {},
		}

		let precondition = Filter::new()
			.eq("id", order.id.clone())
			.eq("status", order.status.as_str());
		let modified = self
			.storage
			.update_one(Collection::Orders, &precondition, &update)
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))?;

		if modified == 0 {
			// Precondition no longer holds; report what the order looks
			// like now.
			return match self.reload(&order.id).await? {
				Some(current) => Err(OrderError::Conflict {
					order_id: order.id.clone(),
					current: current.status,
				}),
				None => Err(OrderError::NotFound(order.id.clone())),
			};
		}

		self.reload(&order.id)
			.await?
			.ok_or_else(|| OrderError::NotFound(order.id.clone()))
	}

	/// Applies a plain field update to an order by id, unconditioned on
	/// status. Used for mutations outside the status lifecycle (payment
	/// status, order name).
	pub async fn update_fields(&self, order_id: &str, extra: Update) -> Result<Order, OrderError> {
		let update = extra.set("updatedAt", json!(self.clock.now()));
		let modified = self
			.storage
			.update_one(
				Collection::Orders,
				&Filter::new().eq("id", order_id),
				&update,
			)
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))?;
		if modified == 0 {
			return Err(OrderError::NotFound(order_id.to_string()));
		}
		self.reload(order_id)
			.await?
			.ok_or_else(|| OrderError::NotFound(order_id.to_string()))
	}

	async fn reload(&self, order_id: &str) -> Result<Option<Order>, OrderError> {
		self.storage
			.find_one(Collection::Orders, &Filter::new().eq("id", order_id))
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))
	}
}

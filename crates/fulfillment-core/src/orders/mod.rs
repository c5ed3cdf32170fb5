//! Order operations exposed to collaborating subsystems.
//!
//! This module is the operation surface of the engine: order creation,
//! lookups, the status state machine and its return/cancel sub-workflow,
//! payment-status and name updates. Callers see only the outcome of the
//! order mutation; the notification fan-out rides the event bus and its
//! failures never surface here.

pub mod factory;
pub mod resolver;

use crate::engine::event_bus::EventBus;
use crate::state::OrderStateMachine;
use fulfillment_account::AccountService;
use fulfillment_storage::StorageService;
use fulfillment_types::{
	truncate_id, Collection, EngineEvent, Filter, FindOptions, Order, OrderEvent, OrderRef,
	OrderStatus, PaymentStatus, SharedClock, SortOrder, Update,
};
use resolver::IdentityResolver;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by order operations.
///
/// `Validation`, `NotFound` and `Conflict` are terminal for the call and
/// go straight back to the immediate caller; `Conflict` always names the
/// order's current status so staff tooling can explain the refusal.
#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Invalid status: {0}")]
	InvalidStatus(String),
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Conflict: order {order_id} is currently {current}")]
	Conflict {
		order_id: String,
		current: OrderStatus,
	},
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Default note recorded when a customer cancels without giving a reason.
const DEFAULT_CANCEL_REASON: &str = "Cancelled by customer";

/// Default note recorded when a customer requests a return without a
/// reason.
const DEFAULT_RETURN_REASON: &str = "Return requested by customer";

/// Service exposing the order operation set.
pub struct OrderService {
	storage: Arc<StorageService>,
	accounts: Arc<AccountService>,
	resolver: IdentityResolver,
	state_machine: OrderStateMachine,
	event_bus: EventBus,
	clock: SharedClock,
}

impl OrderService {
	pub fn new(
		storage: Arc<StorageService>,
		accounts: Arc<AccountService>,
		event_bus: EventBus,
		clock: SharedClock,
	) -> Self {
		let resolver = IdentityResolver::new(storage.clone());
		let state_machine = OrderStateMachine::new(storage.clone(), clock.clone());
		Self {
			storage,
			accounts,
			resolver,
			state_machine,
			event_bus,
			clock,
		}
	}

	/// Resolves an order reference.
	pub async fn get_order(&self, reference: &OrderRef) -> Result<Order, OrderError> {
		self.resolver.resolve(reference).await
	}

	/// Lists an owner's orders newest-first, optionally filtered by
	/// status. Returns the page and the total match count.
	pub async fn list_orders_by_owner(
		&self,
		owner: &str,
		status: Option<OrderStatus>,
		limit: usize,
		skip: usize,
	) -> Result<(Vec<Order>, u64), OrderError> {
		let mut filter = Filter::new().eq("ownerRef", owner);
		if let Some(status) = status {
			filter = filter.eq("status", status.as_str());
		}
		let options = FindOptions::new()
			.sort("createdAt", SortOrder::Descending)
			.limit(limit)
			.skip(skip);
		let orders = self
			.storage
			.find_many(Collection::Orders, &filter, &options)
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))?;
		let total = self
			.storage
			.count_documents(Collection::Orders, &filter)
			.await
			.map_err(|e| OrderError::Storage(e.to_string()))?;
		Ok((orders, total))
	}

	/// Moves an order to one of the staff-settable statuses.
	///
	/// The return sub-states are rejected here; they have dedicated entry
	/// points below. Regressions among the six statuses are intentionally
	/// not guarded.
	pub async fn transition(
		&self,
		reference: &OrderRef,
		status: OrderStatus,
		note: Option<String>,
	) -> Result<Order, OrderError> {
		if !status.is_staff_settable() {
			return Err(OrderError::InvalidStatus(status.as_str().to_string()));
		}

		let order = self.resolver.resolve(reference).await?;
		self.ensure_not_terminal(&order)?;

		let note = note.unwrap_or_default();
		let updated = self
			.state_machine
			.transition(&order, status, note.clone())
			.await?;

		tracing::info!(
			order_id = %truncate_id(&updated.id),
			from = %order.status,
			to = %status,
			"Order status changed"
		);

		self.event_bus
			.publish(EngineEvent::Order(OrderEvent::StatusChanged {
				order: updated.clone(),
				status,
				note: if note.is_empty() { None } else { Some(note) },
			}))
			.ok();

		Ok(updated)
	}

	/// Cancels an order that has not been delivered yet.
	pub async fn cancel(
		&self,
		reference: &OrderRef,
		reason: Option<String>,
	) -> Result<Order, OrderError> {
		let order = self.resolver.resolve(reference).await?;
		if order.status == OrderStatus::Delivered {
			return Err(OrderError::Conflict {
				order_id: order.id,
				current: order.status,
			});
		}
		self.ensure_not_terminal(&order)?;

		let reason = reason
			.filter(|r| !r.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
		let updated = self
			.state_machine
			.transition(&order, OrderStatus::Cancelled, reason.clone())
			.await?;

		tracing::info!(
			order_id = %truncate_id(&updated.id),
			reason = %reason,
			"Order cancelled"
		);

		self.event_bus
			.publish(EngineEvent::Order(OrderEvent::StatusChanged {
				order: updated.clone(),
				status: OrderStatus::Cancelled,
				note: Some(reason),
			}))
			.ok();

		Ok(updated)
	}

	/// Opens a return request on a delivered order.
	pub async fn request_return(
		&self,
		reference: &OrderRef,
		reason: Option<String>,
	) -> Result<Order, OrderError> {
		let order = self.resolver.resolve(reference).await?;
		if order.status != OrderStatus::Delivered {
			return Err(OrderError::Conflict {
				order_id: order.id,
				current: order.status,
			});
		}

		let reason = reason
			.filter(|r| !r.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_RETURN_REASON.to_string());
		let updated = self
			.state_machine
			.transition_with(
				&order,
				OrderStatus::ReturnRequested,
				reason.clone(),
				Update::new().set("returnReason", reason.clone()),
			)
			.await?;

		self.event_bus
			.publish(EngineEvent::Order(OrderEvent::ReturnRequested {
				order: updated.clone(),
				reason,
			}))
			.ok();

		Ok(updated)
	}

	/// Approves a pending return request.
	pub async fn approve_return(&self, reference: &OrderRef) -> Result<Order, OrderError> {
		let order = self.resolver.resolve(reference).await?;
		if order.status != OrderStatus::ReturnRequested {
			return Err(OrderError::Conflict {
				order_id: order.id,
				current: order.status,
			});
		}

		let updated = self
			.state_machine
			.transition(&order, OrderStatus::Returned, "Return request approved")
			.await?;

		self.event_bus
			.publish(EngineEvent::Order(OrderEvent::ReturnApproved {
				order: updated.clone(),
			}))
			.ok();

		Ok(updated)
	}

	/// Rejects a pending return request, reverting the order to
	/// delivered.
	pub async fn reject_return(
		&self,
		reference: &OrderRef,
		reason: Option<String>,
	) -> Result<Order, OrderError> {
		let order = self.resolver.resolve(reference).await?;
		if order.status != OrderStatus::ReturnRequested {
			return Err(OrderError::Conflict {
				order_id: order.id,
				current: order.status,
			});
		}

		let reason = reason
			.filter(|r| !r.trim().is_empty())
			.unwrap_or_else(|| "Return request rejected".to_string());
		let updated = self
			.state_machine
			.transition_with(
				&order,
				OrderStatus::Delivered,
				format!("Return request rejected: {}", reason),
				Update::new()
					.set("returnRejectedAt", json!(self.clock.now()))
					.set("returnRejectionReason", reason.clone()),
			)
			.await?;

		self.event_bus
			.publish(EngineEvent::Order(OrderEvent::ReturnRejected {
				order: updated.clone(),
				reason,
			}))
			.ok();

		Ok(updated)
	}

	/// Updates the tracked payment status. No notifications hang off
	/// this.
	pub async fn update_payment_status(
		&self,
		reference: &OrderRef,
		status: PaymentStatus,
	) -> Result<Order, OrderError> {
		let order = self.resolver.resolve(reference).await?;
		self.state_machine
			.update_fields(
				&order.id,
				Update::new().set("paymentStatus", json!(status)),
			)
			.await
	}

	/// Renames an order's human-editable label.
	pub async fn rename_order(
		&self,
		reference: &OrderRef,
		name: &str,
	) -> Result<Order, OrderError> {
		let trimmed = name.trim();
		if trimmed.is_empty() {
			return Err(OrderError::Validation("order name must not be empty".into()));
		}
		let order = self.resolver.resolve(reference).await?;
		self.state_machine
			.update_fields(&order.id, Update::new().set("orderName", trimmed))
			.await
	}

	fn ensure_not_terminal(&self, order: &Order) -> Result<(), OrderError> {
		if order.status.is_terminal() {
			return Err(OrderError::Conflict {
				order_id: order.id.clone(),
				current: order.status,
			});
		}
		Ok(())
	}
}

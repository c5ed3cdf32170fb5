//! Event types for intra-engine communication.
//!
//! Events are published on the engine's event bus after an order mutation
//! has committed and are consumed by the notification handler. Side effects
//! hang off these events instead of being inlined into the order
//! operations, so a dispatch failure can never fail the originating call.

use crate::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all engine events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
	/// Events produced by order operations.
	Order(OrderEvent),
}

/// Events emitted after a successful order mutation.
///
/// Each variant carries the order as read at mutation time; the fields the
/// handler consumes (ticket number, owner, pricing, names) are immutable
/// once the order exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order was persisted.
	Created {
		order: Order,
		/// Email supplied in the checkout payload, used when the owner has
		/// no on-file address.
		fallback_email: Option<String>,
	},
	/// An order moved to a new status via the generic transition entry
	/// point or the cancel sub-workflow.
	StatusChanged {
		order: Order,
		status: OrderStatus,
		note: Option<String>,
	},
	/// A customer asked to return a delivered order.
	ReturnRequested { order: Order, reason: String },
	/// Staff approved a pending return request.
	ReturnApproved { order: Order },
	/// Staff rejected a pending return request.
	ReturnRejected { order: Order, reason: String },
}

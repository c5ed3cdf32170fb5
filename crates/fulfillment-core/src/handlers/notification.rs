//! Notification fan-out for order events.
//!
//! Consumes the events the order operations publish after their mutation
//! commits and turns them into staff/customer notifications plus the
//! order-confirmation email. Every failure in here is logged and
//! swallowed: side effects are isolated from the operations that caused
//! them, by structure rather than by convention at each call site.

use fulfillment_account::AccountService;
use fulfillment_mailer::{templates, MailerService};
use fulfillment_notify::NotificationService;
use fulfillment_types::{
	truncate_id, EngineEvent, NewNotification, NotificationTarget, NotificationType, Order,
	OrderEvent, OrderStatus,
};
use serde_json::json;
use std::sync::Arc;

/// Handler turning order events into notifications and email.
pub struct NotificationHandler {
	notifications: Arc<NotificationService>,
	accounts: Arc<AccountService>,
	mailer: Arc<MailerService>,
}

impl NotificationHandler {
	pub fn new(
		notifications: Arc<NotificationService>,
		accounts: Arc<AccountService>,
		mailer: Arc<MailerService>,
	) -> Self {
		Self {
			notifications,
			accounts,
			mailer,
		}
	}

	/// Processes one engine event. Never fails; dispatch errors are
	/// logged here and go no further.
	pub async fn handle(&self, event: EngineEvent) {
		match event {
			EngineEvent::Order(OrderEvent::Created {
				order,
				fallback_email,
			}) => {
				self.on_created(&order, fallback_email).await;
			},
			EngineEvent::Order(OrderEvent::StatusChanged { order, status, note }) => {
				self.on_status_changed(&order, status, note.as_deref()).await;
			},
			EngineEvent::Order(OrderEvent::ReturnRequested { order, reason }) => {
				self.on_return_requested(&order, &reason).await;
			},
			EngineEvent::Order(OrderEvent::ReturnApproved { order }) => {
				self.on_return_approved(&order).await;
			},
			EngineEvent::Order(OrderEvent::ReturnRejected { order, reason }) => {
				self.on_return_rejected(&order, &reason).await;
			},
		}
	}

	async fn on_created(&self, order: &Order, fallback_email: Option<String>) {
		self.dispatch(NewNotification {
			target: NotificationTarget::Admin,
			kind: NotificationType::NewOrder,
			title: "New order".into(),
			message: format!(
				"Order {} from {} - {}",
				order.ticket_number,
				order.customer_name(),
				order.pricing.total
			),
			data: json!({
				"orderId": order.id,
				"ticketNumber": order.ticket_number,
				"customerName": order.customer_name(),
				"total": order.pricing.total,
			}),
			link: admin_link(order),
		})
		.await;

		if let Some(account_id) = order.owner_ref.account_id() {
			self.dispatch(NewNotification {
				target: NotificationTarget::User(account_id.to_string()),
				kind: NotificationType::OrderCreated,
				title: "Order placed".into(),
				message: format!(
					"Your order {} has been placed successfully. Total: {}",
					order.ticket_number, order.pricing.total
				),
				data: json!({
					"orderId": order.id,
					"ticketNumber": order.ticket_number,
					"total": order.pricing.total,
				}),
				link: user_link(order),
			})
			.await;
		}

		self.send_confirmation_email(order, fallback_email).await;
	}

	async fn on_status_changed(&self, order: &Order, status: OrderStatus, note: Option<&str>) {
		match status {
			OrderStatus::Delivered => {
				if let Some(account_id) = order.owner_ref.account_id() {
					self.dispatch(NewNotification {
						target: NotificationTarget::User(account_id.to_string()),
						kind: NotificationType::OrderDelivered,
						title: "Order delivered".into(),
						message: format!(
							"Your order {} has been delivered!",
							order.ticket_number
						),
						data: json!({
							"orderId": order.id,
							"ticketNumber": order.ticket_number,
							"total": order.pricing.total,
						}),
						link: user_link(order),
					})
					.await;
				}
				self.dispatch(NewNotification {
					target: NotificationTarget::Admin,
					kind: NotificationType::OrderDelivered,
					title: "Order completed".into(),
					message: format!(
						"Order {} from {} was delivered successfully",
						order.ticket_number,
						order.customer_name()
					),
					data: json!({
						"orderId": order.id,
						"ticketNumber": order.ticket_number,
						"customerName": order.customer_name(),
						"total": order.pricing.total,
					}),
					link: admin_link(order),
				})
				.await;
			},
			OrderStatus::Cancelled => {
				let reason = note.unwrap_or_default();
				if let Some(account_id) = order.owner_ref.account_id() {
					self.dispatch(NewNotification {
						target: NotificationTarget::User(account_id.to_string()),
						kind: NotificationType::OrderCancelled,
						title: "Order cancelled".into(),
						message: if reason.is_empty() {
							format!("Your order {} has been cancelled", order.ticket_number)
						} else {
							format!(
								"Your order {} has been cancelled: {}",
								order.ticket_number, reason
							)
						},
						data: json!({
							"orderId": order.id,
							"ticketNumber": order.ticket_number,
							"reason": reason,
						}),
						link: user_link(order),
					})
					.await;
				}
				self.dispatch(NewNotification {
					target: NotificationTarget::Admin,
					kind: NotificationType::OrderCancelled,
					title: "Order cancelled".into(),
					message: format!(
						"Order {} from {} has been cancelled",
						order.ticket_number,
						order.customer_name()
					),
					data: json!({
						"orderId": order.id,
						"ticketNumber": order.ticket_number,
						"customerName": order.customer_name(),
						"reason": reason,
					}),
					link: admin_link(order),
				})
				.await;
			},
			OrderStatus::Shipping => {
				if let Some(account_id) = order.owner_ref.account_id() {
					self.dispatch(NewNotification {
						target: NotificationTarget::User(account_id.to_string()),
						kind: NotificationType::OrderShipping,
						title: "Order on its way".into(),
						message: format!(
							"Your order {} is out for delivery",
							order.ticket_number
						),
						data: json!({
							"orderId": order.id,
							"ticketNumber": order.ticket_number,
						}),
						link: user_link(order),
					})
					.await;
				}
			},
			OrderStatus::Confirmed => {
				if let Some(account_id) = order.owner_ref.account_id() {
					self.dispatch(NewNotification {
						target: NotificationTarget::User(account_id.to_string()),
						kind: NotificationType::OrderConfirmed,
						title: "Order confirmed".into(),
						message: format!(
							"Your order {} has been confirmed and is being processed",
							order.ticket_number
						),
						data: json!({
							"orderId": order.id,
							"ticketNumber": order.ticket_number,
						}),
						link: user_link(order),
					})
					.await;
				}
			},
			// Set by the factory or internal to other flows
			OrderStatus::Pending | OrderStatus::Processing => {},
			// These arrive through their dedicated events
			OrderStatus::ReturnRequested | OrderStatus::Returned => {},
		}
	}

	async fn on_return_requested(&self, order: &Order, reason: &str) {
		self.dispatch(NewNotification {
			target: NotificationTarget::Admin,
			kind: NotificationType::OrderReturnRequested,
			title: "Return requested".into(),
			message: format!(
				"Order {} from {}: return requested: {}",
				order.ticket_number,
				order.customer_name(),
				reason
			),
			data: json!({
				"orderId": order.id,
				"ticketNumber": order.ticket_number,
				"customerName": order.customer_name(),
				"reason": reason,
			}),
			link: admin_link(order),
		})
		.await;

		if let Some(account_id) = order.owner_ref.account_id() {
			self.dispatch(NewNotification {
				target: NotificationTarget::User(account_id.to_string()),
				kind: NotificationType::OrderReturnRequested,
				title: "Return request submitted".into(),
				message: format!(
					"Your return request for order {} has been submitted. Reason: {}",
					order.ticket_number, reason
				),
				data: json!({
					"orderId": order.id,
					"ticketNumber": order.ticket_number,
					"reason": reason,
				}),
				link: user_link(order),
			})
			.await;
		}
	}

	async fn on_return_approved(&self, order: &Order) {
		if let Some(account_id) = order.owner_ref.account_id() {
			self.dispatch(NewNotification {
				target: NotificationTarget::User(account_id.to_string()),
				kind: NotificationType::OrderReturnApproved,
				title: "Return request approved".into(),
				message: format!(
					"Your return request for order {} was approved. Please prepare the items for pickup.",
					order.ticket_number
				),
				data: json!({
					"orderId": order.id,
					"ticketNumber": order.ticket_number,
				}),
				link: user_link(order),
			})
			.await;
		}
		self.dispatch(NewNotification {
			target: NotificationTarget::Admin,
			kind: NotificationType::OrderReturnApproved,
			title: "Return request approved".into(),
			message: format!(
				"Return request for order {} from {} was approved",
				order.ticket_number,
				order.customer_name()
			),
			data: json!({
				"orderId": order.id,
				"ticketNumber": order.ticket_number,
				"customerName": order.customer_name(),
			}),
			link: admin_link(order),
		})
		.await;
	}

	async fn on_return_rejected(&self, order: &Order, reason: &str) {
		if let Some(account_id) = order.owner_ref.account_id() {
			self.dispatch(NewNotification {
				target: NotificationTarget::User(account_id.to_string()),
				kind: NotificationType::OrderReturnRejected,
				title: "Return request rejected".into(),
				message: format!(
					"Your return request for order {} was rejected. Reason: {}",
					order.ticket_number, reason
				),
				data: json!({
					"orderId": order.id,
					"ticketNumber": order.ticket_number,
					"reason": reason,
				}),
				link: user_link(order),
			})
			.await;
		}
		self.dispatch(NewNotification {
			target: NotificationTarget::Admin,
			kind: NotificationType::OrderReturnRejected,
			title: "Return request rejected".into(),
			message: format!(
				"Return request for order {} from {} was rejected. Reason: {}",
				order.ticket_number,
				order.customer_name(),
				reason
			),
			data: json!({
				"orderId": order.id,
				"ticketNumber": order.ticket_number,
				"customerName": order.customer_name(),
				"reason": reason,
			}),
			link: admin_link(order),
		})
		.await;
	}

	/// Persists one notification, logging instead of propagating failure.
	async fn dispatch(&self, new: NewNotification) {
		if let Err(e) = self.notifications.create(new).await {
			tracing::error!(error = %e, "Failed to create notification");
		}
	}

	/// Sends the order confirmation email, preferring the owner's
	/// on-file address over whatever the checkout payload carried.
	async fn send_confirmation_email(&self, order: &Order, fallback_email: Option<String>) {
		let mut recipient = None;

		if let Some(account_id) = order.owner_ref.account_id() {
			match self.accounts.find_by_id(account_id).await {
				Ok(Some(account)) => {
					recipient = account.preferred_email().map(str::to_string);
				},
				Ok(None) => {},
				Err(e) => {
					tracing::warn!(
						order_id = %truncate_id(&order.id),
						error = %e,
						"Failed to look up owner for confirmation email"
					);
				},
			}
		}

		let recipient = recipient.or(fallback_email);
		let Some(recipient) = recipient else {
			tracing::info!(
				order_id = %truncate_id(&order.id),
				"No usable email for order confirmation"
			);
			return;
		};

		let (subject, html) = templates::order_confirmation(order);
		match self.mailer.send(&recipient, &subject, &html).await {
			Ok(()) => {
				tracing::debug!(
					order_id = %truncate_id(&order.id),
					"Sent order confirmation email"
				);
			},
			Err(e) => {
				tracing::error!(
					order_id = %truncate_id(&order.id),
					error = %e,
					"Failed to send order confirmation email"
				);
			},
		}
	}
}

fn admin_link(order: &Order) -> String {
	format!("/collections/orders/{}", order.ticket_number)
}

fn user_link(order: &Order) -> String {
	format!("/order/{}", order.id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::orders::tests::fixture_order;
	use async_trait::async_trait;
	use fulfillment_account::implementations::store::StoreAccounts;
	use fulfillment_mailer::{MailerError, MailerInterface};
	use fulfillment_storage::implementations::memory::MemoryStorage;
	use fulfillment_storage::StorageService;
	use fulfillment_types::{Collection, ConfigSchema, OwnerRef, TargetType};
	use std::sync::Mutex;

	/// Transport that records sends instead of delivering them.
	struct RecordingMailer {
		sent: Arc<Mutex<Vec<(String, String)>>>,
	}

	#[async_trait]
	impl MailerInterface for RecordingMailer {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!("not used in tests")
		}

		async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), MailerError> {
			self.sent
				.lock()
				.unwrap()
				.push((to.to_string(), subject.to_string()));
			Ok(())
		}
	}

	struct Setup {
		handler: NotificationHandler,
		notifications: Arc<NotificationService>,
		storage: Arc<StorageService>,
		sent: Arc<Mutex<Vec<(String, String)>>>,
	}

	fn setup() -> Setup {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let notifications = Arc::new(NotificationService::new(storage.clone()));
		let accounts = Arc::new(AccountService::new(Box::new(StoreAccounts::new(
			storage.clone(),
		))));
		let sent = Arc::new(Mutex::new(Vec::new()));
		let mailer = Arc::new(MailerService::new(Box::new(RecordingMailer {
			sent: sent.clone(),
		})));
		let handler = NotificationHandler::new(notifications.clone(), accounts, mailer);
		Setup {
			handler,
			notifications,
			storage,
			sent,
		}
	}

	async fn total_notifications(setup: &Setup) -> u64 {
		let admin = setup
			.notifications
			.unread_count(TargetType::Admin, None)
			.await
			.unwrap();
		let user = setup
			.storage
			.count_documents(
				Collection::Notifications,
				&fulfillment_types::Filter::new().eq("targetType", "user"),
			)
			.await
			.unwrap();
		admin + user
	}

	#[tokio::test]
	async fn delivered_produces_exactly_owner_and_admin() {
		let setup = setup();
		let order = fixture_order();
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::StatusChanged {
				order,
				status: OrderStatus::Delivered,
				note: None,
			}))
			.await;

		assert_eq!(total_notifications(&setup).await, 2);
		let mine = setup
			.notifications
			.list(TargetType::User, Some("acc-1"), false, None)
			.await
			.unwrap();
		assert_eq!(mine.len(), 1);
		assert_eq!(mine[0].kind, NotificationType::OrderDelivered);
	}

	#[tokio::test]
	async fn guest_delivery_notifies_admin_only() {
		let setup = setup();
		let mut order = fixture_order();
		order.owner_ref = OwnerRef::Guest;
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::StatusChanged {
				order,
				status: OrderStatus::Delivered,
				note: None,
			}))
			.await;
		assert_eq!(total_notifications(&setup).await, 1);
	}

	#[tokio::test]
	async fn confirmed_skips_guests_entirely() {
		let setup = setup();
		let mut order = fixture_order();
		order.owner_ref = OwnerRef::Guest;
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::StatusChanged {
				order,
				status: OrderStatus::Confirmed,
				note: None,
			}))
			.await;
		assert_eq!(total_notifications(&setup).await, 0);
	}

	#[tokio::test]
	async fn shipping_notifies_owner_only() {
		let setup = setup();
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::StatusChanged {
				order: fixture_order(),
				status: OrderStatus::Shipping,
				note: None,
			}))
			.await;

		assert_eq!(total_notifications(&setup).await, 1);
		let admin = setup
			.notifications
			.list(TargetType::Admin, None, false, None)
			.await
			.unwrap();
		assert!(admin.is_empty());
	}

	#[tokio::test]
	async fn processing_is_silent() {
		let setup = setup();
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::StatusChanged {
				order: fixture_order(),
				status: OrderStatus::Processing,
				note: None,
			}))
			.await;
		assert_eq!(total_notifications(&setup).await, 0);
	}

	#[tokio::test]
	async fn cancellation_reason_reaches_the_owner() {
		let setup = setup();
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::StatusChanged {
				order: fixture_order(),
				status: OrderStatus::Cancelled,
				note: Some("out of stock".into()),
			}))
			.await;

		let mine = setup
			.notifications
			.list(TargetType::User, Some("acc-1"), false, None)
			.await
			.unwrap();
		assert!(mine[0].message.contains("out of stock"));
	}

	#[tokio::test]
	async fn created_notifies_admin_and_owner_and_emails() {
		let setup = setup();
		crate::orders::tests::seed_account(
			&setup.storage,
			"acc-1",
			"0901234567",
			"onfile@example.com",
		)
		.await;

		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::Created {
				order: fixture_order(),
				fallback_email: Some("checkout@example.com".into()),
			}))
			.await;

		assert_eq!(total_notifications(&setup).await, 2);

		// The on-file address wins over the payload email
		let sent = setup.sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].0, "onfile@example.com");
	}

	#[tokio::test]
	async fn created_without_any_email_still_succeeds() {
		let setup = setup();
		let mut order = fixture_order();
		order.owner_ref = OwnerRef::Guest;
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::Created {
				order,
				fallback_email: None,
			}))
			.await;

		assert!(setup.sent.lock().unwrap().is_empty());
		// Admin notification still created
		assert_eq!(total_notifications(&setup).await, 1);
	}

	#[tokio::test]
	async fn guest_fallback_email_is_used_when_no_account() {
		let setup = setup();
		let mut order = fixture_order();
		order.owner_ref = OwnerRef::Guest;
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::Created {
				order,
				fallback_email: Some("guest@example.com".into()),
			}))
			.await;

		let sent = setup.sent.lock().unwrap();
		assert_eq!(sent[0].0, "guest@example.com");
	}

	#[tokio::test]
	async fn return_flow_notifies_both_sides() {
		let setup = setup();
		let order = fixture_order();

		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::ReturnRequested {
				order: order.clone(),
				reason: "damaged".into(),
			}))
			.await;
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::ReturnApproved {
				order: order.clone(),
			}))
			.await;
		setup
			.handler
			.handle(EngineEvent::Order(OrderEvent::ReturnRejected {
				order,
				reason: "opened".into(),
			}))
			.await;

		assert_eq!(total_notifications(&setup).await, 6);
	}
}

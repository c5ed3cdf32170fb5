//! Core fulfillment engine.
//!
//! This module contains the main FulfillmentEngine struct which wires the
//! order operation surface to its collaborators (document store, account
//! lookup, mailer), runs the event loop that drives notification side
//! effects, and owns the auto-completion sweep's lifetime.

pub mod event_bus;
pub mod lifecycle;

use crate::handlers::NotificationHandler;
use crate::monitoring::CompletionSweep;
use crate::orders::OrderService;
use fulfillment_account::AccountService;
use fulfillment_config::Config;
use fulfillment_mailer::MailerService;
use fulfillment_notify::NotificationService;
use fulfillment_storage::StorageService;
use fulfillment_types::SharedClock;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Main engine coordinating order operations and their side effects.
pub struct FulfillmentEngine {
	/// Engine configuration.
	pub(crate) config: Config,
	/// Order operation surface exposed to collaborating subsystems.
	pub(crate) orders: Arc<OrderService>,
	/// Notification dispatcher, also exposed for read-state operations.
	pub(crate) notifications: Arc<NotificationService>,
	/// Event bus connecting operations to the notification handler.
	pub(crate) event_bus: event_bus::EventBus,
	/// Handler consuming order events.
	pub(crate) notification_handler: Arc<NotificationHandler>,
	/// Auto-completion sweep, spawned by `run`.
	pub(crate) sweep: Arc<CompletionSweep>,
	/// Handle of the running sweep task.
	pub(crate) sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl FulfillmentEngine {
	/// Creates a new engine around the given collaborator services.
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		accounts: Arc<AccountService>,
		mailer: Arc<MailerService>,
		clock: SharedClock,
	) -> Self {
		let event_bus = event_bus::EventBus::new(config.service.event_capacity);
		let notifications = Arc::new(NotificationService::new(storage.clone()));
		let orders = Arc::new(OrderService::new(
			storage.clone(),
			accounts.clone(),
			event_bus.clone(),
			clock.clone(),
		));
		let notification_handler = Arc::new(NotificationHandler::new(
			notifications.clone(),
			accounts,
			mailer,
		));
		let sweep = Arc::new(CompletionSweep::new(
			storage,
			clock,
			config.sweep.clone(),
		));

		Self {
			config,
			orders,
			notifications,
			event_bus,
			notification_handler,
			sweep,
			sweep_task: Mutex::new(None),
		}
	}

	/// The order operation surface.
	pub fn orders(&self) -> &Arc<OrderService> {
		&self.orders
	}

	/// The notification dispatcher (read-state operations).
	pub fn notifications(&self) -> &Arc<NotificationService> {
		&self.notifications
	}

	/// Main event loop.
	///
	/// Subscribes to the event bus, starts the sweep, and consumes order
	/// events until the bus closes or Ctrl+C arrives. Handler failures
	/// are logged inside the handler; nothing here aborts the loop.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.initialize().await?;

		let mut events = self.event_bus.subscribe();
		{
			let mut task = self.sweep_task.lock().await;
			if task.is_none() {
				*task = Some(self.sweep.clone().spawn());
			}
		}

		loop {
			tokio::select! {
				event = events.recv() => {
					match event {
						Ok(event) => self.notification_handler.handle(event).await,
						Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
							tracing::warn!(missed, "Notification handler lagged behind event bus");
						},
						Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
					}
				}

				// Shutdown signal
				_ = tokio::signal::ctrl_c() => {
					break;
				}
			}
		}

		self.shutdown().await
	}
}

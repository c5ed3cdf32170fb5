//! Auto-completion sweep for stale in-flight orders.
//!
//! Orders stuck in processing or shipping past the configured grace
//! window after confirmation are promoted to delivered (and marked paid)
//! in one batched conditional update. The promotion is silent: it skips
//! the per-transition notification path entirely and only the aggregate
//! count is logged. Owned by the engine: started once at boot, aborted on
//! shutdown, no backoff — a failed pass waits for the next tick.

use chrono::Duration as ChronoDuration;
use fulfillment_config::SweepConfig;
use fulfillment_storage::{StorageError, StorageService};
use fulfillment_types::{Collection, Condition, Filter, SharedClock, Update};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Recurring task promoting stale in-flight orders to delivered.
pub struct CompletionSweep {
	storage: Arc<StorageService>,
	clock: SharedClock,
	config: SweepConfig,
}

impl CompletionSweep {
	pub fn new(storage: Arc<StorageService>, clock: SharedClock, config: SweepConfig) -> Self {
		Self {
			storage,
			clock,
			config,
		}
	}

	/// Spawns the sweep loop: one pass shortly after boot, then one per
	/// configured interval. The caller owns the handle and aborts it on
	/// shutdown.
	pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(self.config.startup_delay_seconds)).await;
			self.pass().await;

			let mut ticker =
				tokio::time::interval(Duration::from_secs(self.config.interval_seconds));
			// The first tick fires immediately and would double the boot
			// pass
			ticker.tick().await;
			loop {
				ticker.tick().await;
				self.pass().await;
			}
		})
	}

	async fn pass(&self) {
		match self.sweep_once().await {
			Ok(0) => {},
			Ok(count) => {
				tracing::info!(count, "Auto-completed stale orders");
			},
			Err(e) => {
				tracing::error!(error = %e, "Auto-completion sweep failed");
			},
		}
	}

	/// Runs one sweep pass and returns how many orders were promoted.
	///
	/// The filter and the promotion travel in a single `update_many`, so
	/// an order that a staff member cancels mid-sweep is either promoted
	/// or cancelled, never both.
	pub async fn sweep_once(&self) -> Result<u64, StorageError> {
		let now = self.clock.now();
		let cutoff = now - ChronoDuration::hours(self.config.grace_period_hours as i64);

		let filter = Filter::new()
			.field(
				"status",
				Condition::In(vec![json!("processing"), json!("shipping")]),
			)
			.field("confirmedAt", Condition::Lte(json!(cutoff)))
			.field("deliveredAt", Condition::Exists(false));

		let update = Update::new()
			.set("status", "delivered")
			.set("deliveredAt", json!(now))
			.set("paymentStatus", "paid")
			.set("updatedAt", json!(now));

		self.storage
			.update_many(Collection::Orders, &filter, &update)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::orders::tests::{checkout, harness, T0_MILLIS};
	use chrono::{TimeZone, Utc};
	use fulfillment_types::{FixedClock, OrderRef, OrderStatus, PaymentStatus};

	fn sweep_at(
		storage: Arc<StorageService>,
		offset_hours: i64,
		grace_period_hours: u64,
	) -> CompletionSweep {
		let at = Utc.timestamp_millis_opt(T0_MILLIS).unwrap()
			+ ChronoDuration::hours(offset_hours);
		CompletionSweep::new(
			storage,
			Arc::new(FixedClock(at)),
			SweepConfig {
				interval_seconds: 3600,
				grace_period_hours,
				startup_delay_seconds: 0,
			},
		)
	}

	#[tokio::test]
	async fn promotes_stale_in_flight_orders() {
		let harness = harness();
		let order = harness.service.create_order(checkout()).await.unwrap();
		let reference = OrderRef::parse(&order.ticket_number);
		harness
			.service
			.transition(&reference, OrderStatus::Confirmed, None)
			.await
			.unwrap();
		harness
			.service
			.transition(&reference, OrderStatus::Processing, None)
			.await
			.unwrap();

		// Three days later, with a two-day grace window
		let sweep = sweep_at(harness.storage.clone(), 72, 48);
		assert_eq!(sweep.sweep_once().await.unwrap(), 1);

		let promoted = harness.service.get_order(&reference).await.unwrap();
		assert_eq!(promoted.status, OrderStatus::Delivered);
		assert_eq!(promoted.payment_status, PaymentStatus::Paid);
		assert!(promoted.delivered_at.is_some());
	}

	#[tokio::test]
	async fn leaves_orders_inside_the_grace_window() {
		let harness = harness();
		let order = harness.service.create_order(checkout()).await.unwrap();
		let reference = OrderRef::parse(&order.ticket_number);
		harness
			.service
			.transition(&reference, OrderStatus::Confirmed, None)
			.await
			.unwrap();
		harness
			.service
			.transition(&reference, OrderStatus::Shipping, None)
			.await
			.unwrap();

		// One day later, still inside the two-day window
		let sweep = sweep_at(harness.storage.clone(), 24, 48);
		assert_eq!(sweep.sweep_once().await.unwrap(), 0);

		let untouched = harness.service.get_order(&reference).await.unwrap();
		assert_eq!(untouched.status, OrderStatus::Shipping);
	}

	#[tokio::test]
	async fn skips_orders_never_confirmed() {
		let harness = harness();
		let order = harness.service.create_order(checkout()).await.unwrap();
		let reference = OrderRef::parse(&order.ticket_number);
		// Straight to processing without a confirmation stamp
		harness
			.service
			.transition(&reference, OrderStatus::Processing, None)
			.await
			.unwrap();

		let sweep = sweep_at(harness.storage.clone(), 72, 48);
		assert_eq!(sweep.sweep_once().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn skips_orders_already_carrying_a_delivery_stamp() {
		let harness = harness();
		let order = harness.service.create_order(checkout()).await.unwrap();
		let reference = OrderRef::parse(&order.ticket_number);
		harness
			.service
			.transition(&reference, OrderStatus::Confirmed, None)
			.await
			.unwrap();
		harness
			.service
			.transition(&reference, OrderStatus::Delivered, None)
			.await
			.unwrap();
		// Staff pushed it back into shipping after a delivery mishap
		harness
			.service
			.transition(&reference, OrderStatus::Shipping, None)
			.await
			.unwrap();

		let sweep = sweep_at(harness.storage.clone(), 72, 48);
		assert_eq!(sweep.sweep_once().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn racing_cancel_and_sweep_have_one_winner() {
		let harness = harness();
		let order = harness.service.create_order(checkout()).await.unwrap();
		let reference = OrderRef::parse(&order.ticket_number);
		harness
			.service
			.transition(&reference, OrderStatus::Confirmed, None)
			.await
			.unwrap();
		harness
			.service
			.transition(&reference, OrderStatus::Processing, None)
			.await
			.unwrap();

		let sweep = Arc::new(sweep_at(harness.storage.clone(), 72, 48));
		let service = harness.service.clone();
		let cancel_ref = reference.clone();
		let (cancelled, swept) = tokio::join!(
			tokio::spawn(async move { service.cancel(&cancel_ref, None).await }),
			tokio::spawn({
				let sweep = sweep.clone();
				async move { sweep.sweep_once().await.unwrap() }
			}),
		);
		let cancelled = cancelled.unwrap();
		let swept = swept.unwrap();

		let final_order = harness.service.get_order(&reference).await.unwrap();
		match (&cancelled, swept) {
			(Ok(_), 0) => assert_eq!(final_order.status, OrderStatus::Cancelled),
			(Err(_), 1) => assert_eq!(final_order.status, OrderStatus::Delivered),
			other => panic!("expected exactly one winner, got {:?}", other),
		}
		// The cancel path appends history; the sweep does not. Either
		// way the trail was appended at most once past creation.
		assert!(final_order.status_history.len() <= 4);
	}

	#[tokio::test]
	async fn spawned_sweep_runs_on_its_own() {
		let harness = harness();
		let order = harness.service.create_order(checkout()).await.unwrap();
		let reference = OrderRef::parse(&order.ticket_number);
		harness
			.service
			.transition(&reference, OrderStatus::Confirmed, None)
			.await
			.unwrap();
		harness
			.service
			.transition(&reference, OrderStatus::Processing, None)
			.await
			.unwrap();

		let sweep = Arc::new(sweep_at(harness.storage.clone(), 72, 48));
		let handle = sweep.spawn();

		// Give the boot pass a moment to run
		tokio::time::sleep(Duration::from_millis(100)).await;
		handle.abort();

		let promoted = harness.service.get_order(&reference).await.unwrap();
		assert_eq!(promoted.status, OrderStatus::Delivered);
	}
}

//! Clock abstraction for injectable time.
//!
//! Ticket numbers, lifecycle timestamps and the sweep's grace window all
//! derive from the same injected clock, so tests can pin time instead of
//! racing the wall clock.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of the current instant.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a clock implementation.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock pinned to a fixed instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		self.0
	}
}

//! Core engine for the fulfillment system.
//!
//! This crate provides the order lifecycle and notification coordination
//! engine: order creation from checkout payloads, the status state
//! machine and its return/cancel sub-workflow, identity resolution of
//! caller-supplied order references, the event-driven notification
//! handler, and the auto-completion sweep. The excluded HTTP layer and
//! admin tooling call into the operation surface exposed by
//! [`orders::OrderService`].

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod monitoring;
pub mod orders;
pub mod state;

pub use builder::{EngineBuilder, EngineFactories};
pub use engine::{EngineError, FulfillmentEngine};
pub use orders::{OrderError, OrderService};

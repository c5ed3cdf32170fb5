//! Event handlers driven by the engine's run loop.

pub mod notification;

pub use notification::NotificationHandler;

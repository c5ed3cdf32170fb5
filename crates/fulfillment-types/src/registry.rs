//! Registry trait for self-registering implementations.
//!
//! Pluggable modules (storage backends, mailer transports) each provide a
//! `Registry` struct implementing this trait, tying the name used in
//! configuration files to the factory that builds the implementation.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this
	/// implementation, e.g. "memory" for `storage.implementations.memory`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory that builds this implementation from its
	/// configuration table.
	fn factory() -> Self::Factory;
}

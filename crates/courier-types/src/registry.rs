//! Registry trait for self-registering implementations.
//!
//! Gateway and order directory implementations each expose a `Registry`
//! struct declaring the name used in configuration and the factory that
//! builds the implementation from its TOML table.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "http" for `gateway.implementations.http`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}

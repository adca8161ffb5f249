//! Common types module for the courier dispatch system.
//!
//! This module defines the data model shared by every dispatch component:
//! orders as reported by the order directory, delivery quotes and dispatch
//! results exchanged with the delivery provider gateway, the local dispatch
//! lifecycle and the events published while it progresses.

/// Delivery quote, dispatch result, provider and policy types.
pub mod delivery;
/// Event types published by the dispatch orchestrator.
pub mod events;
/// Order types as reported by the order directory.
pub mod order;
/// Self-registration trait for pluggable implementations.
pub mod registry;
/// Zeroizing string wrapper for provider credentials.
pub mod secret_string;
/// Utility functions for log formatting.
pub mod utils;
/// Configuration validation types for implementation tables.
pub mod validation;

// Re-export all types for convenient access
pub use delivery::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use utils::truncate_id;
pub use validation::*;

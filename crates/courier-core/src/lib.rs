//! Core dispatch engine for the courier dispatch system.
//!
//! This crate owns the per-order delivery dispatch state machine: deciding
//! when a ready order gets a courier, running the quote and accept sequence
//! against the delivery provider gateway, reconciling the local optimistic
//! view with the backend-reported delivery status, and pruning state for
//! orders that left the kitchen's working set.

pub mod builder;
pub mod dispatch;
pub mod engine;
pub mod reconcile;
pub mod state;

pub use builder::{BuilderError, CourierBuilder, CourierFactories};
pub use dispatch::{DispatchError, DispatchOrchestrator, Trigger};
pub use engine::{event_bus::EventBus, DispatchEngine, EngineError};
pub use state::DispatchRuntimeState;

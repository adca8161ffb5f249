//! Runtime state kept per order while dispatch attempts are in progress.

pub mod runtime;

pub use runtime::DispatchRuntimeState;

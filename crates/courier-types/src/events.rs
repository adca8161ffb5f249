//! Event types published while orders move through the dispatch lifecycle.
//!
//! Events flow through the orchestrator's event bus so that the service layer
//! (and tests) can observe state transitions without polling the query surface.

use crate::{DispatchResult, DispatchState, Quote};
use serde::{Deserialize, Serialize};

/// Dispatch lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchEvent {
	/// The local dispatch state of an order changed.
	StateChanged {
		order_id: String,
		state: DispatchState,
	},
	/// A quote was obtained and is now held for the order.
	QuoteReceived { order_id: String, quote: Quote },
	/// A driver was dispatched for the order.
	Dispatched {
		order_id: String,
		result: DispatchResult,
	},
	/// A dispatch attempt ended in failure.
	Failed { order_id: String, error: String },
	/// Runtime state was dropped for orders that left the working set.
	Pruned { order_ids: Vec<String> },
}

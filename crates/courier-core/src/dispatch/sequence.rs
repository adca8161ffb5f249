//! The asynchronous part of a dispatch attempt.
//!
//! Runs after the orchestrator claimed the order: credential confirmation,
//! quote, accept, and a single re-quote when the provider reports the quote
//! as expired. Whatever happens, the attempt ends in a terminal local state.

use super::{message_or, DispatchError, DispatchOrchestrator, Trigger, DISPATCH_FALLBACK};
use courier_types::{truncate_id, DispatchEvent, DispatchResult, DispatchState, Quote};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::instrument;

enum Outcome {
	Dispatched(DispatchResult),
	/// Manual attempt stopped after obtaining a quote for the operator to see.
	AwaitingConfirmation,
}

impl DispatchOrchestrator {
	#[instrument(skip_all, fields(order_id = %truncate_id(&order_id), trigger = ?trigger))]
	pub(super) async fn run(self: Arc<Self>, order_id: String, trigger: Trigger) {
		let outcome = AssertUnwindSafe(self.attempt(&order_id, trigger))
			.catch_unwind()
			.await
			.unwrap_or_else(|panic| {
				let reason = panic
					.downcast_ref::<&str>()
					.map(|reason| reason.to_string())
					.or_else(|| panic.downcast_ref::<String>().cloned())
					.unwrap_or_default();
				tracing::error!(reason = %reason, "Dispatch attempt panicked");
				Err(DispatchError::Unexpected(DISPATCH_FALLBACK.to_string()))
			});

		match outcome {
			Ok(Outcome::Dispatched(result)) => {
				self.runtime.discard_quote(&order_id);
				self.runtime.clear_error(&order_id);
				self.set_state(&order_id, DispatchState::Dispatched);
				tracing::info!(
					delivery_id = %truncate_id(&result.delivery_external_id),
					"Driver dispatched"
				);
				self.event_bus
					.publish(DispatchEvent::Dispatched {
						order_id: order_id.clone(),
						result,
					})
					.ok();
			},
			Ok(Outcome::AwaitingConfirmation) => {
				self.set_state(&order_id, DispatchState::Idle);
				tracing::info!("Quote awaiting operator confirmation");
			},
			Err(error) => {
				tracing::warn!(error = %error, "Dispatch attempt failed");
				self.fail(&order_id, &error);
			},
		}

		if !self.is_working(&order_id) {
			self.runtime.forget(&order_id);
		}
	}

	async fn attempt(&self, order_id: &str, trigger: Trigger) -> Result<Outcome, DispatchError> {
		let provider = self.policy().provider;
		let confirmed = self
			.gateway
			.ensure_selected_provider_configured(provider)
			.await
			.map_err(|e| DispatchError::Unexpected(message_or(&e, DISPATCH_FALLBACK)))?;
		if !confirmed {
			return Err(DispatchError::CredentialsMissing);
		}

		let (quote, fresh) = match self.runtime.quote(order_id) {
			Some(quote) => (quote, false),
			None => (self.obtain_quote(order_id).await?, true),
		};
		if trigger == Trigger::Manual && fresh {
			return Ok(Outcome::AwaitingConfirmation);
		}

		self.set_state(order_id, DispatchState::Dispatching);
		match self.gateway.accept_quote(order_id, &quote.quote_id).await {
			Ok(result) => Ok(Outcome::Dispatched(result)),
			Err(e) if self.gateway.is_expired_quote_error(&e) => {
				tracing::warn!(
					quote_id = %quote.quote_id,
					error = %e,
					"Quote expired, requesting a new one"
				);
				self.runtime.discard_quote(order_id);
				let quote = self.obtain_quote(order_id).await?;
				self.set_state(order_id, DispatchState::Dispatching);
				self.gateway
					.accept_quote(order_id, &quote.quote_id)
					.await
					.map(Outcome::Dispatched)
					.map_err(|e| DispatchError::accept(&e))
			},
			Err(e) => Err(DispatchError::accept(&e)),
		}
	}

	async fn obtain_quote(&self, order_id: &str) -> Result<Quote, DispatchError> {
		self.set_state(order_id, DispatchState::Quoting);
		let quote = self
			.gateway
			.request_quote(order_id)
			.await
			.map_err(|e| DispatchError::quote(&e))?;

		tracing::info!(quote_id = %quote.quote_id, fee = %quote.fee, "Quote obtained");
		self.runtime.set_quote(order_id, quote.clone());
		self.event_bus
			.publish(DispatchEvent::QuoteReceived {
				order_id: order_id.to_string(),
				quote: quote.clone(),
			})
			.ok();
		Ok(quote)
	}
}

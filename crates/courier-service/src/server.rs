//! HTTP server for the operator API.
//!
//! Exposes the dispatch query surface and the manual dispatch action for a
//! single order, plus reading and updating the dispatch policy.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::get,
	Router,
};
use courier_config::ApiConfig;
use courier_core::DispatchEngine;
use courier_types::{DispatchPolicy, DispatchState, Quote};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the dispatch engine serving requests.
	pub engine: Arc<DispatchEngine>,
}

/// Dispatch status of one order as shown to the operator.
#[derive(Debug, Serialize)]
pub struct DispatchStatusResponse {
	pub order_id: String,
	pub state: DispatchState,
	pub error: Option<String>,
	pub quote: Option<Quote>,
	pub is_dispatching: bool,
	pub can_dispatch: bool,
}

impl DispatchStatusResponse {
	fn for_order(engine: &DispatchEngine, order_id: &str) -> Self {
		let orchestrator = engine.orchestrator();
		Self {
			order_id: order_id.to_string(),
			state: orchestrator.get_dispatch_state(order_id),
			error: orchestrator.get_dispatch_error(order_id),
			quote: orchestrator.get_delivery_quote(order_id),
			is_dispatching: orchestrator.is_dispatching_delivery(order_id),
			can_dispatch: orchestrator.can_dispatch(order_id),
		}
	}
}

/// Errors returned by the API.
#[derive(Debug)]
pub enum ApiError {
	OrderNotFound(String),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match self {
			ApiError::OrderNotFound(id) => (
				StatusCode::NOT_FOUND,
				Json(serde_json::json!({ "error": format!("Order not found: {}", id) })),
			)
				.into_response(),
		}
	}
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<DispatchEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { engine });

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Courier API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Builds the router with all routes nested under `/api`.
pub fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route(
					"/orders/{id}/dispatch",
					get(handle_get_dispatch).post(handle_dispatch),
				)
				.route("/policy", get(handle_get_policy).put(handle_put_policy)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(state)
}

/// Handles GET /api/orders/{id}/dispatch requests.
async fn handle_get_dispatch(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<DispatchStatusResponse>, ApiError> {
	if state.engine.orchestrator().order(&id).is_none() {
		return Err(ApiError::OrderNotFound(id));
	}
	Ok(Json(DispatchStatusResponse::for_order(&state.engine, &id)))
}

/// Handles POST /api/orders/{id}/dispatch requests.
///
/// Starts a manual dispatch attempt and returns immediately with 202. When no
/// attempt could be started the current status is returned with 409.
async fn handle_dispatch(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Response, ApiError> {
	if state.engine.orchestrator().order(&id).is_none() {
		return Err(ApiError::OrderNotFound(id));
	}

	let status = match state.engine.orchestrator().on_dispatch_driver(&id) {
		Some(_) => StatusCode::ACCEPTED,
		None => {
			tracing::debug!(order_id = %id, "Manual dispatch not possible");
			StatusCode::CONFLICT
		},
	};
	Ok((
		status,
		Json(DispatchStatusResponse::for_order(&state.engine, &id)),
	)
		.into_response())
}

/// Handles GET /api/policy requests.
async fn handle_get_policy(State(state): State<AppState>) -> Json<DispatchPolicy> {
	Json(state.engine.policy())
}

/// Handles PUT /api/policy requests.
async fn handle_put_policy(
	State(state): State<AppState>,
	Json(policy): Json<DispatchPolicy>,
) -> Json<DispatchPolicy> {
	state.engine.update_policy(policy);
	Json(policy)
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::Request;
	use courier_config::builders::ConfigBuilder;
	use courier_types::{DeliveryInfo, DeliveryProvider, DispatchEvent, KitchenStatus, Order};
	use serde_json::Value;
	use tower::ServiceExt;

	fn engine() -> Arc<DispatchEngine> {
		let config = ConfigBuilder::new().build();
		let engine = Arc::new(crate::build_engine(config).unwrap());
		engine.orchestrator().sync_orders(&[
			Order {
				id: "O1".to_string(),
				status: KitchenStatus::Ready,
				delivery_info: Some(DeliveryInfo::default()),
			},
			Order {
				id: "P1".to_string(),
				status: KitchenStatus::Ready,
				delivery_info: None,
			},
		]);
		engine
	}

	async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let request = Request::builder()
			.method(method)
			.uri(uri)
			.header("content-type", "application/json")
			.body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
			.unwrap();
		let response = app.oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
	}

	#[tokio::test]
	async fn test_get_dispatch_status() {
		let app = router(AppState { engine: engine() });

		let (status, body) = send(app.clone(), "GET", "/api/orders/O1/dispatch", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["order_id"], "O1");
		assert_eq!(body["state"], "idle");
		assert_eq!(body["can_dispatch"], true);
		assert!(body["quote"].is_null());

		let (status, _) = send(app, "GET", "/api/orders/missing/dispatch", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_manual_dispatch_returns_quote() {
		let engine = engine();
		let mut events = engine.event_bus().subscribe();
		let app = router(AppState {
			engine: Arc::clone(&engine),
		});

		let (status, body) = send(app.clone(), "POST", "/api/orders/O1/dispatch", None).await;
		assert_eq!(status, StatusCode::ACCEPTED);
		assert_eq!(body["state"], "quoting");
		assert_eq!(body["is_dispatching"], true);

		while !matches!(events.recv().await.unwrap(), DispatchEvent::QuoteReceived { .. }) {}
		while !matches!(
			events.recv().await.unwrap(),
			DispatchEvent::StateChanged {
				state: DispatchState::Idle,
				..
			}
		) {}

		let (status, body) = send(app, "GET", "/api/orders/O1/dispatch", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["state"], "idle");
		assert_eq!(body["quote"]["quoteId"], "Q1");
	}

	#[tokio::test]
	async fn test_dispatch_without_delivery_info_conflicts() {
		let app = router(AppState { engine: engine() });

		let (status, body) = send(app.clone(), "POST", "/api/orders/P1/dispatch", None).await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["can_dispatch"], false);

		let (status, _) = send(app, "POST", "/api/orders/missing/dispatch", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_policy_round_trip() {
		let engine = engine();
		let app = router(AppState {
			engine: Arc::clone(&engine),
		});

		let (status, body) = send(app.clone(), "GET", "/api/policy", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["auto_dispatch"], false);
		assert_eq!(body["provider"], "doordash");

		let (status, _) = send(
			app,
			"PUT",
			"/api/policy",
			Some(serde_json::json!({ "auto_dispatch": true, "provider": "uber" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(
			engine.policy(),
			DispatchPolicy {
				auto_dispatch: true,
				provider: DeliveryProvider::Uber
			}
		);
	}
}

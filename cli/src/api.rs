//! # REST API
//!
//! Builds the axum router the `serve` subcommand exposes to a presentation
//! layer. Every handler goes through one shared [`VaultClient`].
//!
//! ## Endpoints
//!
//! | Method | Path               | Description                          |
//! |--------|--------------------|--------------------------------------|
//! | GET    | `/health`          | Liveness probe                       |
//! | GET    | `/state`           | Account, snapshot, history, messages |
//! | POST   | `/refresh`         | Re-read the snapshot                 |
//! | POST   | `/history/refresh` | Rebuild the history                  |
//! | POST   | `/deposit`         | `{ "amount": "0.01" }`               |
//! | POST   | `/withdraw`        | `{ "amount": "0.005" }`              |

use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use vault_client::{ClientView, LedgerGateway, TransactionId, VaultClient, VaultError};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for all handlers.
pub struct AppState<G> {
    pub client: Arc<VaultClient<G>>,
    pub metrics: SharedMetrics,
}

impl<G> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Body of `POST /deposit` and `POST /withdraw`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AmountRequest {
    /// Display-form amount, e.g. `"0.01"`.
    pub amount: String,
}

/// Successful submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub transaction_id: TransactionId,
    pub message: String,
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`VaultError`] rendered as an HTTP response.
pub struct ApiError(VaultError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            VaultError::MalformedAmount(_) | VaultError::Rejected(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            VaultError::GatewayFailure { .. } | VaultError::PartialHistoryFailure { .. } => {
                StatusCode::BAD_GATEWAY
            }
            VaultError::NotConnected => StatusCode::CONFLICT,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the API [`Router`] with CORS and request tracing.
pub fn create_router<G: LedgerGateway + 'static>(state: AppState<G>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/state", get(state_handler::<G>))
        .route("/refresh", post(refresh_handler::<G>))
        .route("/history/refresh", post(history_refresh_handler::<G>))
        .route("/deposit", post(deposit_handler::<G>))
        .route("/withdraw", post(withdraw_handler::<G>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — 200 while the process is up. Does not touch the ledger.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn state_handler<G: LedgerGateway + 'static>(
    State(state): State<AppState<G>>,
) -> Json<ClientView> {
    Json(state.client.view())
}

async fn refresh_handler<G: LedgerGateway + 'static>(
    State(state): State<AppState<G>>,
) -> Json<ClientView> {
    state.client.refresh().await;
    Json(state.client.view())
}

/// `POST /history/refresh` — rebuilds the history. On failure the previous
/// history stays in place and the error is returned.
async fn history_refresh_handler<G: LedgerGateway + 'static>(
    State(state): State<AppState<G>>,
) -> Result<Json<ClientView>, ApiError> {
    match state.client.refresh_history().await {
        Ok(()) => {
            let view = state.client.view();
            state.metrics.record_history(view.history.len());
            Ok(Json(view))
        }
        Err(err) => {
            state.metrics.record_failure(&err);
            Err(ApiError(err))
        }
    }
}

async fn deposit_handler<G: LedgerGateway + 'static>(
    State(state): State<AppState<G>>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let result = state.client.deposit(&req.amount).await;
    respond(&state, result)
}

async fn withdraw_handler<G: LedgerGateway + 'static>(
    State(state): State<AppState<G>>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let result = state.client.withdraw(&req.amount).await;
    respond(&state, result)
}

fn respond<G: LedgerGateway>(
    state: &AppState<G>,
    result: Result<TransactionId, VaultError>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    match result {
        Ok(transaction_id) => {
            state.metrics.transactions_submitted_total.inc();
            let message = state.client.status_message().unwrap_or_default();
            Ok(Json(SubmissionResponse {
                transaction_id,
                message,
            }))
        }
        Err(err) => {
            state.metrics.record_failure(&err);
            Err(ApiError(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use vault_client::gateway::memory::InMemoryLedger;
    use vault_client::{Address, GatewayError, VaultConfig, VaultEvent, U256};

    use crate::metrics::VaultMetrics;

    const VAULT: Address = Address::new([0xaa; 20]);
    const ALICE: Address = Address::new([0x01; 20]);
    const LOCK: u64 = 600;

    /// A router over a fresh ledger whose clock matches the wall clock, with
    /// ALICE connected.
    async fn setup() -> (Arc<InMemoryLedger>, AppState<InMemoryLedger>, Router) {
        let ledger = Arc::new(InMemoryLedger::new(
            VAULT,
            LOCK,
            vault_client::session::unix_now(),
        ));
        let client = Arc::new(VaultClient::new(
            Arc::clone(&ledger),
            VaultConfig::new(VAULT),
        ));
        client.connect(ALICE).await.unwrap();
        let state = AppState {
            client,
            metrics: Arc::new(VaultMetrics::new().unwrap()),
        };
        let router = create_router(state.clone());
        (ledger, state, router)
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        send(router, req).await
    }

    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        send(router, req).await
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (_ledger, _state, router) = setup().await;
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn state_reports_connected_account() {
        let (_ledger, _state, router) = setup().await;
        let (status, body) = get(&router, "/state").await;
        assert_eq!(status, StatusCode::OK);
        let view: ClientView = serde_json::from_slice(&body).unwrap();
        assert_eq!(view.account, Some(ALICE));
        assert_eq!(view.balance.as_deref(), Some("0"));
        assert_eq!(view.lock_period_seconds, Some(LOCK));
    }

    #[tokio::test]
    async fn deposit_returns_transaction_and_message() {
        let (ledger, state, router) = setup().await;
        let (status, body) =
            post_json(&router, "/deposit", serde_json::json!({ "amount": "0.01" })).await;
        assert_eq!(status, StatusCode::OK);

        let resp: SubmissionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            resp.message,
            format!("Deposit transaction sent: {}", resp.transaction_id)
        );
        assert_eq!(ledger.sent_transactions().len(), 1);
        assert_eq!(state.metrics.transactions_submitted_total.get(), 1);

        let (_, body) = get(&router, "/state").await;
        let view: ClientView = serde_json::from_slice(&body).unwrap();
        assert_eq!(view.balance.as_deref(), Some("0.01"));
    }

    #[tokio::test]
    async fn malformed_amount_is_unprocessable() {
        let (ledger, _state, router) = setup().await;
        let (status, body) =
            post_json(&router, "/deposit", serde_json::json!({ "amount": "1e3" })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.starts_with("Invalid amount"));
        assert!(ledger.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn locked_withdrawal_is_unprocessable() {
        let (ledger, state, router) = setup().await;
        post_json(&router, "/deposit", serde_json::json!({ "amount": "1" })).await;

        let (status, body) =
            post_json(&router, "/withdraw", serde_json::json!({ "amount": "0.5" })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.starts_with("Funds are still locked."));
        assert_eq!(ledger.sent_transactions().len(), 1);
        assert_eq!(state.metrics.withdrawals_rejected_total.get(), 1);
    }

    #[tokio::test]
    async fn gateway_failure_is_bad_gateway() {
        let (ledger, state, router) = setup().await;
        ledger.fail_sends(GatewayError::empty());
        let (status, body) =
            post_json(&router, "/deposit", serde_json::json!({ "amount": "1" })).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.error, "Error sending deposit transaction");
        assert_eq!(state.metrics.gateway_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn history_refresh_reports_entries_and_failures() {
        let (ledger, state, router) = setup().await;
        ledger.push_log(VaultEvent::Deposited, ALICE, U256::from(1u8), Some(1));

        let (status, body) = post_json(&router, "/history/refresh", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);
        let view: ClientView = serde_json::from_slice(&body).unwrap();
        assert_eq!(view.history.len(), 1);
        assert_eq!(state.metrics.history_entries.get(), 1);

        ledger.fail_scans(VaultEvent::Withdrawn, GatewayError::empty());
        let (status, body) = post_json(&router, "/history/refresh", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.error, "Error loading history");
        assert_eq!(state.client.history().len(), 1);
    }

    #[tokio::test]
    async fn refresh_picks_up_external_changes() {
        let (ledger, _state, router) = setup().await;
        ledger.set_balance(ALICE, U256::from(2_000_000_000_000_000_000u64));

        let (status, body) = post_json(&router, "/refresh", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);
        let view: ClientView = serde_json::from_slice(&body).unwrap();
        assert_eq!(view.balance.as_deref(), Some("2"));
    }
}

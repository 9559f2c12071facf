//! REST API server for CoinLedger
//!
//! Exposes the ledger engine over HTTP. Every body is JSON carrying an `ok`
//! flag; failures answer `{"ok": false, "error": message}`.

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::ProposedBlock;
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::transaction::validation::parse_amount;
use crate::transaction::TransactionRequest;

/// Shared handler state: the ledger plus request accounting.
#[derive(Clone)]
pub struct Node {
    pub ledger: Arc<Ledger>,
    api_stats: Arc<RwLock<ApiStats>>,
}

/// API statistics and monitoring
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    transactions_accepted: u64,
    blocks_accepted: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl Node {
    pub fn new(ledger: Ledger) -> Self {
        Self::new_shared(Arc::new(ledger))
    }

    pub fn new_shared(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }

    /// Get API statistics
    pub async fn get_stats(&self) -> ApiStatsResponse {
        let stats = self.api_stats.read().await;
        let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);

        ApiStatsResponse {
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            transactions_accepted: stats.transactions_accepted,
            blocks_accepted: stats.blocks_accepted,
            uptime_seconds: uptime,
        }
    }

    /// Runs a synchronous ledger call on the blocking pool.
    async fn with_ledger<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Ledger) -> crate::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let ledger = self.ledger.clone();
        tokio::task::spawn_blocking(move || f(&ledger))
            .await
            .map_err(|e| ApiError::InternalError(format!("Ledger task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    LedgerError(ChainError),
    InvalidInput(String),
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::LedgerError(e) if !e.is_recoverable() => {
                tracing::error!("Store failure while serving request: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::LedgerError(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { ok: false, error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::LedgerError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(format!("invalid request body: {}", rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transactions_accepted: u64,
    pub blocks_accepted: u64,
    pub uptime_seconds: u64,
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

// ============================================================================
// Middleware
// ============================================================================

/// Request statistics middleware
async fn stats_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    let mut stats = node.api_stats.write().await;
    stats.record_request(success);

    response
}

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Address endpoints
        .route("/address/:address", get(get_address))
        .route("/addresses", get(list_addresses))
        // Transaction endpoints
        .route("/transaction", post(create_transaction))
        .route("/transaction/:id", get(get_transaction))
        .route("/transactions", get(list_transactions))
        .route("/transactions/:address", get(list_address_transactions))
        // Chain endpoints
        .route("/block", post(submit_block).get(get_latest_block))
        .route("/blocks", get(list_blocks))
        .route("/supply", get(get_supply))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so we always record timing
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(node.clone(), stats_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn run_api_server<F>(
    node: Arc<Node>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_api_router(node);

    tracing::info!("API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_address(State(node): State<Arc<Node>>, Path(address): Path<String>) -> ApiResult {
    let balance = node.with_ledger(move |l| l.get_address(&address)).await?;
    Ok(Json(json!({ "ok": true, "data": balance })))
}

async fn list_addresses(State(node): State<Arc<Node>>) -> ApiResult {
    let addresses = node.with_ledger(|l| l.list_addresses()).await?;
    Ok(Json(json!({ "ok": true, "addresses": addresses })))
}

async fn create_transaction(
    State(node): State<Arc<Node>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let amount = parse_amount(request.amount)?;

    let tx = node
        .with_ledger(move |l| l.create_transaction(&request.pkey, &request.address, amount))
        .await?;

    node.api_stats.write().await.transactions_accepted += 1;

    Ok(Json(json!({ "ok": true, "transaction": tx })))
}

async fn get_transaction(State(node): State<Arc<Node>>, Path(id): Path<String>) -> ApiResult {
    let not_found = || ApiError::NotFound("transaction not found".to_string());

    let id: u64 = id.parse().map_err(|_| not_found())?;
    let tx = node
        .with_ledger(move |l| l.get_transaction(id))
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(json!({ "ok": true, "transaction": tx })))
}

async fn list_transactions(State(node): State<Arc<Node>>) -> ApiResult {
    let transactions = node.with_ledger(|l| l.list_transactions()).await?;
    Ok(Json(json!({ "ok": true, "transactions": transactions })))
}

async fn list_address_transactions(
    State(node): State<Arc<Node>>,
    Path(address): Path<String>,
) -> ApiResult {
    let transactions = node
        .with_ledger(move |l| l.list_address_transactions(&address))
        .await?;
    Ok(Json(json!({ "ok": true, "transactions": transactions })))
}

async fn submit_block(
    State(node): State<Arc<Node>>,
    payload: Result<Json<ProposedBlock>, JsonRejection>,
) -> ApiResult {
    let Json(proposed) = payload?;

    node.with_ledger(move |l| l.submit_block(&proposed)).await?;

    node.api_stats.write().await.blocks_accepted += 1;

    Ok(Json(json!({ "ok": true })))
}

async fn get_latest_block(State(node): State<Arc<Node>>) -> ApiResult {
    let tip = node.with_ledger(|l| l.latest_block_hash()).await?;
    Ok(Json(json!({ "ok": true, "block": tip })))
}

async fn list_blocks(State(node): State<Arc<Node>>) -> ApiResult {
    let blocks = node.with_ledger(|l| l.list_blocks()).await?;
    Ok(Json(json!({ "ok": true, "blocks": blocks })))
}

async fn get_supply(State(node): State<Arc<Node>>) -> ApiResult {
    let supply = node.with_ledger(|l| l.total_supply()).await?;
    Ok(Json(json!({ "ok": true, "totalSupply": supply })))
}

async fn get_api_stats(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let stats = node.get_stats().await;
    Json(stats)
}

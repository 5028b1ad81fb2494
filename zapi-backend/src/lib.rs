//! zapi-backend
//!
//! Axum REST façade over a Zcash node. Every `/api/zcash` route is gated by
//! the `x-api-key` header and answers with a `{"success": .., "data": ..}`
//! envelope. Shielded sends go through the operation tracker in `zapi-rpc`.

pub mod auth;
pub mod config;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use zapi_rpc::{
    balance::ACCOUNT_REQUIRED,
    client::{
        DEFAULT_BALANCE_MINCONF, DEFAULT_BLOCK_VERBOSITY, DEFAULT_FEE_BLOCKS, DEFAULT_LIST_COUNT,
        DEFAULT_UNSPENT_MAXCONF,
    },
    poll::{MAX_POLL_ATTEMPTS, MIN_POLL_INTERVAL},
    AccountBalance, BalanceAggregator, MonitorHandle, Operation, OperationId, OperationPoller,
    OperationSubmitter, PollConfig, SendRequest, WalletMonitor, WalletSnapshot, ZapiError,
    ZcashRpc,
};

pub use auth::{ApiKeyLayer, HEADER_API_KEY};
pub use config::{MonitorConfig, ServerConfig};

const CODE_VALIDATION: &str = "VALIDATION_ERROR";
const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
const CODE_MONITOR_DISABLED: &str = "MONITOR_DISABLED";
const UNAUTHORIZED_MESSAGE: &str = "Unauthorized: Invalid or missing API key";

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct AppState {
    rpc: ZcashRpc,
    submitter: OperationSubmitter,
    poller: OperationPoller,
    balances: BalanceAggregator,
    api_key: Arc<str>,
    monitor: Option<Arc<MonitorHandle>>,
}

impl AppState {
    pub fn new(rpc: ZcashRpc, poll: PollConfig, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            submitter: OperationSubmitter::new(rpc.clone()),
            poller: OperationPoller::new(rpc.clone(), poll),
            balances: BalanceAggregator::new(rpc.clone()),
            rpc,
            api_key: api_key.into(),
            monitor: None,
        }
    }

    /// Expose a running wallet monitor on `/wallet/snapshot`.
    pub fn with_monitor(mut self, handle: MonitorHandle) -> Self {
        self.monitor = Some(Arc::new(handle));
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, CODE_VALIDATION, message)
    }

    pub(crate) fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, CODE_UNAUTHORIZED, UNAUTHORIZED_MESSAGE)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ZapiError> for ApiError {
    fn from(err: ZapiError) -> Self {
        let status = match &err {
            ZapiError::Validation(_) => StatusCode::BAD_REQUEST,
            ZapiError::NotFound(_) => StatusCode::NOT_FOUND,
            ZapiError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ZapiError::Rpc { .. }
            | ZapiError::Network(_)
            | ZapiError::Poll(_)
            | ZapiError::OperationFailed { .. } => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            warn!(error_code = err.code(), error = %err, "node request failed");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    error_code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message,
            error_code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

type ApiResult<T = Value> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

/// Numeric query value, or `default` when absent or unparseable.
fn query_or<T: FromStr>(params: &HashMap<String, String>, key: &str, default: T) -> T {
    params
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// JSON body where an empty body means all fields absent.
fn lenient_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {}", e)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let rpc = ZcashRpc::http(config.rpc.clone())?;
    let mut state = AppState::new(rpc.clone(), config.poll, config.api_key.as_str());

    if let Some(monitor) = &config.monitor {
        let handle = WalletMonitor::new(rpc, monitor.account, monitor.interval).spawn();
        info!(
            account = monitor.account,
            interval_secs = monitor.interval.as_secs(),
            "wallet monitor started"
        );
        state = state.with_monitor(handle);
    }
    if config.api_key.is_empty() {
        warn!("API_KEY is not set; every /api/zcash request will be rejected");
    }

    let monitor = state.monitor.clone();
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, rpc_url = %config.rpc.url, "zapi-backend listening");
    let served = axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Some(monitor) = monitor {
        monitor.shutdown();
        info!("wallet monitor stopped");
    }
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Blockchain
        .route("/blockchain/info", get(blockchain_info))
        .route("/blockchain/blockcount", get(block_count))
        .route("/blockchain/blockhash/:height", get(block_hash))
        .route("/blockchain/block/:blockhash", get(block))
        // Wallet
        .route("/wallet/info", get(wallet_info))
        .route("/wallet/balance", get(wallet_balance))
        .route("/wallet/newaccount", post(new_account))
        .route("/wallet/getaddressforaccount", post(address_for_account))
        .route("/wallet/getbalanceforaccount", post(balance_for_account))
        .route("/wallet/unspent", get(list_unspent))
        .route("/wallet/listaccounts", get(list_accounts))
        .route("/wallet/listaddresses", get(list_addresses))
        .route("/wallet/snapshot", get(wallet_snapshot))
        // Transactions
        .route("/transaction/:txid", get(transaction))
        .route("/transactions", get(list_transactions))
        .route("/transaction/:txid/raw", get(raw_transaction))
        .route("/transaction/send", post(send_to_address))
        .route("/transaction/z_sendmany", post(z_sendmany))
        .route("/transaction/z_getoperationstatus", post(operation_status))
        .route("/transaction/z_getoperationresult", post(operation_result))
        .route("/transaction/z_waitoperation", post(wait_operation))
        // Addresses, network, mining, fees
        .route("/address/validate/:address", get(validate_address))
        .route("/network/info", get(network_info))
        .route("/network/connections", get(connection_count))
        .route("/mining/info", get(mining_info))
        .route("/fee/estimate", get(estimate_fee))
        .route_layer(ApiKeyLayer::new(state.api_key.clone()));

    Router::new()
        .route("/health", get(health))
        .nest("/api/zcash", api)
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "zapi-backend"
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - BLOCKCHAIN
// ═══════════════════════════════════════════════════════════════════════════════

async fn blockchain_info(State(state): State<AppState>) -> ApiResult {
    ok(state.rpc.blockchain_info().await?)
}

async fn block_count(State(state): State<AppState>) -> ApiResult {
    let block_count = state.rpc.block_count().await?;
    ok(json!({ "blockCount": block_count }))
}

async fn block_hash(State(state): State<AppState>, Path(height): Path<String>) -> ApiResult {
    let height: u64 = height
        .parse()
        .map_err(|_| ApiError::bad_request("Valid block height is required"))?;
    let blockhash = state.rpc.block_hash(height).await?;
    ok(json!({ "height": height, "blockhash": blockhash }))
}

async fn block(
    State(state): State<AppState>,
    Path(blockhash): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let verbosity = query_or(&params, "verbosity", DEFAULT_BLOCK_VERBOSITY);
    ok(state.rpc.block(&blockhash, verbosity).await?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - WALLET
// ═══════════════════════════════════════════════════════════════════════════════

async fn wallet_info(State(state): State<AppState>) -> ApiResult {
    ok(state.rpc.wallet_info().await?)
}

async fn wallet_balance(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let min_confirmations = query_or(&params, "minConfirmations", DEFAULT_BALANCE_MINCONF);
    let balance = state.rpc.balance(min_confirmations).await?;
    ok(json!({ "balance": balance, "minConfirmations": min_confirmations }))
}

async fn new_account(State(state): State<AppState>) -> ApiResult {
    let account = state.rpc.new_account().await?.account;
    let address = state.rpc.address_for_account(account, None).await?;
    info!(account, address = %address.address, "created wallet account");
    ok(json!({
        "account": account,
        "address": address.address,
        "receiverTypes": address.receiver_types
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressForAccountRequest {
    account: Option<u32>,
    diversifier_index: Option<u64>,
}

async fn address_for_account(
    State(state): State<AppState>,
    body: Result<Json<AddressForAccountRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let account = req.account.ok_or_else(|| ApiError::bad_request(ACCOUNT_REQUIRED))?;
    let address = state
        .rpc
        .address_for_account(account, req.diversifier_index)
        .await?;
    ok(json!({
        "account": account,
        "address": address.address,
        "receiverTypes": address.receiver_types
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceForAccountRequest {
    account: Option<u32>,
    minconf: Option<u32>,
    as_of_height: Option<u32>,
}

#[derive(Serialize)]
struct BalanceForAccountResponse {
    #[serde(flatten)]
    balance: AccountBalance,
    total_zat: u64,
    total_zec: f64,
}

async fn balance_for_account(
    State(state): State<AppState>,
    body: Result<Json<BalanceForAccountRequest>, JsonRejection>,
) -> ApiResult<BalanceForAccountResponse> {
    let Json(req) = body?;
    let balance = state
        .balances
        .get_total(req.account, req.minconf, req.as_of_height)
        .await?;
    ok(BalanceForAccountResponse {
        total_zat: balance.total_zat(),
        total_zec: balance.total_zec(),
        balance,
    })
}

async fn list_unspent(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let min = query_or(&params, "minConfirmations", DEFAULT_BALANCE_MINCONF);
    let max = query_or(&params, "maxConfirmations", DEFAULT_UNSPENT_MAXCONF);
    ok(state.rpc.list_unspent(min, max).await?)
}

async fn list_accounts(State(state): State<AppState>) -> ApiResult {
    ok(state.rpc.list_accounts().await?)
}

async fn list_addresses(State(state): State<AppState>) -> ApiResult {
    ok(state.rpc.list_addresses().await?)
}

async fn wallet_snapshot(State(state): State<AppState>) -> ApiResult<Option<WalletSnapshot>> {
    let monitor = state.monitor.as_ref().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            CODE_MONITOR_DISABLED,
            "wallet monitor is not enabled",
        )
    })?;
    ok(monitor.snapshot().await)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - TRANSACTIONS
// ═══════════════════════════════════════════════════════════════════════════════

async fn transaction(State(state): State<AppState>, Path(txid): Path<String>) -> ApiResult {
    ok(state.rpc.transaction(&txid).await?)
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let count = query_or(&params, "count", DEFAULT_LIST_COUNT);
    let skip = query_or(&params, "skip", 0);
    ok(state.rpc.list_transactions(count, skip).await?)
}

async fn raw_transaction(
    State(state): State<AppState>,
    Path(txid): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let verbose = params.get("verbose").map_or(false, |v| v == "true");
    ok(state.rpc.raw_transaction(&txid, verbose).await?)
}

#[derive(Deserialize)]
struct SendToAddressRequest {
    address: Option<String>,
    amount: Option<f64>,
    comment: Option<String>,
}

async fn send_to_address(
    State(state): State<AppState>,
    body: Result<Json<SendToAddressRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let (address, amount) = match (req.address, req.amount) {
        (Some(address), Some(amount)) if !address.is_empty() && amount != 0.0 => (address, amount),
        _ => return Err(ApiError::bad_request("Address and amount are required")),
    };
    let txid = state
        .rpc
        .send_to_address(&address, amount, req.comment.as_deref().unwrap_or(""))
        .await?;
    info!(%txid, "sendtoaddress submitted");
    ok(json!({ "txid": txid }))
}

async fn z_sendmany(
    State(state): State<AppState>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let operation_id = state.submitter.submit(&request).await?;
    ok(json!({ "operationId": operation_id }))
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationIdsRequest {
    operation_ids: Option<Value>,
}

impl OperationIdsRequest {
    fn ids(self) -> Result<Option<Vec<OperationId>>, ApiError> {
        match self.operation_ids {
            None | Some(Value::Null) => Ok(None),
            Some(value @ Value::Array(_)) => serde_json::from_value(value)
                .map(Some)
                .map_err(|_| ApiError::bad_request("operationIds must be an array of strings")),
            Some(_) => Err(ApiError::bad_request("operationIds must be an array")),
        }
    }
}

async fn operation_status(State(state): State<AppState>, body: Bytes) -> ApiResult<Vec<Operation>> {
    let ids = lenient_body::<OperationIdsRequest>(&body)?.ids()?;
    ok(state.rpc.operation_status(ids.as_deref()).await?)
}

async fn operation_result(State(state): State<AppState>, body: Bytes) -> ApiResult<Vec<Operation>> {
    let ids = lenient_body::<OperationIdsRequest>(&body)?.ids()?;
    ok(state.rpc.operation_result(ids.as_deref()).await?)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WaitOperationRequest {
    operation_id: Option<String>,
    poll_interval_ms: Option<u64>,
    max_attempts: Option<u32>,
}

async fn wait_operation(
    State(state): State<AppState>,
    body: Result<Json<WaitOperationRequest>, JsonRejection>,
) -> ApiResult<Operation> {
    let Json(req) = body?;
    let id = match req.operation_id {
        Some(id) if !id.is_empty() => OperationId::new(id),
        _ => return Err(ApiError::bad_request("operationId is required")),
    };

    let mut config = state.poller.config();
    if let Some(ms) = req.poll_interval_ms {
        let interval = Duration::from_millis(ms);
        if interval < MIN_POLL_INTERVAL {
            return Err(ApiError::bad_request(format!(
                "pollIntervalMs must be at least {}",
                MIN_POLL_INTERVAL.as_millis()
            )));
        }
        config.interval = interval;
    }
    if let Some(attempts) = req.max_attempts {
        if attempts == 0 || attempts > MAX_POLL_ATTEMPTS {
            return Err(ApiError::bad_request(format!(
                "maxAttempts must be between 1 and {MAX_POLL_ATTEMPTS}"
            )));
        }
        config.max_attempts = attempts;
    }

    ok(state.poller.await_completion_with(&id, config).await?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - ADDRESS, NETWORK, MINING, FEES
// ═══════════════════════════════════════════════════════════════════════════════

async fn validate_address(State(state): State<AppState>, Path(address): Path<String>) -> ApiResult {
    ok(state.rpc.validate_address(&address).await?)
}

async fn network_info(State(state): State<AppState>) -> ApiResult {
    ok(state.rpc.network_info().await?)
}

async fn connection_count(State(state): State<AppState>) -> ApiResult {
    let connections = state.rpc.connection_count().await?;
    ok(json!({ "connections": connections }))
}

async fn mining_info(State(state): State<AppState>) -> ApiResult {
    ok(state.rpc.mining_info().await?)
}

async fn estimate_fee(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let nblocks = query_or(&params, "nblocks", DEFAULT_FEE_BLOCKS);
    let fee = state.rpc.estimate_fee(nblocks).await?;
    ok(json!({ "fee": fee, "nblocks": nblocks }))
}

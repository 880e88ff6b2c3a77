use crate::core::{ApplyOutcome, Block, Transaction};
use crate::error::{BlockchainError, ErrorClass, Result};
use crate::node::{NodeService, NodeStatus};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{debug, error, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;

/// HTTP error with the plain-text body sent back to the client
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> ApiError {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    /// Map a core error, prefixing rejections with what was rejected
    fn from_core(what: &str, err: BlockchainError) -> ApiError {
        match err.class() {
            ErrorClass::Malformed => ApiError::bad_request(format!("{err}\n")),
            ErrorClass::Rejected => ApiError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: format!("{what} is invalid: {err}\n"),
            },
            ErrorClass::Internal => {
                error!("{what}: {err}");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: format!("{err}\n"),
                }
            }
        }
    }
}

impl From<BlockchainError> for ApiError {
    fn from(err: BlockchainError) -> Self {
        ApiError::from_core("Request", err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct NumQuery {
    num: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PeerQuery {
    url: Option<String>,
}

/// Every route of the node
pub fn build_router(service: NodeService) -> Router {
    Router::new()
        .route("/block/", get(get_blocks).post(post_block))
        .route("/block", get(get_blocks).post(post_block))
        .route("/block/:hash", get(get_block_path))
        .route(
            "/pending_transaction",
            get(get_pending_transactions).post(post_transaction),
        )
        .route("/peers", get(get_peers))
        .route("/ping", get(get_ping))
        .route("/status", get(get_status))
        .with_state(service)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(service: NodeService, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
    info!("Listening on http://{addr}");
    axum::serve(listener, build_router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {e}");
    }
    info!("Shutting down");
}

fn parse_json<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    serde_json::from_str(body).map_err(|e| ApiError::bad_request(format!("JSON is invalid: {e}\n")))
}

/// Validation runs on the blocking pool; it verifies signatures under the
/// write lock.
async fn run_blocking<T, F>(work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ApiResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!("Request task failed: {e}");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error\n".to_string(),
        }
    })?
}

async fn get_blocks(State(service): State<NodeService>) -> ApiResult<Json<Vec<Block>>> {
    Ok(Json(service.list_blocks()?))
}

async fn post_block(State(service): State<NodeService>, body: String) -> ApiResult<String> {
    let block: Block = parse_json(&body)?;
    let hash = block.compute_hash();
    let outcome = run_blocking(move || {
        service
            .submit_block(block)
            .map_err(|e| ApiError::from_core(&format!("Block {hash}"), e))
    })
    .await?;
    Ok(describe_outcome(&outcome))
}

fn describe_outcome(outcome: &ApplyOutcome) -> String {
    match outcome {
        ApplyOutcome::AlreadyKnown => "Block already known\n".to_string(),
        ApplyOutcome::StoredFork { height } => format!("Block stored on a side branch at height {height}\n"),
        ApplyOutcome::Extended { height } => format!("Block extends the chain to height {height}\n"),
        ApplyOutcome::Reorganized { height } => format!("Block reorganized the chain to height {height}\n"),
    }
}

/// `/block/genesis`, `/block/head` and `/block/{hash}?num=N`
async fn get_block_path(
    State(service): State<NodeService>,
    Path(segment): Path<String>,
    Query(query): Query<NumQuery>,
) -> ApiResult<Response> {
    match segment.as_str() {
        "genesis" => Ok(Json(service.genesis_block()?).into_response()),
        "head" => Ok(service.head_hash()?.into_response()),
        hash => {
            let num = parse_num(query.num.as_deref())?;
            let hash = parse_hash(hash)?;
            Ok(Json(service.blocks_from(&hash, num)?).into_response())
        }
    }
}

fn parse_num(num: Option<&str>) -> ApiResult<usize> {
    let raw = num.unwrap_or("");
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(usize::try_from(n).unwrap_or(usize::MAX)),
        Ok(n) => Err(ApiError::bad_request(format!(
            "Incorrect number of blocks requested: {n}\n"
        ))),
        Err(e) => Err(ApiError::bad_request(format!(
            "Incorrect number of blocks requested: {raw:?}, {e}\n"
        ))),
    }
}

/// Block hashes are 64 hex digits; the ledger keys them in lowercase
fn parse_hash(hash: &str) -> ApiResult<String> {
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiError::bad_request(format!("Invalid block hash: {hash}\n")));
    }
    Ok(hash.to_ascii_lowercase())
}

async fn get_pending_transactions(
    State(service): State<NodeService>,
) -> ApiResult<Json<Vec<Transaction>>> {
    Ok(Json(service.pending_transactions()?))
}

async fn post_transaction(State(service): State<NodeService>, body: String) -> ApiResult<String> {
    let tx: Transaction = parse_json(&body)?;
    let hash = tx.hash();
    run_blocking(move || {
        service
            .submit_transaction(tx)
            .map(|hash| format!("{hash}\n"))
            .map_err(|e| ApiError::from_core(&format!("Transaction {hash}"), e))
    })
    .await
}

/// Peer list. A caller passing `?url=` announces itself and is added when
/// the address is valid.
async fn get_peers(
    State(service): State<NodeService>,
    Query(query): Query<PeerQuery>,
) -> Json<Vec<String>> {
    if let Some(url) = query.url {
        if let Err(e) = service.add_peer(&url) {
            debug!("Not adding peer {url:?}: {e}");
        }
    }
    Json(service.peers())
}

async fn get_ping(State(service): State<NodeService>) -> ApiResult<String> {
    Ok(service.status_line()?)
}

async fn get_status(State(service): State<NodeService>) -> ApiResult<Json<NodeStatus>> {
    Ok(Json(service.status()?))
}

//! REST API server for the coinshop engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /api/auth` - Authenticate (registers unknown usernames), returns a bearer token
//! - `GET /api/buy/{item}` - Buy one unit of a catalog item
//! - `POST /api/sendCoin` - Send coins to another user
//! - `GET /api/info` - Balance, inventory, and transfer history
//! - `GET /api/healthcheck` - Liveness probe
//!
//! ## Example Usage
//!
//! ```bash
//! # Authenticate (first login registers the user)
//! TOKEN=$(curl -s -X POST http://localhost:3000/api/auth \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "alice", "password": "s3cret"}' | jq -r .token)
//!
//! # Buy an item
//! curl -H "Authorization: $TOKEN" http://localhost:3000/api/buy/t-shirt
//!
//! # Send coins
//! curl -X POST http://localhost:3000/api/sendCoin \
//!   -H "Authorization: $TOKEN" -H "Content-Type: application/json" \
//!   -d '{"toUser": "bob", "amount": "300"}'
//!
//! # Account info
//! curl -H "Authorization: $TOKEN" http://localhost:3000/api/info
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    extract::rejection::JsonRejection,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use coinshop_rs::{Authenticator, Engine, LedgerError, LedgerStore, UserId, UserInfo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Coinshop REST API server.
#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Serve the coinshop ledger over HTTP", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "SERVER_PORT", default_value_t = 3000)]
    port: u16,

    /// Catalog seed CSV (name,price)
    #[arg(long, env = "ITEMS_FILE", default_value = "data/items.csv")]
    items: PathBuf,

    /// Bearer token lifetime, in minutes
    #[arg(long, env = "TOKEN_TTL_MINUTES", default_value_t = 50)]
    token_ttl_minutes: u64,
}

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Request body for sending coins.
///
/// `amount` is bound structurally only; zero and negative values pass this
/// stage and are rejected as a business-rule failure further down.
#[derive(Debug, Deserialize)]
pub struct SendCoinRequest {
    #[serde(rename = "toUser")]
    pub to_user: String,
    pub amount: Decimal,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// === Application State ===

/// Shared application state: the engine and its authenticator.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub auth: Arc<Authenticator>,
}

// === Error Handling ===

/// Wrapper for converting `LedgerError` into HTTP responses.
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError(LedgerError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::Validation(_)
            | LedgerError::ItemNotFound
            | LedgerError::IncorrectReceiver
            | LedgerError::InsufficientFunds
            | LedgerError::InvalidAmount => StatusCode::BAD_REQUEST,
            LedgerError::Unauthorized | LedgerError::IncorrectPassword => {
                StatusCode::UNAUTHORIZED
            }
            LedgerError::PurchaseFailed
            | LedgerError::TransferFailed
            | LedgerError::LookupFailed
            | LedgerError::RegistrationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Resolves the bearer token carried verbatim in the Authorization header.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserId, AppError> {
    let token = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .ok_or(LedgerError::Unauthorized)?;
    Ok(state.auth.authenticate(token)?)
}

// === Handlers ===

/// POST /api/auth - Authenticate, registering unknown usernames.
async fn auth_handler(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(request) = payload?;
    let token = state.auth.login(&request.username, &request.password)?;
    Ok(Json(TokenResponse { token }))
}

/// GET /api/buy/{item} - Buy one unit of an item.
async fn buy_handler(
    State(state): State<AppState>,
    Path(item): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let user_id = authenticate(&state, &headers)?;
    state.engine.buy_item(user_id, &item)?;
    Ok(StatusCode::OK)
}

/// POST /api/sendCoin - Send coins to another user.
async fn send_coin_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SendCoinRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let user_id = authenticate(&state, &headers)?;
    let Json(request) = payload?;
    state
        .engine
        .send_coin(user_id, &request.to_user, request.amount)?;
    Ok(StatusCode::OK)
}

/// GET /api/info - Balance, inventory, and transfer history.
async fn info_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserInfo>, AppError> {
    let user_id = authenticate(&state, &headers)?;
    let info = state.engine.info(user_id)?;
    Ok(Json(info))
}

/// GET /api/healthcheck - Liveness probe.
async fn healthcheck() -> StatusCode {
    StatusCode::OK
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthcheck", get(healthcheck))
        .route("/api/auth", post(auth_handler))
        .route("/api/buy/{item}", get(buy_handler))
        .route("/api/sendCoin", post(send_coin_handler))
        .route("/api/info", get(info_handler))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = Args::parse();

    let store = Arc::new(LedgerStore::new());
    let file = File::open(&args.items)
        .unwrap_or_else(|e| panic!("could not open catalog seed '{}': {e}", args.items.display()));
    let seeded = store
        .catalog()
        .load_csv(BufReader::new(file))
        .unwrap_or_else(|e| panic!("could not load catalog seed: {e}"));

    let state = AppState {
        engine: Engine::new(Arc::clone(&store)),
        auth: Arc::new(Authenticator::with_ttl(
            store,
            Duration::from_secs(args.token_ttl_minutes * 60),
        )),
    };

    let app = create_router(state);

    let listener = TcpListener::bind(("127.0.0.1", args.port)).await.unwrap();
    println!(
        "Coinshop API server running on http://127.0.0.1:{} ({seeded} items seeded)",
        args.port
    );
    println!();
    println!("Endpoints:");
    println!("  POST /api/auth        - Authenticate / register");
    println!("  GET  /api/buy/{{item}}  - Buy a catalog item");
    println!("  POST /api/sendCoin    - Send coins to another user");
    println!("  GET  /api/info        - Balance, inventory, history");
    println!("  GET  /api/healthcheck - Liveness probe");

    axum::serve(listener, app).await.unwrap();
}

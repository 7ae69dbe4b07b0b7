//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the ledger over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! Mutating endpoints act on behalf of the party named in the
//! `x-caller-id` header. The node trusts that header: authentication is the
//! job of whatever sits in front of it (gateway, mTLS terminator, ...).
//!
//! ## Endpoints
//!
//! | Method | Path                      | Description                           |
//! |--------|---------------------------|---------------------------------------|
//! | GET    | `/health`                 | Liveness probe                        |
//! | POST   | `/lines`                  | Open a line with a counterparty       |
//! | PUT    | `/lines/limit`            | Change the ceiling the caller extends |
//! | POST   | `/lines/close`            | Close a settled line                  |
//! | POST   | `/payments`               | Net a payment from the caller         |
//! | GET    | `/lines/:a/:b`            | Line between two parties              |
//! | GET    | `/parties/:party/lines`   | Lines of one party, paginated         |
//! | GET    | `/credit/:from/:to`       | What `from` can currently pay `to`    |
//! | GET    | `/ws`                     | WebSocket feed of ledger events       |
//!
//! Errors are JSON `{ "error": <code>, "message": <text> }`.

use axum::{
    async_trait,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use trustline_protocol::identity::{canonicalize, IdentityError, PairKey, PartyId};
use trustline_protocol::ledger::{
    Amount, BroadcastSink, CreditAvailability, CreditLine, CreditLineRegistry, LedgerError,
    Principal,
};

use crate::metrics::SharedMetrics;

/// Header carrying the authenticated caller's party id.
pub const CALLER_HEADER: &str = "x-caller-id";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The ledger.
    pub registry: Arc<CreditLineRegistry>,
    /// The sink the registry emits into; `/ws` subscribers hang off it.
    pub events: BroadcastSink,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/lines", post(create_line_handler))
        .route("/lines/limit", put(set_limit_handler))
        .route("/lines/close", post(close_line_handler))
        .route("/lines/:a/:b", get(get_line_handler))
        .route("/payments", post(pay_handler))
        .route("/parties/:party/lines", get(lines_for_handler))
        .route("/credit/:from/:to", get(available_credit_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// The ledger refused the operation.
    Ledger(LedgerError),
    /// No usable `x-caller-id` header on a mutating request.
    MissingCaller,
    /// `start_after` was not a pair key.
    InvalidCursor(String),
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::Ledger(LedgerError::InvalidParty(err))
    }
}

/// HTTP status for a ledger error.
fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        LedgerError::AlreadyExists(_)
        | LedgerError::NotActive(_)
        | LedgerError::BalanceNotZero { .. } => StatusCode::CONFLICT,
        LedgerError::InvalidParty(_)
        | LedgerError::InvalidAmount
        | LedgerError::InvalidLimit { .. }
        | LedgerError::LimitExceeded { .. }
        | LedgerError::ArithmeticOverflow => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Ledger(err) => (ledger_status(err), err.code(), err.to_string()),
            ApiError::MissingCaller => (
                StatusCode::UNAUTHORIZED,
                "missing_caller",
                format!("a valid {CALLER_HEADER} header is required"),
            ),
            ApiError::InvalidCursor(raw) => (
                StatusCode::BAD_REQUEST,
                "invalid_cursor",
                format!("start_after is not a pair key: {raw}"),
            ),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code, "request failed: {}", message);
        }

        let body = ErrorResponse {
            error: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Caller Extraction
// ---------------------------------------------------------------------------

/// The principal a mutating request acts for.
pub struct Caller(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::MissingCaller)?;
        let id = PartyId::new(raw.trim()).map_err(|_| ApiError::MissingCaller)?;
        Ok(Caller(Principal::authenticated(id)))
    }
}

fn parse_party(raw: &str) -> ApiResult<PartyId> {
    Ok(PartyId::new(raw)?)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /lines`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateLineRequest {
    /// The other party.
    pub counterparty: String,
    /// Ceiling the caller extends (bounds what the caller may owe).
    pub limit_out: Amount,
    /// Ceiling assigned to the counterparty.
    pub limit_in: Amount,
}

/// Body of `PUT /lines/limit`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetLimitRequest {
    /// The other party.
    pub counterparty: String,
    /// New ceiling the caller extends.
    pub new_limit: Amount,
}

/// Body of `POST /lines/close`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CloseLineRequest {
    /// The other party.
    pub counterparty: String,
}

/// Body of `POST /payments`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Paying party. Must match the caller.
    pub sender: String,
    /// Receiving party.
    pub receiver: String,
    /// Strictly positive amount.
    pub amount: Amount,
}

/// Response of `POST /payments`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    /// Line the payment was netted into.
    pub pair: PairKey,
    /// Resulting unsigned balance.
    pub magnitude: Amount,
    /// Resulting polarity.
    pub owed_by_low: bool,
    /// Who owes after the payment, if anyone.
    pub debtor: Option<PartyId>,
}

/// Query string of `GET /parties/:party/lines`.
#[derive(Debug, Default, Deserialize)]
pub struct LinesQuery {
    /// Exclusive cursor: the pair key of the last line already seen.
    pub start_after: Option<String>,
    /// Page size, clamped by the ledger configuration.
    pub limit: Option<usize>,
}

/// Response of `GET /parties/:party/lines`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LinesPage {
    /// Lines in pair-key order.
    pub lines: Vec<CreditLine>,
    /// Cursor for the next page; absent when this page was short.
    pub next_start_after: Option<PairKey>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// `POST /lines`: opens a line between the caller and `counterparty`.
async fn create_line_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateLineRequest>,
) -> ApiResult<impl IntoResponse> {
    let _timer = state
        .metrics
        .operation_latency_seconds
        .with_label_values(&["create"])
        .start_timer();

    let counterparty = parse_party(&req.counterparty)?;
    state
        .registry
        .create(&caller, &counterparty, req.limit_out, req.limit_in)?;
    state.metrics.lines_created_total.inc();
    state.metrics.active_lines.inc();

    let line = state.registry.get(caller.id(), &counterparty)?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// `PUT /lines/limit`: changes the ceiling the caller extends.
async fn set_limit_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<SetLimitRequest>,
) -> ApiResult<Json<CreditLine>> {
    let _timer = state
        .metrics
        .operation_latency_seconds
        .with_label_values(&["set_limit"])
        .start_timer();

    let counterparty = parse_party(&req.counterparty)?;
    state
        .registry
        .set_limit(&caller, &counterparty, req.new_limit)?;
    state.metrics.limit_updates_total.inc();

    Ok(Json(state.registry.get(caller.id(), &counterparty)?))
}

/// `POST /lines/close`: deactivates a settled line.
async fn close_line_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CloseLineRequest>,
) -> ApiResult<Json<CreditLine>> {
    let _timer = state
        .metrics
        .operation_latency_seconds
        .with_label_values(&["close"])
        .start_timer();

    let counterparty = parse_party(&req.counterparty)?;
    state.registry.close(&caller, &counterparty)?;
    state.metrics.lines_closed_total.inc();
    state.metrics.active_lines.dec();

    Ok(Json(state.registry.get(caller.id(), &counterparty)?))
}

/// `POST /payments`: nets a payment from the caller.
async fn pay_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<PaymentRequest>,
) -> ApiResult<Json<PaymentResponse>> {
    let _timer = state
        .metrics
        .operation_latency_seconds
        .with_label_values(&["pay"])
        .start_timer();

    let result = pay(&state, &caller, &req);
    match &result {
        Ok(_) => state.metrics.payments_accepted_total.inc(),
        Err(ApiError::Ledger(err)) => state
            .metrics
            .payments_rejected_total
            .with_label_values(&[err.code()])
            .inc(),
        Err(_) => {}
    }
    result.map(Json)
}

fn pay(state: &AppState, caller: &Principal, req: &PaymentRequest) -> ApiResult<PaymentResponse> {
    let sender = parse_party(&req.sender)?;
    let receiver = parse_party(&req.receiver)?;
    let (magnitude, owed_by_low) = state.registry.pay(caller, &sender, &receiver, req.amount)?;

    let pair = canonicalize(&sender, &receiver)?;
    let debtor = match (magnitude, owed_by_low) {
        (0, _) => None,
        (_, true) => Some(pair.low().clone()),
        (_, false) => Some(pair.high().clone()),
    };
    Ok(PaymentResponse {
        pair: pair.key(),
        magnitude,
        owed_by_low,
        debtor,
    })
}

/// `GET /lines/:a/:b`: the line between two parties, in either order.
async fn get_line_handler(
    State(state): State<AppState>,
    Path((a, b)): Path<(String, String)>,
) -> ApiResult<Json<CreditLine>> {
    let a = parse_party(&a)?;
    let b = parse_party(&b)?;
    Ok(Json(state.registry.get(&a, &b)?))
}

/// `GET /parties/:party/lines`: one page of a party's lines.
async fn lines_for_handler(
    State(state): State<AppState>,
    Path(party): Path<String>,
    Query(query): Query<LinesQuery>,
) -> ApiResult<Json<LinesPage>> {
    let party = parse_party(&party)?;
    let start_after = query
        .start_after
        .as_deref()
        .map(|raw| PairKey::from_str(raw).map_err(|_| ApiError::InvalidCursor(raw.to_string())))
        .transpose()?;

    let page_size = state.registry.config().page_size(query.limit);
    let lines = state
        .registry
        .lines_for(&party, start_after.as_ref(), query.limit)?;
    let next_start_after = if lines.len() == page_size {
        lines.last().map(|line| line.key)
    } else {
        None
    };

    Ok(Json(LinesPage {
        lines,
        next_start_after,
    }))
}

/// `GET /credit/:from/:to`: what `from` can currently pay `to`.
async fn available_credit_handler(
    State(state): State<AppState>,
    Path((from, to)): Path<(String, String)>,
) -> ApiResult<Json<CreditAvailability>> {
    let from = parse_party(&from)?;
    let to = parse_party(&to)?;
    Ok(Json(state.registry.available_credit(&from, &to)?))
}

/// `GET /ws`: WebSocket upgrade for the live event feed.
///
/// Clients receive every ledger event as a JSON envelope. The connection is
/// push-only; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding events until the client
/// disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.events.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(envelope) => {
                        let payload = match serde_json::to_string(&envelope) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

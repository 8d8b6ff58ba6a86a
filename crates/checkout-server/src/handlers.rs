//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkout_core::GatewayKind;
use checkout_engine::{
    checkout::{CheckoutView, PaySubmission, PaymentOutcome, SaleStatusView},
    fanout::{retry_event, sale_events, EventSummary},
    EngineError, LimitReason,
};
use checkout_gateways::{GatewayError, WebhookContext};

use crate::state::AppState;

/// Header carrying the authenticated seller, set by the upstream session layer
pub const SELLER_HEADER: &str = "x-seller-id";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateways: Vec<&'static str>,
    pub smtp_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<LimitReason>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.into(),
            reason: None,
        }),
    )
}

/// Map an engine error onto a status code and stable error code
fn api_error(e: EngineError) -> ApiError {
    match e {
        EngineError::SellerLimitReached { reason } => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: EngineError::SellerLimitReached { reason: reason.clone() }
                    .user_message()
                    .into(),
                code: "SELLER_LIMIT_REACHED".into(),
                reason: Some(reason),
            }),
        ),
        EngineError::NotFound { .. } => error(StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
        EngineError::InvalidRequest(_) => error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.to_string()),
        EngineError::WebhookParse(_) => error(StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", e.user_message()),
        EngineError::GatewayUnavailable(_) | EngineError::Gateway(GatewayError::UnsupportedMethod { .. }) => {
            error(StatusCode::UNPROCESSABLE_ENTITY, "GATEWAY_UNAVAILABLE", e.user_message())
        }
        EngineError::Gateway(ref g) if g.is_retryable() => {
            error(StatusCode::SERVICE_UNAVAILABLE, "GATEWAY_RETRY", e.user_message())
        }
        EngineError::Gateway(_) => error(StatusCode::BAD_GATEWAY, "GATEWAY_ERROR", e.user_message()),
        EngineError::Conflict(_) => error(StatusCode::CONFLICT, "CONFLICT", e.user_message()),
        EngineError::Core(_) | EngineError::Delivery(_) => {
            tracing::error!(error = %e, "Request failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.user_message())
        }
    }
}

fn seller_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(SELLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", "Missing seller identity"))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateways: GatewayKind::ALL.iter().map(GatewayKind::as_str).collect(),
        smtp_configured: state.smtp_configured,
    })
}

/// Resolve a public checkout
pub async fn get_checkout(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> ApiResult<CheckoutView> {
    state.admission.resolve(&public_id).await.map(Json).map_err(api_error)
}

/// Start a payment for a checkout
pub async fn pay(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
    Json(submission): Json<PaySubmission>,
) -> ApiResult<PaymentOutcome> {
    state
        .admission
        .submit(&public_id, submission)
        .await
        .map(Json)
        .map_err(api_error)
}

/// Buyer-side status poll
pub async fn sale_status(
    State(state): State<AppState>,
    Path(sale_id): Path<Uuid>,
) -> ApiResult<SaleStatusView> {
    state.admission.poll_status(sale_id).await.map(Json).map_err(api_error)
}

/// Provider webhook.
///
/// Acknowledged with an empty 200 whenever the body parses, including
/// notifications that match no sale; those are recorded as anomalies instead.
/// Per-notification outcomes only go to the log.
pub async fn provider_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let kind: GatewayKind = provider
        .parse()
        .map_err(|_| error(StatusCode::NOT_FOUND, "UNKNOWN_PROVIDER", format!("Unknown provider: {provider}")))?;

    let context = WebhookContext {
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect(),
        reference: query.reference,
    };

    let report = state
        .webhooks
        .ingest(kind, &body, &context)
        .await
        .map_err(api_error)?;
    tracing::info!(
        gateway = %kind,
        outcomes = ?report.outcomes,
        "Webhook acknowledged"
    );
    Ok(StatusCode::OK)
}

/// Outbound events of one of the seller's sales
pub async fn list_sale_events(
    State(state): State<AppState>,
    Path(sale_id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Vec<EventSummary>> {
    let seller = seller_id(&headers)?;
    sale_events(state.store.as_ref(), sale_id, seller)
        .await
        .map(Json)
        .map_err(api_error)
}

/// Requeue a failed outbound event
pub async fn retry_outbound(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<EventSummary> {
    let seller = seller_id(&headers)?;
    retry_event(state.store.as_ref(), event_id, seller)
        .await
        .map(Json)
        .map_err(api_error)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Buyer checkout
        .route("/checkout/{public_id}", get(get_checkout))
        .route("/checkout/{public_id}/pay", post(pay))
        .route("/sales/{sale_id}/status", get(sale_status))
        // Providers
        .route("/webhooks/{provider}", post(provider_webhook))
        // Seller
        .route("/sales/{sale_id}/events", get(list_sale_events))
        .route("/outbound/{event_id}/retry", post(retry_outbound))
        .with_state(state)
}

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::payment_transaction::TransactionType,
    errors::ServiceError,
    handlers::require_api_key,
    services::transactions::GatewayPaymentData,
    ApiResponse, AppState,
};

/// Inbound gateway notification: one authorization or capture event for an
/// order, carrying the raw gateway payment payload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GatewayEventRequest {
    pub order_id: Uuid,
    /// "authorization" or "capture"
    pub event_type: String,
    /// Raw gateway response; must contain at least an `id` field. Omit to
    /// fall back to the payload stored at checkout time.
    #[schema(value_type = Object)]
    pub payment: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GatewayEventResponse {
    pub order_id: Uuid,
    pub transaction_id: String,
}

pub(super) fn parse_transaction_type(raw: &str) -> Result<TransactionType, ServiceError> {
    match raw.to_ascii_lowercase().as_str() {
        "authorization" => Ok(TransactionType::Authorization),
        "capture" => Ok(TransactionType::Capture),
        "void" => Ok(TransactionType::Void),
        "refund" => Ok(TransactionType::Refund),
        other => Err(ServiceError::ValidationError(format!(
            "unknown transaction type: {other}"
        ))),
    }
}

/// Record a gateway event against an order
#[utoipa::path(
    post,
    path = "/api/v1/gateway/events",
    request_body = GatewayEventRequest,
    responses(
        (status = 200, description = "Event recorded", body = ApiResponse<GatewayEventResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Event not allowed in current order status", body = crate::errors::ErrorResponse)
    ),
    tag = "Gateway"
)]
pub async fn record_gateway_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GatewayEventRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GatewayEventResponse>>), ServiceError> {
    require_api_key(&state, &headers)?;

    let txn_type = parse_transaction_type(&request.event_type)?;
    let payment_data = request.payment.map(GatewayPaymentData);

    let transaction_id = state
        .services
        .transactions
        .record(request.order_id, txn_type, payment_data)
        .await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(GatewayEventResponse {
            order_id: request.order_id,
            transaction_id,
        })),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(record_gateway_event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_transaction_types() {
        assert_eq!(
            parse_transaction_type("authorization").unwrap(),
            TransactionType::Authorization
        );
        assert_eq!(
            parse_transaction_type("Capture").unwrap(),
            TransactionType::Capture
        );
    }

    #[test]
    fn rejects_unknown_transaction_types() {
        assert!(matches!(
            parse_transaction_type("settlement"),
            Err(ServiceError::ValidationError(_))
        ));
    }
}

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    entities::{invoice, payment_transaction},
    errors::ServiceError,
    handlers::require_api_key,
    services::orders::{CreateOrderRequest, OrderResponse},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionFilter {
    /// Restrict results to one transaction type
    pub txn_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub txn_id: String,
    pub txn_type: String,
    pub parent_txn_id: Option<String>,
    #[schema(value_type = Object)]
    pub additional_information: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<payment_transaction::Model> for TransactionResponse {
    fn from(model: payment_transaction::Model) -> Self {
        Self {
            txn_id: model.txn_id,
            txn_type: model.txn_type.to_string(),
            parent_txn_id: model.parent_txn_id,
            additional_information: model.additional_information,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub increment_id: String,
    pub transaction_id: Option<String>,
    pub capture_case: String,
    pub can_void: bool,
    pub grand_total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<invoice::Model> for InvoiceResponse {
    fn from(model: invoice::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            increment_id: model.increment_id,
            transaction_id: model.transaction_id,
            capture_case: model.capture_case,
            can_void: model.can_void,
            grand_total: model.grand_total,
            created_at: model.created_at,
        }
    }
}

/// Place an order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    require_api_key(&state, &headers)?;

    let order = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Fetch an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {id} not found")))?;

    Ok(Json(ApiResponse::success(order)))
}

/// List gateway transactions recorded for an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/transactions",
    params(("id" = Uuid, Path, description = "Order id"), TransactionFilter),
    responses(
        (status = 200, description = "Transactions for the order", body = ApiResponse<Vec<TransactionResponse>>),
        (status = 404, description = "Order or payment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Transactions"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, ServiceError> {
    let txn_type = filter
        .txn_type
        .as_deref()
        .map(super::gateway_events::parse_transaction_type)
        .transpose()?;

    let transactions = state.services.transactions.list(id, txn_type).await?;
    let body = transactions.into_iter().map(TransactionResponse::from).collect();

    Ok(Json(ApiResponse::success(body)))
}

/// Fetch the most recent invoice for an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/invoice",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Latest invoice", body = ApiResponse<InvoiceResponse>),
        (status = 404, description = "Order has no invoice", body = crate::errors::ErrorResponse)
    ),
    tag = "Invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<InvoiceResponse>>, ServiceError> {
    let invoice = state
        .services
        .invoicing
        .get_invoice(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {id} has no invoice")))?;

    Ok(Json(ApiResponse::success(InvoiceResponse::from(invoice))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/:id", get(get_order))
        .route("/:id/transactions", get(list_transactions))
        .route("/:id/invoice", get(get_invoice))
}

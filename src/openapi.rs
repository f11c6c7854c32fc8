use utoipa::OpenApi;

/// OpenAPI documentation for the gateway integration API, served at
/// `/api/docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payment Gateway API",
        description = "Order placement and gateway transaction/invoice reconciliation"
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_transactions,
        crate::handlers::orders::get_invoice,
        crate::handlers::gateway_events::record_gateway_event,
    ),
    components(schemas(
        crate::ApiResponse<serde_json::Value>,
        crate::services::orders::CreateOrderRequest,
        crate::services::orders::OrderResponse,
        crate::handlers::orders::TransactionResponse,
        crate::handlers::orders::InvoiceResponse,
        crate::handlers::gateway_events::GatewayEventRequest,
        crate::handlers::gateway_events::GatewayEventResponse,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "Orders", description = "Order placement and lookup"),
        (name = "Gateway", description = "Inbound gateway event recording"),
        (name = "Transactions", description = "Recorded gateway transactions"),
        (name = "Invoices", description = "Invoices reconciled from captures"),
    )
)]
pub struct ApiDoc;

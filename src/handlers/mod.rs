pub mod gateway_events;
pub mod orders;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{invoicing::InvoicingService, orders::OrderService, transactions::TransactionService},
};
use axum::http::HeaderMap;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub transactions: Arc<TransactionService>,
    pub invoicing: Arc<InvoicingService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, config: &AppConfig, event_sender: Option<Arc<EventSender>>) -> Self {
        let invoicing = Arc::new(InvoicingService::new(db.clone(), event_sender.clone()));
        let transactions = Arc::new(TransactionService::new(
            db.clone(),
            config.gateway.clone(),
            invoicing.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(OrderService::new(db, event_sender));

        Self {
            orders,
            transactions,
            invoicing,
        }
    }
}

/// Check the caller's API key against configuration. When no key is
/// configured the check passes (development mode).
pub fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), ServiceError> {
    let Some(expected) = &state.config.api_key else {
        return Ok(());
    };

    let provided = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided == expected {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized("invalid API key".to_string()))
    }
}

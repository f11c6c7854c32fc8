use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, STATUS_PENDING_PAYMENT},
    entities::payment,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "Order number is required"))]
    pub order_number: String,
    pub grand_total: Decimal,
    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    pub currency: String,
    #[validate(length(min = 1, message = "Payment method code is required"))]
    pub payment_method_code: String,
    /// Raw gateway response from the checkout interaction, if one already
    /// happened; lets transactions be recorded later without re-sending it
    pub gateway_payload: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: String,
    pub grand_total: Decimal,
    pub currency: String,
    pub payment_method_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

/// Order placement and lookup. The cart/quote engine in front of this is an
/// upstream concern; this service receives already-priced orders.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates an order together with its payment record. One payment per
    /// order; both rows land in the same database transaction.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, order_number = %request.order_number))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.grand_total < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "grand total cannot be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "failed to start transaction for order creation");
            ServiceError::PersistenceFailure(e)
        })?;

        let order_active = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(request.order_number.clone()),
            customer_id: Set(request.customer_id),
            status: Set(STATUS_PENDING_PAYMENT.to_string()),
            grand_total: Set(request.grand_total),
            currency: Set(request.currency.to_uppercase()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };
        let order_model = order_active.insert(&txn).await?;

        let payment_active = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            method_code: Set(request.payment_method_code.clone()),
            last_transaction_id: Set(None),
            transaction_id: Set(None),
            is_transaction_closed: Set(false),
            gateway_payload: Set(request.gateway_payload),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let payment_model = payment_active.insert(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, customer_id = %request.customer_id, "order created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "failed to send order created event");
            }
        }

        Ok(Self::to_response(order_model, &payment_model.method_code))
    }

    /// Retrieves an order by ID, `None` when absent.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let order = OrderEntity::find_by_id(order_id).one(&*self.db).await?;

        let Some(order) = order else {
            return Ok(None);
        };

        let payment = order
            .find_related(payment::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("order {order_id} has no payment attached"))
            })?;

        Ok(Some(Self::to_response(order, &payment.method_code)))
    }

    fn to_response(model: OrderModel, method_code: &str) -> OrderResponse {
        OrderResponse {
            id: model.id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            status: model.status,
            grand_total: model.grand_total,
            currency: model.currency,
            payment_method_code: method_code.to_string(),
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn to_response_carries_order_fields() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();

        let model = OrderModel {
            id: order_id,
            order_number: "ORD-001".to_string(),
            customer_id,
            status: STATUS_PENDING_PAYMENT.to_string(),
            grand_total: dec!(99.99),
            currency: "USD".to_string(),
            created_at: now,
            updated_at: Some(now),
            version: 1,
        };

        let response = OrderService::to_response(model, "card_payments");

        assert_eq!(response.id, order_id);
        assert_eq!(response.customer_id, customer_id);
        assert_eq!(response.status, "pending_payment");
        assert_eq!(response.grand_total, dec!(99.99));
        assert_eq!(response.payment_method_code, "card_payments");
    }

    #[test]
    fn create_request_validation_rejects_bad_currency() {
        let request = CreateOrderRequest {
            customer_id: Uuid::new_v4(),
            order_number: "ORD-002".to_string(),
            grand_total: dec!(10),
            currency: "USDX".to_string(),
            payment_method_code: "card_payments".to_string(),
            gateway_payload: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_validation_accepts_well_formed_input() {
        let request = CreateOrderRequest {
            customer_id: Uuid::new_v4(),
            order_number: "ORD-003".to_string(),
            grand_total: dec!(10),
            currency: "EUR".to_string(),
            payment_method_code: "card_payments".to_string(),
            gateway_payload: None,
        };
        assert!(request.validate().is_ok());
    }
}

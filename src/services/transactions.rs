use crate::{
    config::GatewaySettings,
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, STATUS_PENDING_PAYMENT},
    entities::order_note,
    entities::payment::{self, Entity as PaymentEntity},
    entities::payment_transaction::{self, Entity as TransactionEntity, TransactionType},
    errors::ServiceError,
    events::{Event, EventSender},
    services::currency,
    services::gateway_response,
    services::invoicing::InvoicingService,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Raw payment payload received from the gateway. An arbitrary key/value
/// object that must carry at least a non-empty `id` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayPaymentData(pub Map<String, Value>);

impl GatewayPaymentData {
    /// Gateway-assigned transaction id. Rejects payloads without one up
    /// front, before any state has been touched.
    pub fn transaction_id(&self) -> Result<String, ServiceError> {
        match self.0.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(ServiceError::MissingTransactionId),
        }
    }

    fn from_stored(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }
}

/// Records gateway events (authorization, capture) against orders: persists
/// the payment transaction, updates payment and order state, appends the
/// human-readable order note, and on capture hands the order to the invoice
/// reconciler.
#[derive(Clone)]
pub struct TransactionService {
    db: Arc<DbPool>,
    settings: GatewaySettings,
    invoicing: Arc<InvoicingService>,
    event_sender: Option<Arc<EventSender>>,
}

impl TransactionService {
    pub fn new(
        db: Arc<DbPool>,
        settings: GatewaySettings,
        invoicing: Arc<InvoicingService>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            settings,
            invoicing,
            event_sender,
        }
    }

    /// Record a gateway transaction for an order and return the gateway
    /// transaction id.
    ///
    /// When `payment_data` is absent the payload stored on the payment from
    /// the last gateway interaction is used. Payment, transaction, order
    /// status and order note are persisted as one database transaction;
    /// invoice reconciliation runs after commit and is best-effort.
    ///
    /// Recording the same gateway transaction id twice is a no-op returning
    /// the already-recorded id.
    #[instrument(skip(self, payment_data), fields(order_id = %order_id, txn_type = %txn_type))]
    pub async fn record(
        &self,
        order_id: Uuid,
        txn_type: TransactionType,
        payment_data: Option<GatewayPaymentData>,
    ) -> Result<String, ServiceError> {
        if !matches!(
            txn_type,
            TransactionType::Authorization | TransactionType::Capture
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "transaction type {txn_type} is not recorded by this integration"
            )));
        }

        let db_txn = self.db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&db_txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;

        let payment = PaymentEntity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&db_txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("order {order_id} has no payment attached"))
            })?;

        let data = payment_data
            .or_else(|| {
                payment
                    .gateway_payload
                    .clone()
                    .and_then(GatewayPaymentData::from_stored)
            })
            .ok_or(ServiceError::MissingTransactionId)?;
        let tid = data.transaction_id()?;

        // Idempotency guard: the same gateway event delivered twice must not
        // produce a second transaction row. A known gateway id arriving for a
        // different order or as a different event type is a conflict, not a
        // redelivery.
        if let Some(existing) = TransactionEntity::find()
            .filter(payment_transaction::Column::TxnId.eq(tid.clone()))
            .one(&db_txn)
            .await?
        {
            db_txn.rollback().await?;
            if existing.order_id == order_id && existing.txn_type == txn_type {
                info!(txn_id = %tid, "transaction already recorded");
                return Ok(existing.txn_id);
            }
            return Err(ServiceError::InvalidOperation(format!(
                "gateway transaction id {tid} is already recorded for a different order or event type"
            )));
        }

        let new_status = self.guard_status_transition(&order.status, txn_type)?;
        let now = Utc::now();

        // Keep the payment open for later capture or void.
        let mut payment_active: payment::ActiveModel = payment.clone().into();
        payment_active.method_code = Set(payment.method_code.clone());
        payment_active.last_transaction_id = Set(Some(tid.clone()));
        payment_active.transaction_id = Set(Some(tid.clone()));
        payment_active.is_transaction_closed = Set(false);
        payment_active.updated_at = Set(Some(now));
        payment_active.update(&db_txn).await?;

        let formatted_total = currency::format(order.grand_total, &order.currency);

        // Authorizations have no parent; captures are recorded without one
        // as well since the gateway links them by its own id scheme.
        let transaction = payment_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            payment_id: Set(payment.id),
            txn_id: Set(tid.clone()),
            txn_type: Set(txn_type),
            parent_txn_id: Set(None),
            additional_information: Set(Value::Object(gateway_response::normalize(&data.0))),
            created_at: Set(now),
        };
        let transaction = transaction.insert(&db_txn).await?;

        let note = match txn_type {
            TransactionType::Authorization => {
                format!("The authorized amount is {formatted_total}.")
            }
            _ => format!("The captured amount is {formatted_total}."),
        };
        order_note::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            note: Set(note),
            created_at: Set(now),
        }
        .insert(&db_txn)
        .await?;

        let old_status = order.status.clone();
        let mut order_active: order::ActiveModel = order.clone().into();
        order_active.status = Set(new_status.clone());
        order_active.updated_at = Set(Some(now));
        order_active.version = Set(order.version + 1);
        let updated_order = order_active.update(&db_txn).await?;

        db_txn.commit().await?;

        info!(
            order_id = %order_id,
            txn_id = %tid,
            old_status = %old_status,
            new_status = %new_status,
            "gateway transaction recorded"
        );

        // Invoicing is best-effort: a failed invoice never fails the
        // recording. Operational tooling retries from the order state.
        if txn_type == TransactionType::Capture && self.settings.auto_invoice {
            if let Err(e) = self.invoicing.reconcile(&updated_order, Some(&transaction)).await {
                error!(error = %e, order_id = %order_id, "invoice reconciliation failed");
            }
        }

        self.emit_events(order_id, &tid, txn_type, old_status, new_status)
            .await;

        Ok(tid)
    }

    /// Transactions recorded for an order, optionally restricted to one
    /// type. The type filter is applied client-side after the fetch; per
    /// order cardinality is low. Results keep storage order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn list(
        &self,
        order_id: Uuid,
        txn_type: Option<TransactionType>,
    ) -> Result<Vec<payment_transaction::Model>, ServiceError> {
        let payment = PaymentEntity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await
            .map_err(|e| ServiceError::QueryFailure(e.to_string()))?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("order {order_id} has no payment attached"))
            })?;

        let transactions = TransactionEntity::find()
            .filter(payment_transaction::Column::OrderId.eq(order_id))
            .filter(payment_transaction::Column::PaymentId.eq(payment.id))
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::QueryFailure(e.to_string()))?;

        Ok(match txn_type {
            Some(wanted) => transactions
                .into_iter()
                .filter(|t| t.txn_type == wanted)
                .collect(),
            None => transactions,
        })
    }

    /// Guarded order status transition: pending -> authorized -> captured,
    /// with direct capture from pending allowed. Authorization events must
    /// arrive before capture events for the same order; out-of-order
    /// delivery is rejected instead of silently recorded.
    fn guard_status_transition(
        &self,
        current: &str,
        txn_type: TransactionType,
    ) -> Result<String, ServiceError> {
        match txn_type {
            TransactionType::Authorization if current == STATUS_PENDING_PAYMENT => {
                Ok(self.settings.order_status_authorized.clone())
            }
            TransactionType::Capture
                if current == STATUS_PENDING_PAYMENT
                    || current == self.settings.order_status_authorized =>
            {
                Ok(self.settings.order_status_captured.clone())
            }
            _ => Err(ServiceError::InvalidOperation(format!(
                "cannot record {txn_type} for an order in status {current}"
            ))),
        }
    }

    async fn emit_events(
        &self,
        order_id: Uuid,
        txn_id: &str,
        txn_type: TransactionType,
        old_status: String,
        new_status: String,
    ) {
        let Some(event_sender) = &self.event_sender else {
            return;
        };

        let payment_event = match txn_type {
            TransactionType::Authorization => Event::PaymentAuthorized {
                order_id,
                transaction_id: txn_id.to_string(),
            },
            _ => Event::PaymentCaptured {
                order_id,
                transaction_id: txn_id.to_string(),
            },
        };

        for event in [
            payment_event,
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            },
        ] {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, order_id = %order_id, "failed to send payment event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service_with(settings: GatewaySettings) -> TransactionService {
        let db = Arc::new(sea_orm::DatabaseConnection::Disconnected);
        let invoicing = Arc::new(InvoicingService::new(db.clone(), None));
        TransactionService::new(db, settings, invoicing, None)
    }

    fn payload(id: &str) -> GatewayPaymentData {
        match json!({ "id": id, "approved": true }) {
            Value::Object(map) => GatewayPaymentData(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn payload_with_id_yields_transaction_id() {
        assert_eq!(payload("tx_9").transaction_id().unwrap(), "tx_9");
    }

    #[test]
    fn payload_without_id_is_rejected() {
        let data = match json!({ "amount": 100 }) {
            Value::Object(map) => GatewayPaymentData(map),
            _ => unreachable!(),
        };
        assert!(matches!(
            data.transaction_id(),
            Err(ServiceError::MissingTransactionId)
        ));
    }

    #[test]
    fn payload_with_empty_id_is_rejected() {
        assert!(matches!(
            payload("").transaction_id(),
            Err(ServiceError::MissingTransactionId)
        ));
    }

    #[test]
    fn stored_payload_must_be_an_object() {
        assert!(GatewayPaymentData::from_stored(json!("tx_1")).is_none());
        assert!(GatewayPaymentData::from_stored(json!({ "id": "tx_1" })).is_some());
    }

    #[test]
    fn authorization_moves_pending_to_authorized() {
        let service = service_with(GatewaySettings::default());
        let next = service
            .guard_status_transition(STATUS_PENDING_PAYMENT, TransactionType::Authorization)
            .unwrap();
        assert_eq!(next, "processing_authorized");
    }

    #[test]
    fn capture_moves_authorized_to_captured() {
        let service = service_with(GatewaySettings::default());
        let next = service
            .guard_status_transition("processing_authorized", TransactionType::Capture)
            .unwrap();
        assert_eq!(next, "processing_captured");
    }

    #[test]
    fn direct_capture_from_pending_is_allowed() {
        let service = service_with(GatewaySettings::default());
        let next = service
            .guard_status_transition(STATUS_PENDING_PAYMENT, TransactionType::Capture)
            .unwrap();
        assert_eq!(next, "processing_captured");
    }

    #[test]
    fn double_authorization_is_rejected() {
        let service = service_with(GatewaySettings::default());
        let result =
            service.guard_status_transition("processing_authorized", TransactionType::Authorization);
        assert!(matches!(result, Err(ServiceError::InvalidOperation(_))));
    }

    #[test]
    fn capture_after_capture_is_rejected() {
        let service = service_with(GatewaySettings::default());
        let result =
            service.guard_status_transition("processing_captured", TransactionType::Capture);
        assert!(matches!(result, Err(ServiceError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn void_and_refund_are_not_recorded() {
        let service = service_with(GatewaySettings::default());
        for txn_type in [TransactionType::Void, TransactionType::Refund] {
            let result = service.record(Uuid::new_v4(), txn_type, None).await;
            assert!(matches!(result, Err(ServiceError::InvalidOperation(_))));
        }
    }

    #[test]
    fn custom_configured_statuses_are_honored() {
        let settings = GatewaySettings {
            order_status_authorized: "auth_ok".to_string(),
            order_status_captured: "paid".to_string(),
            auto_invoice: true,
        };
        let service = service_with(settings);
        let next = service
            .guard_status_transition("auth_ok", TransactionType::Capture)
            .unwrap();
        assert_eq!(next, "paid");
    }
}

use crate::{
    db::DbPool,
    entities::invoice::{self, CaptureCase, Entity as InvoiceEntity},
    entities::order,
    entities::payment_transaction::{self, TransactionType},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Decides whether a gateway transaction requires an invoice and creates it
/// idempotently.
///
/// Two states per capture transaction: uninvoiced and invoiced; the
/// transition only runs forward. An online-captured invoice cannot be
/// voided, so `can_void` is always false for invoices created here.
#[derive(Clone)]
pub struct InvoicingService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl InvoicingService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// True iff the transaction exists and is a capture. Authorizations,
    /// voids and refunds never produce an invoice.
    pub fn needs_invoicing(transaction: Option<&payment_transaction::Model>) -> bool {
        matches!(
            transaction,
            Some(txn) if txn.txn_type == TransactionType::Capture
        )
    }

    /// Reconcile an order against a triggering transaction. Returns the
    /// invoice when one exists or was created, `None` when no invoicing is
    /// needed. A capture already stamped on an invoice is returned as-is
    /// rather than invoiced twice.
    #[instrument(skip(self, order, transaction), fields(order_id = %order.id))]
    pub async fn reconcile(
        &self,
        order: &order::Model,
        transaction: Option<&payment_transaction::Model>,
    ) -> Result<Option<invoice::Model>, ServiceError> {
        let txn = match transaction {
            Some(txn) if Self::needs_invoicing(Some(txn)) => txn,
            _ => {
                debug!(order_id = %order.id, "no invoicing needed");
                return Ok(None);
            }
        };

        // Duplicate-invoice guard: at most one invoice per capture transaction.
        let existing = InvoiceEntity::find()
            .filter(invoice::Column::OrderId.eq(order.id))
            .filter(invoice::Column::TransactionId.eq(txn.txn_id.clone()))
            .one(&*self.db)
            .await?;

        if let Some(existing) = existing {
            info!(
                order_id = %order.id,
                txn_id = %txn.txn_id,
                increment_id = %existing.increment_id,
                "capture already invoiced"
            );
            return Ok(Some(existing));
        }

        let created = self.create_invoice(order, txn).await?;
        Ok(Some(created))
    }

    /// Create and persist the invoice for a capture transaction.
    async fn create_invoice(
        &self,
        order: &order::Model,
        transaction: &payment_transaction::Model,
    ) -> Result<invoice::Model, ServiceError> {
        let invoice_id = Uuid::new_v4();

        // Concurrent captures can race to the same invoice number; the unique
        // constraint catches the loser, which re-derives and retries.
        let mut attempt = 0;
        let created = loop {
            let increment_id = self.next_increment_id().await?;

            let model = invoice::ActiveModel {
                id: Set(invoice_id),
                order_id: Set(order.id),
                increment_id: Set(increment_id),
                transaction_id: Set(Some(transaction.txn_id.clone())),
                capture_case: Set(CaptureCase::Online.to_string()),
                can_void: Set(false),
                // Grand total copied from the order, guarding against drift
                // from partial invoice preparation.
                grand_total: Set(order.grand_total),
                created_at: Set(Utc::now()),
            };

            match model.insert(&*self.db).await {
                Ok(created) => break created,
                Err(e)
                    if attempt < 3
                        && matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
                {
                    attempt += 1;
                    debug!(order_id = %order.id, attempt, "invoice number taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        info!(
            order_id = %order.id,
            invoice_id = %invoice_id,
            increment_id = %created.increment_id,
            txn_id = %transaction.txn_id,
            "invoice created"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::InvoiceCreated {
                    order_id: order.id,
                    invoice_id,
                })
                .await
            {
                warn!(error = %e, order_id = %order.id, "failed to send invoice created event");
            }
        }

        Ok(created)
    }

    /// Most recently created invoice for an order, by increment id.
    /// Returns `None` when the order has no invoices.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_invoice(
        &self,
        order_id: Uuid,
    ) -> Result<Option<invoice::Model>, ServiceError> {
        let invoice = InvoiceEntity::find()
            .filter(invoice::Column::OrderId.eq(order_id))
            .order_by_desc(invoice::Column::IncrementId)
            .one(&*self.db)
            .await
            .map_err(|e| ServiceError::QueryFailure(e.to_string()))?;

        Ok(invoice)
    }

    /// Zero-padded so lexicographic order matches creation order, which lets
    /// the next number be derived from the current maximum.
    async fn next_increment_id(&self) -> Result<String, ServiceError> {
        let latest = InvoiceEntity::find()
            .order_by_desc(invoice::Column::IncrementId)
            .one(&*self.db)
            .await?;

        let next = latest
            .and_then(|inv| {
                inv.increment_id
                    .strip_prefix("INV-")
                    .and_then(|n| n.parse::<u64>().ok())
            })
            .unwrap_or(0)
            + 1;
        Ok(format!("INV-{next:09}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transaction_of_type(txn_type: TransactionType) -> payment_transaction::Model {
        payment_transaction::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            payment_id: Uuid::new_v4(),
            txn_id: "tx_1".to_string(),
            txn_type,
            parent_txn_id: None,
            additional_information: json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn capture_needs_invoicing() {
        let txn = transaction_of_type(TransactionType::Capture);
        assert!(InvoicingService::needs_invoicing(Some(&txn)));
    }

    #[test]
    fn authorization_never_needs_invoicing() {
        let txn = transaction_of_type(TransactionType::Authorization);
        assert!(!InvoicingService::needs_invoicing(Some(&txn)));
    }

    #[test]
    fn missing_transaction_never_needs_invoicing() {
        assert!(!InvoicingService::needs_invoicing(None));
    }

    #[test]
    fn void_and_refund_never_need_invoicing() {
        for txn_type in [TransactionType::Void, TransactionType::Refund] {
            let txn = transaction_of_type(txn_type);
            assert!(!InvoicingService::needs_invoicing(Some(&txn)));
        }
    }

    #[test]
    fn increment_ids_sort_lexicographically() {
        let a = format!("INV-{:09}", 9u64);
        let b = format!("INV-{:09}", 10u64);
        assert!(a < b);
    }

    #[test]
    fn capture_case_renders_lowercase() {
        assert_eq!(CaptureCase::Online.to_string(), "online");
        assert_eq!(CaptureCase::Offline.to_string(), "offline");
    }
}

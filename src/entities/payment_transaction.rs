use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Gateway transaction type. Only authorization and capture are recorded by
/// the integration; void and refund exist for completeness of the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[sea_orm(string_value = "authorization")]
    Authorization,
    #[sea_orm(string_value = "capture")]
    Capture,
    #[sea_orm(string_value = "void")]
    Void,
    #[sea_orm(string_value = "refund")]
    Refund,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Authorization => "authorization",
            TransactionType::Capture => "capture",
            TransactionType::Void => "void",
            TransactionType::Refund => "refund",
        };
        f.write_str(s)
    }
}

/// One persisted gateway event against an order's payment. Immutable once
/// written; `txn_id` is the gateway-assigned identifier and is unique across
/// the system.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_id: Uuid,
    pub payment_id: Uuid,

    #[sea_orm(unique)]
    pub txn_id: String,

    pub txn_type: TransactionType,
    pub parent_txn_id: Option<String>,

    /// Flattened gateway response, as produced by the response normalizer
    pub additional_information: Json,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::payment::Entity",
        from = "Column::PaymentId",
        to = "super::payment::Column::Id"
    )]
    Payment,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

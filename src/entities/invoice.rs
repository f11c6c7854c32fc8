use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// How the invoiced amount is (or was) captured. Online means the gateway
/// performed the capture; offline means funds were settled out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CaptureCase {
    Online,
    Offline,
}

/// Financial record of captured funds against an order.
///
/// At most one invoice may exist per capture transaction; the reconciler
/// enforces this by checking `transaction_id` before creating a new row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_id: Uuid,

    /// Zero-padded, lexicographically sortable invoice number
    #[sea_orm(unique)]
    pub increment_id: String,

    /// Gateway transaction id of the capture that triggered this invoice
    pub transaction_id: Option<String>,

    pub capture_case: String,
    pub can_void: bool,
    pub grand_total: Decimal,
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
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

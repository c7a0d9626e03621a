use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReceiptLineCondition {
    #[default]
    #[sea_orm(string_value = "good")]
    Good,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ReceiptLineCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Damaged => "damaged",
            Self::Partial => "partial",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "receipt_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub receipt_id: Uuid,
    /// Null for blind receiving.
    pub purchase_order_line_id: Option<Uuid>,
    pub description: String,
    pub qty_received: Decimal,
    pub uom: Option<String>,
    pub condition: ReceiptLineCondition,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::receipt::Entity",
        from = "Column::ReceiptId",
        to = "super::receipt::Column::Id"
    )]
    Receipt,
    #[sea_orm(
        belongs_to = "super::purchase_order_line::Entity",
        from = "Column::PurchaseOrderLineId",
        to = "super::purchase_order_line::Column::Id"
    )]
    PurchaseOrderLine,
}

impl Related<super::receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipt.def()
    }
}

impl Related<super::purchase_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrderLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

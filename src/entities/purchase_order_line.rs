use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderLineStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub uom: Option<String>,
    pub unit_cost: Decimal,
    pub line_status: PurchaseOrderLineStatus,
    pub source_pr_line_id: Option<Uuid>,
    pub catalog_item_id: Option<Uuid>,
    pub sov_line_id: Option<Uuid>,
    pub timeline_task_id: Option<Uuid>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Uuid,
}

impl Model {
    pub fn extended_cost(&self) -> Decimal {
        self.quantity * self.unit_cost
    }

    /// Live lines that still expect deliveries. Cancelled lines keep their
    /// row but drop out of coverage and cannot be received against.
    pub fn is_receivable(&self) -> bool {
        self.is_active && self.line_status == PurchaseOrderLineStatus::Open
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_order::Entity",
        from = "Column::PurchaseOrderId",
        to = "super::purchase_order::Column::Id"
    )]
    PurchaseOrder,
    #[sea_orm(has_many = "super::receipt_line::Entity")]
    ReceiptLines,
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrder.def()
    }
}

impl Related<super::receipt_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceiptLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

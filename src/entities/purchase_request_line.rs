use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_request_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub purchase_request_id: Uuid,
    pub project_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub uom: Option<String>,
    pub est_unit_cost: Option<Decimal>,
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
    /// quantity × estimated unit cost; a missing cost contributes nothing.
    pub fn extended_cost(&self) -> Decimal {
        self.quantity * self.est_unit_cost.unwrap_or(Decimal::ZERO)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_request::Entity",
        from = "Column::PurchaseRequestId",
        to = "super::purchase_request::Column::Id"
    )]
    PurchaseRequest,
}

impl Related<super::purchase_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

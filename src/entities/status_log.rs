use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditEntityType {
    #[sea_orm(string_value = "purchase_request")]
    PurchaseRequest,
    #[sea_orm(string_value = "purchase_order")]
    PurchaseOrder,
    #[sea_orm(string_value = "receipt")]
    Receipt,
}

impl AuditEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PurchaseRequest => "purchase_request",
            Self::PurchaseOrder => "purchase_order",
            Self::Receipt => "receipt",
        }
    }
}

/// Append-only audit trail entry. Rows are never updated or deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "status_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub project_id: Option<Uuid>,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub message: String,
    pub metadata: Json,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

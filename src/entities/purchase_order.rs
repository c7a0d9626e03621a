use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PurchaseOrderStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "issued")]
    Issued,
    #[sea_orm(string_value = "acknowledged")]
    Acknowledged,
    #[sea_orm(string_value = "partially_received")]
    PartiallyReceived,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::Acknowledged => "acknowledged",
            Self::PartiallyReceived => "partially_received",
            Self::Received => "received",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        match (self, next) {
            (Draft, Issued) | (Draft, Cancelled) => true,
            (Issued, Acknowledged)
            | (Issued, PartiallyReceived)
            | (Issued, Received)
            | (Issued, Cancelled) => true,
            (Acknowledged, PartiallyReceived)
            | (Acknowledged, Received)
            | (Acknowledged, Cancelled) => true,
            (PartiallyReceived, Received)
            | (PartiallyReceived, Closed)
            | (PartiallyReceived, Cancelled) => true,
            (Received, Closed) | (Received, Cancelled) => true,
            _ => false,
        }
    }

    /// Goods may be received against the order in these states.
    pub fn accepts_receipts(&self) -> bool {
        matches!(
            self,
            Self::Issued | Self::Acknowledged | Self::PartiallyReceived | Self::Received
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub vendor_id: Uuid,
    #[sea_orm(unique)]
    pub po_number: String,
    pub status: PurchaseOrderStatus,
    #[sea_orm(unique)]
    pub source_pr_id: Option<Uuid>,
    pub ship_to_name: Option<String>,
    pub ship_to_address1: Option<String>,
    pub ship_to_address2: Option<String>,
    pub ship_to_city: Option<String>,
    pub ship_to_state: Option<String>,
    pub ship_to_postal_code: Option<String>,
    pub needed_by: Option<NaiveDate>,
    pub freight_estimate: Option<Decimal>,
    pub tax_estimate: Option<Decimal>,
    pub notes: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,
    #[sea_orm(has_many = "super::purchase_order_line::Entity")]
    Lines,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl Related<super::purchase_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

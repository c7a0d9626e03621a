use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Closed set of roles an actor may hold. Permission predicates are defined
/// over this enum in `services::authorization`.
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
pub enum ActorRole {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "pm")]
    Pm,
    #[sea_orm(string_value = "super")]
    Super,
    #[sea_orm(string_value = "ops")]
    Ops,
    #[sea_orm(string_value = "executive")]
    Executive,
    #[sea_orm(string_value = "accounting")]
    Accounting,
    #[sea_orm(string_value = "shop")]
    Shop,
    #[sea_orm(string_value = "purchasing")]
    Purchasing,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "commandant")]
    Commandant,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::User => "user",
            ActorRole::Pm => "pm",
            ActorRole::Super => "super",
            ActorRole::Ops => "ops",
            ActorRole::Executive => "executive",
            ActorRole::Accounting => "accounting",
            ActorRole::Shop => "shop",
            ActorRole::Purchasing => "purchasing",
            ActorRole::Admin => "admin",
            ActorRole::Commandant => "commandant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "actors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub display_name: String,
    pub role: ActorRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

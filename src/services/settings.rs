use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QuerySelect, Set};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    db::{self, DbPool},
    entities::purchasing_settings::{self, Entity as PurchasingSettingsRow},
    errors::ServiceError,
    events::{Event, EventSender},
    services::authorization::{self, Action, ApprovalPolicy},
    services::numbering::{DocumentCategory, NumberingScheme},
};

const SETTINGS_ROW_ID: i32 = 1;

/// Values written to the settings row the first time the engine starts
/// against a store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurchasingDefaults {
    pub approval_threshold: Decimal,
    pub pr_numbering: NumberingScheme,
    pub po_numbering: NumberingScheme,
    pub receipt_numbering: NumberingScheme,
}

impl Default for PurchasingDefaults {
    fn default() -> Self {
        Self {
            approval_threshold: Decimal::ONE_THOUSAND,
            pr_numbering: NumberingScheme::Yearly,
            po_numbering: NumberingScheme::Global,
            receipt_numbering: NumberingScheme::Global,
        }
    }
}

/// Effective purchasing policy as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasingPolicy {
    pub approval_threshold: Decimal,
    pub pr_numbering: NumberingScheme,
    pub po_numbering: NumberingScheme,
    pub receipt_numbering: NumberingScheme,
    pub updated_by: Option<Uuid>,
}

impl PurchasingPolicy {
    pub fn approval(&self) -> ApprovalPolicy {
        ApprovalPolicy {
            threshold: self.approval_threshold,
        }
    }

    pub fn scheme_for(&self, category: DocumentCategory) -> NumberingScheme {
        match category {
            DocumentCategory::PurchaseRequest => self.pr_numbering,
            DocumentCategory::PurchaseOrder => self.po_numbering,
            DocumentCategory::Receipt => self.receipt_numbering,
        }
    }
}

impl From<PurchasingDefaults> for PurchasingPolicy {
    fn from(d: PurchasingDefaults) -> Self {
        Self {
            approval_threshold: d.approval_threshold,
            pr_numbering: d.pr_numbering,
            po_numbering: d.po_numbering,
            receipt_numbering: d.receipt_numbering,
            updated_by: None,
        }
    }
}

fn parse_scheme(column: &str, raw: &str) -> Result<NumberingScheme, ServiceError> {
    NumberingScheme::from_str(raw).map_err(|_| {
        ServiceError::ConfigError(format!("purchasing_settings.{} has unknown scheme '{}'", column, raw))
    })
}

impl TryFrom<purchasing_settings::Model> for PurchasingPolicy {
    type Error = ServiceError;

    fn try_from(row: purchasing_settings::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            approval_threshold: row.approval_threshold,
            pr_numbering: parse_scheme("pr_numbering", &row.pr_numbering)?,
            po_numbering: parse_scheme("po_numbering", &row.po_numbering)?,
            receipt_numbering: parse_scheme("receipt_numbering", &row.receipt_numbering)?,
            updated_by: row.updated_by,
        })
    }
}

/// Reads the settings row, falling back to built-in defaults when the store
/// has not been initialised.
pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<PurchasingPolicy, ServiceError> {
    match PurchasingSettingsRow::find_by_id(SETTINGS_ROW_ID)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
    {
        Some(row) => row.try_into(),
        None => Ok(PurchasingDefaults::default().into()),
    }
}

fn new_row(defaults: &PurchasingDefaults, actor_id: Option<Uuid>) -> purchasing_settings::ActiveModel {
    purchasing_settings::ActiveModel {
        id: Set(SETTINGS_ROW_ID),
        approval_threshold: Set(defaults.approval_threshold),
        pr_numbering: Set(defaults.pr_numbering.to_string()),
        po_numbering: Set(defaults.po_numbering.to_string()),
        receipt_numbering: Set(defaults.receipt_numbering.to_string()),
        updated_at: Set(Utc::now()),
        updated_by: Set(actor_id),
    }
}

#[derive(Clone)]
pub struct SettingsService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SettingsService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn current(&self) -> Result<PurchasingPolicy, ServiceError> {
        load(&*self.db_pool).await
    }

    /// Writes the settings row if it does not exist yet. An existing row is
    /// left untouched so runtime changes survive restarts.
    #[instrument(skip(self))]
    pub async fn initialize(
        &self,
        defaults: PurchasingDefaults,
    ) -> Result<PurchasingPolicy, ServiceError> {
        let txn = db::begin(&self.db_pool).await?;
        let existing = PurchasingSettingsRow::find_by_id(SETTINGS_ROW_ID)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let policy = match existing {
            Some(row) => row.try_into()?,
            None => {
                let row = new_row(&defaults, None)
                    .insert(&txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                info!(threshold = %row.approval_threshold, "Purchasing settings initialised");
                row.try_into()?
            }
        };
        db::commit(txn).await?;
        Ok(policy)
    }

    /// Changes the PR approval threshold. Admin-tier only.
    #[instrument(skip(self))]
    pub async fn set_approval_threshold(
        &self,
        actor_id: Uuid,
        amount: Decimal,
    ) -> Result<PurchasingPolicy, ServiceError> {
        crate::common::require_non_negative("approval_threshold", amount)?;

        let txn = db::begin(&self.db_pool).await?;
        let actor = authorization::resolve_actor(&txn, actor_id).await?;
        authorization::ensure(
            authorization::can_administer(actor.role),
            &actor,
            Action::Administer,
        )?;

        let row = match PurchasingSettingsRow::find_by_id(SETTINGS_ROW_ID)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
        {
            Some(row) => {
                let mut active: purchasing_settings::ActiveModel = row.into();
                active.approval_threshold = Set(amount);
                active.updated_at = Set(Utc::now());
                active.updated_by = Set(Some(actor_id));
                active.update(&txn).await.map_err(ServiceError::db_error)?
            }
            None => {
                let defaults = PurchasingDefaults {
                    approval_threshold: amount,
                    ..Default::default()
                };
                new_row(&defaults, Some(actor_id))
                    .insert(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
            }
        };
        let policy: PurchasingPolicy = row.try_into()?;
        db::commit(txn).await?;

        info!(actor_id = %actor_id, threshold = %amount, "Approval threshold changed");
        self.event_sender
            .send_or_log(Event::ApprovalThresholdChanged {
                actor_id,
                threshold: amount.to_string(),
            })
            .await;
        Ok(policy)
    }

    /// Switches a document category between global and yearly numbering.
    /// Admin-tier only. Counters already issued are not renumbered.
    #[instrument(skip(self))]
    pub async fn set_numbering_scheme(
        &self,
        actor_id: Uuid,
        category: DocumentCategory,
        scheme: NumberingScheme,
    ) -> Result<PurchasingPolicy, ServiceError> {
        let txn = db::begin(&self.db_pool).await?;
        let actor = authorization::resolve_actor(&txn, actor_id).await?;
        authorization::ensure(
            authorization::can_administer(actor.role),
            &actor,
            Action::Administer,
        )?;

        let mut active: purchasing_settings::ActiveModel =
            match PurchasingSettingsRow::find_by_id(SETTINGS_ROW_ID)
                .lock_exclusive()
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
            {
                Some(row) => row.into(),
                None => new_row(&PurchasingDefaults::default(), Some(actor_id))
                    .insert(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .into(),
            };

        let value = Set(scheme.to_string());
        match category {
            DocumentCategory::PurchaseRequest => active.pr_numbering = value,
            DocumentCategory::PurchaseOrder => active.po_numbering = value,
            DocumentCategory::Receipt => active.receipt_numbering = value,
        }
        active.updated_at = Set(Utc::now());
        active.updated_by = Set(Some(actor_id));
        let row = active.update(&txn).await.map_err(ServiceError::db_error)?;
        let policy: PurchasingPolicy = row.try_into()?;
        db::commit(txn).await?;

        info!(actor_id = %actor_id, category = category.prefix(), scheme = %scheme, "Numbering scheme changed");
        Ok(policy)
    }
}

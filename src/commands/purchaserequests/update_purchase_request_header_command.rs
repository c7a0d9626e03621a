use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::touch_and_reset_approval;
use crate::{
    commands::Command,
    common::{normalize_text, FieldUpdate},
    db::{self, DbPool},
    entities::{
        purchase_request::{self, PurchaseRequestPriority},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry, ChangeSet},
        authorization,
        purchase_requests::{detail_for, ensure_editable, lock_purchase_request, PurchaseRequestDetail},
    },
};

/// Partial header edit. Each field distinguishes "leave alone" from
/// "clear"; clearing `priority` restores the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePurchaseRequestHeaderCommand {
    pub purchase_request_id: Uuid,
    pub actor_id: Uuid,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub needed_by: FieldUpdate<NaiveDate>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub priority: FieldUpdate<PurchaseRequestPriority>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub notes: FieldUpdate<String>,
}

#[async_trait]
impl Command for UpdatePurchaseRequestHeaderCommand {
    type Result = PurchaseRequestDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (detail, events) = self.update_header(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("update_purchase_request_header", e.kind());
            warn!(error = %e, "Failed to update purchase request header");
            e
        })?;

        for event in events {
            event_sender.send_or_log(event).await;
        }
        Ok(detail)
    }
}

impl UpdatePurchaseRequestHeaderCommand {
    fn notes_update(&self) -> FieldUpdate<String> {
        match &self.notes {
            FieldUpdate::Set(text) => normalize_text(Some(text.as_str())).into(),
            other => other.clone(),
        }
    }

    async fn update_header(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(PurchaseRequestDetail, Vec<Event>), ServiceError> {
        let txn = db::begin(db).await?;
        authorization::resolve_actor(&txn, self.actor_id).await?;
        let pr = lock_purchase_request(&txn, self.purchase_request_id).await?;
        ensure_editable(&pr)?;

        let needed_by = self.needed_by.apply_to(&pr.needed_by);
        let priority = self
            .priority
            .apply_to(&Some(pr.priority))
            .unwrap_or_default();
        let notes = self.notes_update().apply_to(&pr.notes);

        let mut changes = ChangeSet::new();
        changes.track("needed_by", &pr.needed_by, &needed_by);
        changes.track("priority", &pr.priority, &priority);
        changes.track("notes", &pr.notes, &notes);

        if changes.is_empty() {
            let detail = detail_for(&txn, pr).await?;
            db::commit(txn).await?;
            return Ok((detail, Vec::new()));
        }

        let now = Utc::now();
        let mut active: purchase_request::ActiveModel = pr.into();
        active.needed_by = Set(needed_by);
        active.priority = Set(priority);
        active.notes = Set(notes);
        let pr = active.update(&txn).await.map_err(ServiceError::db_error)?;

        audit::record(
            &txn,
            AuditEntry::new(
                AuditEntityType::PurchaseRequest,
                pr.id,
                self.actor_id,
                "header updated",
            )
            .project(pr.project_id)
            .metadata(changes.into_value()),
        )
        .await?;

        let mut events = vec![Event::PurchaseRequestUpdated(pr.id)];
        let (pr, reset) = touch_and_reset_approval(
            &txn,
            pr,
            self.actor_id,
            now,
            "approval reset due to header change",
        )
        .await?;
        events.extend(reset);

        let detail = detail_for(&txn, pr).await?;
        db::commit(txn).await?;

        info!(purchase_request_id = %detail.header.id, "Purchase request header updated");
        Ok((detail, events))
    }
}

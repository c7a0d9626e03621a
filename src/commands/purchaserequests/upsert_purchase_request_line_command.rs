use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::touch_and_reset_approval;
use crate::{
    commands::Command,
    common::{normalize_text, require_non_negative, require_text},
    db::{self, DbPool},
    entities::{
        purchase_request_line::{self, Entity as PurchaseRequestLine},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry, ChangeSet},
        authorization,
        purchase_requests::{
            detail_for, ensure_editable, load_lines, lock_purchase_request,
            PurchaseRequestDetail,
        },
    },
};

/// Creates a line (no `line_id`) or replaces an existing line's values.
///
/// Optional link and text fields are written as given, so `None` clears
/// them on update. `sort_order` and `is_active` keep their stored values
/// when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertPurchaseRequestLineCommand {
    pub purchase_request_id: Uuid,
    pub actor_id: Uuid,
    pub line_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub description: String,
    pub quantity: Option<Decimal>,
    #[validate(length(max = 32))]
    pub uom: Option<String>,
    pub est_unit_cost: Option<Decimal>,
    pub catalog_item_id: Option<Uuid>,
    pub sov_line_id: Option<Uuid>,
    pub timeline_task_id: Option<Uuid>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[async_trait]
impl Command for UpsertPurchaseRequestLineCommand {
    type Result = PurchaseRequestDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (detail, events) = self.upsert_line(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("upsert_purchase_request_line", e.kind());
            warn!(error = %e, "Failed to upsert purchase request line");
            e
        })?;

        for event in events {
            event_sender.send_or_log(event).await;
        }
        Ok(detail)
    }
}

impl UpsertPurchaseRequestLineCommand {
    fn quantity(&self) -> Result<Decimal, ServiceError> {
        let quantity = self
            .quantity
            .ok_or_else(|| ServiceError::ValidationError("quantity is required".into()))?;
        require_non_negative("quantity", quantity)?;
        Ok(quantity)
    }

    async fn upsert_line(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(PurchaseRequestDetail, Vec<Event>), ServiceError> {
        require_text("description", &self.description)?;
        let quantity = self.quantity()?;
        if let Some(cost) = self.est_unit_cost {
            require_non_negative("est_unit_cost", cost)?;
        }
        let description = self.description.trim().to_string();
        let uom = normalize_text(self.uom.as_deref());

        let txn = db::begin(db).await?;
        authorization::resolve_actor(&txn, self.actor_id).await?;
        let pr = lock_purchase_request(&txn, self.purchase_request_id).await?;
        ensure_editable(&pr)?;

        let now = Utc::now();
        let (message, metadata) = match self.line_id {
            None => {
                let sort_order = match self.sort_order {
                    Some(order) => order,
                    None => load_lines(&txn, pr.id).await?.len() as i32,
                };
                let line = purchase_request_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    purchase_request_id: Set(pr.id),
                    project_id: Set(pr.project_id),
                    description: Set(description),
                    quantity: Set(quantity),
                    uom: Set(uom),
                    est_unit_cost: Set(self.est_unit_cost),
                    catalog_item_id: Set(self.catalog_item_id),
                    sov_line_id: Set(self.sov_line_id),
                    timeline_task_id: Set(self.timeline_task_id),
                    sort_order: Set(sort_order),
                    is_active: Set(self.is_active.unwrap_or(true)),
                    created_at: Set(now),
                    created_by: Set(self.actor_id),
                    updated_at: Set(now),
                    updated_by: Set(self.actor_id),
                }
                .insert(&txn)
                .await
                .map_err(ServiceError::db_error)?;
                (
                    "line created",
                    serde_json::json!({
                        "line_id": line.id,
                        "description": line.description,
                        "quantity": line.quantity,
                        "est_unit_cost": line.est_unit_cost,
                    }),
                )
            }
            Some(line_id) => {
                let existing = PurchaseRequestLine::find_by_id(line_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .filter(|l| l.purchase_request_id == pr.id)
                    .ok_or_else(|| ServiceError::not_found("Purchase request line", line_id))?;

                let sort_order = self.sort_order.unwrap_or(existing.sort_order);
                let is_active = self.is_active.unwrap_or(existing.is_active);

                let mut changes = ChangeSet::new();
                changes.track("description", &existing.description, &description);
                changes.track("quantity", &existing.quantity, &quantity);
                changes.track("uom", &existing.uom, &uom);
                changes.track("est_unit_cost", &existing.est_unit_cost, &self.est_unit_cost);
                changes.track("catalog_item_id", &existing.catalog_item_id, &self.catalog_item_id);
                changes.track("sov_line_id", &existing.sov_line_id, &self.sov_line_id);
                changes.track(
                    "timeline_task_id",
                    &existing.timeline_task_id,
                    &self.timeline_task_id,
                );
                changes.track("sort_order", &existing.sort_order, &sort_order);
                changes.track("is_active", &existing.is_active, &is_active);

                if changes.is_empty() {
                    // Nothing differs: no write, no log entry, approval stands.
                    let detail = detail_for(&txn, pr).await?;
                    db::commit(txn).await?;
                    return Ok((detail, Vec::new()));
                }

                let mut active: purchase_request_line::ActiveModel = existing.into();
                active.description = Set(description);
                active.quantity = Set(quantity);
                active.uom = Set(uom);
                active.est_unit_cost = Set(self.est_unit_cost);
                active.catalog_item_id = Set(self.catalog_item_id);
                active.sov_line_id = Set(self.sov_line_id);
                active.timeline_task_id = Set(self.timeline_task_id);
                active.sort_order = Set(sort_order);
                active.is_active = Set(is_active);
                active.updated_at = Set(now);
                active.updated_by = Set(self.actor_id);
                active.update(&txn).await.map_err(ServiceError::db_error)?;

                let mut metadata = changes.into_value();
                metadata["line_id"] = serde_json::json!(line_id);
                ("line updated", metadata)
            }
        };

        audit::record(
            &txn,
            AuditEntry::new(AuditEntityType::PurchaseRequest, pr.id, self.actor_id, message)
                .project(pr.project_id)
                .metadata(metadata),
        )
        .await?;

        let mut events = vec![Event::PurchaseRequestUpdated(pr.id)];
        let (pr, reset) = touch_and_reset_approval(
            &txn,
            pr,
            self.actor_id,
            now,
            "approval reset due to line change",
        )
        .await?;
        events.extend(reset);

        let detail = detail_for(&txn, pr).await?;
        db::commit(txn).await?;

        info!(
            purchase_request_id = %detail.header.id,
            change = message,
            status = detail.header.status.as_str(),
            "Purchase request line saved"
        );
        Ok((detail, events))
    }
}

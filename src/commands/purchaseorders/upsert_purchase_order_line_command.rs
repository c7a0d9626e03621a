use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    common::{normalize_text, require_text, validate_non_negative},
    db::{self, DbPool},
    entities::{
        purchase_order::{self, PurchaseOrderStatus},
        purchase_order_line::{self, Entity as PurchaseOrderLine, PurchaseOrderLineStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry, ChangeSet},
        authorization,
        purchase_orders::{detail_for, load_lines, lock_purchase_order, PurchaseOrderDetail},
    },
};

/// Creates or replaces a PO line. Editing never resets anything on the
/// order; cancelled and closed orders are frozen.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertPurchaseOrderLineCommand {
    pub purchase_order_id: Uuid,
    pub actor_id: Uuid,
    pub line_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(custom = "validate_non_negative")]
    pub quantity: Decimal,
    #[validate(length(max = 32))]
    pub uom: Option<String>,
    #[validate(custom = "validate_non_negative")]
    pub unit_cost: Decimal,
    pub line_status: Option<PurchaseOrderLineStatus>,
    pub catalog_item_id: Option<Uuid>,
    pub sov_line_id: Option<Uuid>,
    pub timeline_task_id: Option<Uuid>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[async_trait]
impl Command for UpsertPurchaseOrderLineCommand {
    type Result = PurchaseOrderDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_order_id = %self.purchase_order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (detail, changed) = self.upsert_line(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("upsert_purchase_order_line", e.kind());
            warn!(error = %e, "Failed to upsert purchase order line");
            e
        })?;

        if changed {
            event_sender
                .send_or_log(Event::PurchaseOrderUpdated(detail.header.id))
                .await;
        }
        Ok(detail)
    }
}

impl UpsertPurchaseOrderLineCommand {
    fn ensure_open(po: &purchase_order::Model) -> Result<(), ServiceError> {
        if matches!(
            po.status,
            PurchaseOrderStatus::Cancelled | PurchaseOrderStatus::Closed
        ) {
            return Err(ServiceError::InvalidState(format!(
                "purchase order {} is {} and its lines can no longer be edited",
                po.po_number,
                po.status.as_str()
            )));
        }
        Ok(())
    }

    async fn upsert_line(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(PurchaseOrderDetail, bool), ServiceError> {
        require_text("description", &self.description)?;
        let description = self.description.trim().to_string();
        let uom = normalize_text(self.uom.as_deref());

        let txn = db::begin(db).await?;
        authorization::resolve_actor(&txn, self.actor_id).await?;
        let po = lock_purchase_order(&txn, self.purchase_order_id).await?;
        Self::ensure_open(&po)?;

        let now = Utc::now();
        let (message, metadata) = match self.line_id {
            None => {
                let sort_order = match self.sort_order {
                    Some(order) => order,
                    None => load_lines(&txn, po.id).await?.len() as i32,
                };
                let line = purchase_order_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    purchase_order_id: Set(po.id),
                    description: Set(description),
                    quantity: Set(self.quantity),
                    uom: Set(uom),
                    unit_cost: Set(self.unit_cost),
                    line_status: Set(self.line_status.unwrap_or(PurchaseOrderLineStatus::Open)),
                    source_pr_line_id: Set(None),
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
                        "unit_cost": line.unit_cost,
                    }),
                )
            }
            Some(line_id) => {
                let existing = PurchaseOrderLine::find_by_id(line_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .filter(|l| l.purchase_order_id == po.id)
                    .ok_or_else(|| ServiceError::not_found("Purchase order line", line_id))?;

                let line_status = self.line_status.unwrap_or(existing.line_status);
                let sort_order = self.sort_order.unwrap_or(existing.sort_order);
                let is_active = self.is_active.unwrap_or(existing.is_active);

                let mut changes = ChangeSet::new();
                changes.track("description", &existing.description, &description);
                changes.track("quantity", &existing.quantity, &self.quantity);
                changes.track("uom", &existing.uom, &uom);
                changes.track("unit_cost", &existing.unit_cost, &self.unit_cost);
                changes.track("line_status", &existing.line_status, &line_status);
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
                    let detail = detail_for(&txn, po).await?;
                    db::commit(txn).await?;
                    return Ok((detail, false));
                }

                let mut active: purchase_order_line::ActiveModel = existing.into();
                active.description = Set(description);
                active.quantity = Set(self.quantity);
                active.uom = Set(uom);
                active.unit_cost = Set(self.unit_cost);
                active.line_status = Set(line_status);
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
            AuditEntry::new(AuditEntityType::PurchaseOrder, po.id, self.actor_id, message)
                .project(po.project_id)
                .metadata(metadata),
        )
        .await?;

        let mut active: purchase_order::ActiveModel = po.into();
        active.updated_at = Set(now);
        active.updated_by = Set(self.actor_id);
        let po = active.update(&txn).await.map_err(ServiceError::db_error)?;

        let detail = detail_for(&txn, po).await?;
        db::commit(txn).await?;

        info!(purchase_order_id = %detail.header.id, change = message, "Purchase order line saved");
        Ok((detail, true))
    }
}

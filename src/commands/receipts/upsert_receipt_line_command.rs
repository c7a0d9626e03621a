use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Set};
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
        purchase_order::Entity as PurchaseOrder,
        purchase_order_line::{Entity as PurchaseOrderLine, PurchaseOrderLineStatus},
        receipt::{self, ReceiptStatus},
        receipt_line::{self, Entity as ReceiptLine, ReceiptLineCondition},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry, ChangeSet},
        authorization::{self, Action},
        receipts::{detail_for, lock_receipt, ReceiptDetail},
    },
};

/// Adds or edits a receipt line. Leaving `purchase_order_line_id` empty
/// records a blind receipt that must be linked before reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertReceiptLineCommand {
    pub receipt_id: Uuid,
    pub actor_id: Uuid,
    pub line_id: Option<Uuid>,
    pub purchase_order_line_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(custom = "validate_non_negative")]
    pub qty_received: Decimal,
    #[validate(length(max = 32))]
    pub uom: Option<String>,
    pub condition: Option<ReceiptLineCondition>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[async_trait]
impl Command for UpsertReceiptLineCommand {
    type Result = ReceiptDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(receipt_id = %self.receipt_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (detail, changed) = self.upsert_line(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("upsert_receipt_line", e.kind());
            warn!(error = %e, "Failed to upsert receipt line");
            e
        })?;

        if changed {
            event_sender
                .send_or_log(Event::ReceiptUpdated(detail.header.id))
                .await;
        }
        Ok(detail)
    }
}

impl UpsertReceiptLineCommand {
    /// A linked PO line must be live and reachable from this receipt.
    async fn check_po_line(
        &self,
        txn: &DatabaseTransaction,
        receipt: &receipt::Model,
        po_line_id: Uuid,
    ) -> Result<(), ServiceError> {
        let po_line = PurchaseOrderLine::find_by_id(po_line_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Purchase order line", po_line_id))?;

        if !po_line.is_active {
            return Err(ServiceError::ValidationError(format!(
                "purchase order line {} is inactive",
                po_line_id
            )));
        }
        if po_line.line_status == PurchaseOrderLineStatus::Cancelled {
            return Err(ServiceError::ValidationError(format!(
                "purchase order line {} is cancelled",
                po_line_id
            )));
        }

        match receipt.purchase_order_id {
            Some(po_id) if po_line.purchase_order_id != po_id => {
                Err(ServiceError::ValidationError(format!(
                    "purchase order line {} does not belong to the receipt's purchase order",
                    po_line_id
                )))
            }
            Some(_) => Ok(()),
            None => {
                let po = PurchaseOrder::find_by_id(po_line.purchase_order_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::not_found("Purchase order", po_line.purchase_order_id)
                    })?;
                if po.project_id != receipt.project_id {
                    return Err(ServiceError::ValidationError(format!(
                        "purchase order line {} belongs to a different project",
                        po_line_id
                    )));
                }
                Ok(())
            }
        }
    }

    async fn upsert_line(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(ReceiptDetail, bool), ServiceError> {
        require_text("description", &self.description)?;
        let description = self.description.trim().to_string();
        let uom = normalize_text(self.uom.as_deref());
        let notes = normalize_text(self.notes.as_deref());

        let txn = db::begin(db).await?;
        let actor = authorization::resolve_actor(&txn, self.actor_id).await?;
        authorization::ensure(
            authorization::can_receive(actor.role) || authorization::can_reconcile(actor.role),
            &actor,
            Action::EditReceipt,
        )?;
        let receipt = lock_receipt(&txn, self.receipt_id).await?;

        if receipt.status == ReceiptStatus::Cancelled {
            return Err(ServiceError::InvalidState(format!(
                "receipt {} is cancelled",
                receipt.receipt_number
            )));
        }
        if let Some(po_line_id) = self.purchase_order_line_id {
            self.check_po_line(&txn, &receipt, po_line_id).await?;
        } else if receipt.status == ReceiptStatus::Reconciled {
            return Err(ServiceError::ValidationError(format!(
                "receipt {} is reconciled; every line must reference a purchase order line",
                receipt.receipt_number
            )));
        }

        let now = Utc::now();
        let (message, metadata) = match self.line_id {
            None => {
                let line = receipt_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    receipt_id: Set(receipt.id),
                    purchase_order_line_id: Set(self.purchase_order_line_id),
                    description: Set(description),
                    qty_received: Set(self.qty_received),
                    uom: Set(uom),
                    condition: Set(self.condition.unwrap_or_default()),
                    notes: Set(notes),
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
                        "purchase_order_line_id": line.purchase_order_line_id,
                        "qty_received": line.qty_received,
                        "condition": line.condition,
                    }),
                )
            }
            Some(line_id) => {
                let existing = ReceiptLine::find_by_id(line_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .filter(|l| l.receipt_id == receipt.id)
                    .ok_or_else(|| ServiceError::not_found("Receipt line", line_id))?;

                let condition = self.condition.unwrap_or(existing.condition);
                let mut changes = ChangeSet::new();
                changes.track(
                    "purchase_order_line_id",
                    &existing.purchase_order_line_id,
                    &self.purchase_order_line_id,
                );
                changes.track("description", &existing.description, &description);
                changes.track("qty_received", &existing.qty_received, &self.qty_received);
                changes.track("uom", &existing.uom, &uom);
                changes.track("condition", &existing.condition, &condition);
                changes.track("notes", &existing.notes, &notes);

                if changes.is_empty() {
                    let detail = detail_for(&txn, receipt).await?;
                    db::commit(txn).await?;
                    return Ok((detail, false));
                }

                let mut active: receipt_line::ActiveModel = existing.into();
                active.purchase_order_line_id = Set(self.purchase_order_line_id);
                active.description = Set(description);
                active.qty_received = Set(self.qty_received);
                active.uom = Set(uom);
                active.condition = Set(condition);
                active.notes = Set(notes);
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
            AuditEntry::new(AuditEntityType::Receipt, receipt.id, self.actor_id, message)
                .project(receipt.project_id)
                .metadata(metadata),
        )
        .await?;

        let mut active: receipt::ActiveModel = receipt.into();
        active.updated_at = Set(now);
        active.updated_by = Set(self.actor_id);
        let receipt = active.update(&txn).await.map_err(ServiceError::db_error)?;

        let detail = detail_for(&txn, receipt).await?;
        db::commit(txn).await?;

        info!(receipt_id = %detail.header.id, change = message, "Receipt line saved");
        Ok((detail, true))
    }
}

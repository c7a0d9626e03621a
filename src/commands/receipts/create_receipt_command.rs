use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    common::normalize_text,
    db::{self, DbPool},
    entities::{
        purchase_order::{self, Entity as PurchaseOrder},
        receipt::{self, ReceiptStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry},
        authorization::{self, Action},
        numbering::{self, DocumentCategory},
        receipts::{detail_for, ReceiptDetail},
        references, settings,
    },
};

/// Opens a pending receipt, optionally against a purchase order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReceiptCommand {
    pub project_id: Uuid,
    pub actor_id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub purchase_order_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[async_trait]
impl Command for CreateReceiptCommand {
    type Result = ReceiptDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(project_id = %self.project_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let detail = self.create_receipt(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("create_receipt", e.kind());
            warn!(error = %e, "Failed to create receipt");
            e
        })?;

        info!(
            receipt_id = %detail.header.id,
            receipt_number = %detail.header.receipt_number,
            "Receipt created"
        );
        event_sender
            .send_or_log(Event::ReceiptCreated {
                receipt_id: detail.header.id,
                project_id: detail.header.project_id,
                receipt_number: detail.header.receipt_number.clone(),
            })
            .await;
        Ok(detail)
    }
}

impl CreateReceiptCommand {
    /// Resolves the vendor a receipt against `po` should carry.
    fn vendor_for_order(
        &self,
        po: &purchase_order::Model,
    ) -> Result<Uuid, ServiceError> {
        if po.project_id != self.project_id {
            return Err(ServiceError::ValidationError(format!(
                "purchase order {} belongs to a different project",
                po.po_number
            )));
        }
        if !po.status.accepts_receipts() {
            return Err(ServiceError::InvalidState(format!(
                "purchase order {} is {} and cannot be received against",
                po.po_number,
                po.status.as_str()
            )));
        }
        match self.vendor_id {
            Some(vendor_id) if vendor_id != po.vendor_id => {
                Err(ServiceError::ValidationError(format!(
                    "vendor does not match purchase order {}",
                    po.po_number
                )))
            }
            _ => Ok(po.vendor_id),
        }
    }

    async fn create_receipt(&self, db: &DatabaseConnection) -> Result<ReceiptDetail, ServiceError> {
        let txn = db::begin(db).await?;
        let actor = authorization::resolve_actor(&txn, self.actor_id).await?;
        authorization::ensure(
            authorization::can_receive(actor.role),
            &actor,
            Action::ReceiveGoods,
        )?;
        references::require_active_project(&txn, self.project_id).await?;
        if let Some(vendor_id) = self.vendor_id {
            references::find_vendor(&txn, vendor_id).await?;
        }

        let vendor_id = match self.purchase_order_id {
            Some(po_id) => {
                let po = PurchaseOrder::find_by_id(po_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| ServiceError::not_found("Purchase order", po_id))?;
                Some(self.vendor_for_order(&po)?)
            }
            None => self.vendor_id,
        };

        let policy = settings::load(&txn).await?;
        let now = Utc::now();
        let category = DocumentCategory::Receipt;
        let receipt_number =
            numbering::allocate(&txn, category, policy.scheme_for(category), now).await?;

        let receipt = receipt::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(self.project_id),
            vendor_id: Set(vendor_id),
            purchase_order_id: Set(self.purchase_order_id),
            receipt_number: Set(receipt_number),
            status: Set(ReceiptStatus::Pending),
            received_at: Set(None),
            received_by: Set(None),
            location: Set(normalize_text(self.location.as_deref())),
            notes: Set(normalize_text(self.notes.as_deref())),
            created_at: Set(now),
            created_by: Set(self.actor_id),
            updated_at: Set(now),
            updated_by: Set(self.actor_id),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        audit::record(
            &txn,
            AuditEntry::new(AuditEntityType::Receipt, receipt.id, self.actor_id, "created")
                .project(receipt.project_id)
                .transition(None, Some(ReceiptStatus::Pending.as_str()))
                .metadata(serde_json::json!({
                    "receipt_number": receipt.receipt_number,
                    "purchase_order_id": receipt.purchase_order_id,
                    "vendor_id": receipt.vendor_id,
                })),
        )
        .await?;

        let detail = detail_for(&txn, receipt).await?;
        db::commit(txn).await?;
        metrics::record_transition("receipt", ReceiptStatus::Pending.as_str());
        Ok(detail)
    }
}

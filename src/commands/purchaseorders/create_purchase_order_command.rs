use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::{purchaserequests::ShipTo, Command},
    common::{normalize_text, validate_non_negative},
    db::{self, DbPool},
    entities::{
        purchase_order::{self, PurchaseOrderStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry},
        authorization,
        numbering::{self, DocumentCategory},
        purchase_orders::{detail_for, PurchaseOrderDetail},
        references, settings,
    },
};

/// Opens a draft purchase order directly, without a source request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseOrderCommand {
    pub project_id: Uuid,
    pub vendor_id: Uuid,
    pub actor_id: Uuid,
    #[validate]
    pub ship_to: Option<ShipTo>,
    pub needed_by: Option<NaiveDate>,
    #[validate(custom = "validate_non_negative")]
    pub freight_estimate: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub tax_estimate: Option<Decimal>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[async_trait]
impl Command for CreatePurchaseOrderCommand {
    type Result = PurchaseOrderDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(project_id = %self.project_id, vendor_id = %self.vendor_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let detail = self.create_purchase_order(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("create_purchase_order", e.kind());
            warn!(error = %e, "Failed to create purchase order");
            e
        })?;

        info!(
            purchase_order_id = %detail.header.id,
            po_number = %detail.header.po_number,
            "Purchase order created"
        );
        event_sender
            .send_or_log(Event::PurchaseOrderCreated {
                purchase_order_id: detail.header.id,
                project_id: detail.header.project_id,
                po_number: detail.header.po_number.clone(),
            })
            .await;
        Ok(detail)
    }
}

impl CreatePurchaseOrderCommand {
    async fn create_purchase_order(
        &self,
        db: &DatabaseConnection,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let txn = db::begin(db).await?;
        authorization::resolve_actor(&txn, self.actor_id).await?;
        references::require_active_project(&txn, self.project_id).await?;
        references::require_active_vendor(&txn, self.vendor_id).await?;
        let policy = settings::load(&txn).await?;

        let now = Utc::now();
        let category = DocumentCategory::PurchaseOrder;
        let po_number =
            numbering::allocate(&txn, category, policy.scheme_for(category), now).await?;
        let ship_to = self.ship_to.clone().unwrap_or_default();

        let po = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(self.project_id),
            vendor_id: Set(self.vendor_id),
            po_number: Set(po_number),
            status: Set(PurchaseOrderStatus::Draft),
            source_pr_id: Set(None),
            ship_to_name: Set(normalize_text(ship_to.name.as_deref())),
            ship_to_address1: Set(normalize_text(ship_to.address1.as_deref())),
            ship_to_address2: Set(normalize_text(ship_to.address2.as_deref())),
            ship_to_city: Set(normalize_text(ship_to.city.as_deref())),
            ship_to_state: Set(normalize_text(ship_to.state.as_deref())),
            ship_to_postal_code: Set(normalize_text(ship_to.postal_code.as_deref())),
            needed_by: Set(self.needed_by),
            freight_estimate: Set(self.freight_estimate),
            tax_estimate: Set(self.tax_estimate),
            notes: Set(normalize_text(self.notes.as_deref())),
            issued_at: Set(None),
            acknowledged_at: Set(None),
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
            AuditEntry::new(AuditEntityType::PurchaseOrder, po.id, self.actor_id, "created")
                .project(po.project_id)
                .transition(None, Some(PurchaseOrderStatus::Draft.as_str()))
                .metadata(serde_json::json!({
                    "po_number": po.po_number,
                    "vendor_id": po.vendor_id,
                })),
        )
        .await?;

        let detail = detail_for(&txn, po).await?;
        db::commit(txn).await?;
        metrics::record_transition("purchase_order", PurchaseOrderStatus::Draft.as_str());
        Ok(detail)
    }
}

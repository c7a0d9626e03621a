use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
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
        purchase_order::{self, PurchaseOrderStatus},
        purchase_order_line::{self, PurchaseOrderLineStatus},
        purchase_request::{self, PurchaseRequestStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry},
        authorization::{self, Action},
        numbering::{self, DocumentCategory},
        purchase_orders::{self as po_service, PurchaseOrderDetail},
        purchase_requests::{detail_for, lock_purchase_request, PurchaseRequestDetail},
        references, settings,
    },
};

/// Delivery address printed on the purchase order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ShipTo {
    #[validate(length(max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub address1: Option<String>,
    #[validate(length(max = 200))]
    pub address2: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(max = 32))]
    pub postal_code: Option<String>,
}

/// Turns an approved request into a draft purchase order. The PO is never
/// submitted or issued here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConvertPurchaseRequestCommand {
    pub purchase_request_id: Uuid,
    pub vendor_id: Uuid,
    pub actor_id: Uuid,
    #[validate]
    pub ship_to: Option<ShipTo>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertPurchaseRequestResult {
    pub purchase_request: PurchaseRequestDetail,
    pub purchase_order: PurchaseOrderDetail,
}

#[async_trait]
impl Command for ConvertPurchaseRequestCommand {
    type Result = ConvertPurchaseRequestResult;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let result = self.convert(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("convert_purchase_request", e.kind());
            warn!(error = %e, "Failed to convert purchase request");
            e
        })?;

        let po = &result.purchase_order.header;
        info!(
            purchase_request_id = %self.purchase_request_id,
            purchase_order_id = %po.id,
            po_number = %po.po_number,
            lines = result.purchase_order.lines.len(),
            "Purchase request converted to purchase order"
        );
        event_sender
            .send_or_log(Event::PurchaseOrderCreated {
                purchase_order_id: po.id,
                project_id: po.project_id,
                po_number: po.po_number.clone(),
            })
            .await;
        event_sender
            .send_or_log(Event::PurchaseRequestConverted {
                purchase_request_id: self.purchase_request_id,
                purchase_order_id: po.id,
            })
            .await;

        Ok(result)
    }
}

impl ConvertPurchaseRequestCommand {
    async fn convert(
        &self,
        db: &DatabaseConnection,
    ) -> Result<ConvertPurchaseRequestResult, ServiceError> {
        let txn = db::begin(db).await?;
        let actor = authorization::resolve_actor(&txn, self.actor_id).await?;
        let pr = lock_purchase_request(&txn, self.purchase_request_id).await?;

        if let Some(po_id) = pr.converted_po_id {
            return Err(ServiceError::Conflict(format!(
                "purchase request {} was already converted to purchase order {}",
                pr.pr_number, po_id
            )));
        }
        if pr.status != PurchaseRequestStatus::Approved {
            return Err(ServiceError::InvalidState(format!(
                "purchase request {} must be approved before conversion (currently {})",
                pr.pr_number,
                pr.status.as_str()
            )));
        }

        let request = detail_for(&txn, pr).await?;
        let source_lines: Vec<_> = request.active_lines().cloned().collect();
        if source_lines.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "purchase request {} has no active lines to convert",
                request.header.pr_number
            )));
        }

        let policy = settings::load(&txn).await?;
        authorization::ensure(
            authorization::can_issue_po(actor.role)
                || authorization::can_approve_pr(actor.role, request.total, &policy.approval()),
            &actor,
            Action::ConvertPurchaseRequest,
        )?;
        references::require_active_vendor(&txn, self.vendor_id).await?;

        let now = Utc::now();
        let category = DocumentCategory::PurchaseOrder;
        let po_number =
            numbering::allocate(&txn, category, policy.scheme_for(category), now).await?;
        let ship_to = self.ship_to.clone().unwrap_or_default();

        let po = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(request.header.project_id),
            vendor_id: Set(self.vendor_id),
            po_number: Set(po_number),
            status: Set(PurchaseOrderStatus::Draft),
            source_pr_id: Set(Some(request.header.id)),
            ship_to_name: Set(normalize_text(ship_to.name.as_deref())),
            ship_to_address1: Set(normalize_text(ship_to.address1.as_deref())),
            ship_to_address2: Set(normalize_text(ship_to.address2.as_deref())),
            ship_to_city: Set(normalize_text(ship_to.city.as_deref())),
            ship_to_state: Set(normalize_text(ship_to.state.as_deref())),
            ship_to_postal_code: Set(normalize_text(ship_to.postal_code.as_deref())),
            needed_by: Set(request.header.needed_by),
            freight_estimate: Set(None),
            tax_estimate: Set(None),
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

        for line in &source_lines {
            purchase_order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_order_id: Set(po.id),
                description: Set(line.description.clone()),
                quantity: Set(line.quantity),
                uom: Set(line.uom.clone()),
                unit_cost: Set(line.est_unit_cost.unwrap_or(Decimal::ZERO)),
                line_status: Set(PurchaseOrderLineStatus::Open),
                source_pr_line_id: Set(Some(line.id)),
                catalog_item_id: Set(line.catalog_item_id),
                sov_line_id: Set(line.sov_line_id),
                timeline_task_id: Set(line.timeline_task_id),
                sort_order: Set(line.sort_order),
                is_active: Set(true),
                created_at: Set(now),
                created_by: Set(self.actor_id),
                updated_at: Set(now),
                updated_by: Set(self.actor_id),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        let mut active: purchase_request::ActiveModel = request.header.clone().into();
        active.converted_po_id = Set(Some(po.id));
        active.converted_at = Set(Some(now));
        active.converted_by = Set(Some(self.actor_id));
        active.updated_at = Set(now);
        active.updated_by = Set(self.actor_id);
        let pr = active.update(&txn).await.map_err(ServiceError::db_error)?;

        audit::record(
            &txn,
            AuditEntry::new(
                AuditEntityType::PurchaseRequest,
                pr.id,
                self.actor_id,
                "converted to PO",
            )
            .project(pr.project_id)
            .metadata(serde_json::json!({
                "purchase_order_id": po.id,
                "po_number": po.po_number,
                "line_count": source_lines.len(),
            })),
        )
        .await?;
        audit::record(
            &txn,
            AuditEntry::new(
                AuditEntityType::PurchaseOrder,
                po.id,
                self.actor_id,
                "created from PR",
            )
            .project(po.project_id)
            .transition(None, Some(PurchaseOrderStatus::Draft.as_str()))
            .metadata(serde_json::json!({
                "purchase_request_id": pr.id,
                "pr_number": pr.pr_number,
            })),
        )
        .await?;

        let purchase_order = po_service::detail_for(&txn, po).await?;
        let purchase_request = PurchaseRequestDetail {
            header: pr,
            ..request
        };
        db::commit(txn).await?;
        metrics::record_transition("purchase_order", PurchaseOrderStatus::Draft.as_str());

        Ok(ConvertPurchaseRequestResult {
            purchase_request,
            purchase_order,
        })
    }
}

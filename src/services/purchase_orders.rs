use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    commands::purchaseorders::{
        CreatePurchaseOrderCommand, RefreshPurchaseOrderReceiptStatusCommand,
        SetPurchaseOrderStatusCommand, UpsertPurchaseOrderLineCommand,
    },
    commands::Command,
    db::DbPool,
    entities::{
        purchase_order::{self, Entity as PurchaseOrder, PurchaseOrderStatus},
        purchase_order_line::{self, Entity as PurchaseOrderLine},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry},
        coverage::{self, CoverageState},
    },
};

/// A purchase order header together with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderDetail {
    pub header: purchase_order::Model,
    pub lines: Vec<purchase_order_line::Model>,
    /// Σ quantity × unit cost over active lines.
    pub total: Decimal,
}

pub fn active_total(lines: &[purchase_order_line::Model]) -> Decimal {
    lines
        .iter()
        .filter(|l| l.is_active)
        .map(|l| l.extended_cost())
        .sum()
}

pub(crate) async fn lock_purchase_order<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<purchase_order::Model, ServiceError> {
    PurchaseOrder::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Purchase order", id))
}

pub(crate) async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    purchase_order_id: Uuid,
) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
    PurchaseOrderLine::find()
        .filter(purchase_order_line::Column::PurchaseOrderId.eq(purchase_order_id))
        .order_by_asc(purchase_order_line::Column::SortOrder)
        .order_by_asc(purchase_order_line::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

pub(crate) async fn detail_for<C: ConnectionTrait>(
    conn: &C,
    header: purchase_order::Model,
) -> Result<PurchaseOrderDetail, ServiceError> {
    let lines = load_lines(conn, header.id).await?;
    let total = active_total(&lines);
    Ok(PurchaseOrderDetail {
        header,
        lines,
        total,
    })
}

/// Validates a lifecycle move against the transition table.
pub fn ensure_transition(
    po: &purchase_order::Model,
    next: PurchaseOrderStatus,
) -> Result<(), ServiceError> {
    if po.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "purchase order {} cannot move from {} to {}",
            po.po_number,
            po.status.as_str(),
            next.as_str()
        )))
    }
}

/// Status a PO should move to given its receipt coverage, if any.
pub fn receipt_driven_status(
    current: PurchaseOrderStatus,
    coverage: CoverageState,
) -> Option<PurchaseOrderStatus> {
    if !matches!(
        current,
        PurchaseOrderStatus::Issued
            | PurchaseOrderStatus::Acknowledged
            | PurchaseOrderStatus::PartiallyReceived
    ) {
        return None;
    }
    let target = match coverage {
        CoverageState::Received => PurchaseOrderStatus::Received,
        CoverageState::Partial => PurchaseOrderStatus::PartiallyReceived,
        CoverageState::NotReceived | CoverageState::Unknown => return None,
    };
    (target != current && current.can_transition_to(target)).then_some(target)
}

/// Re-derives `partially_received` / `received` from coverage and applies it
/// inside `txn`. Writes one log entry when the status moves.
pub(crate) async fn refresh_receipt_status(
    txn: &DatabaseTransaction,
    purchase_order_id: Uuid,
    actor_id: Uuid,
) -> Result<Option<Event>, ServiceError> {
    let po = lock_purchase_order(txn, purchase_order_id).await?;
    let summary = coverage::compute_po_coverage(txn, &po).await?;
    let Some(next) = receipt_driven_status(po.status, summary.receipt_state) else {
        return Ok(None);
    };

    let previous = po.status;
    let mut active: purchase_order::ActiveModel = po.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now());
    active.updated_by = Set(actor_id);
    let po = active.update(txn).await.map_err(ServiceError::db_error)?;

    audit::record(
        txn,
        AuditEntry::new(
            AuditEntityType::PurchaseOrder,
            po.id,
            actor_id,
            "status updated from receipts",
        )
        .project(po.project_id)
        .transition(Some(previous.as_str()), Some(next.as_str()))
        .metadata(json!({ "coverage": summary.counts })),
    )
    .await?;
    metrics::record_transition("purchase_order", next.as_str());
    info!(
        purchase_order_id = %po.id,
        from = previous.as_str(),
        to = next.as_str(),
        "Purchase order status derived from receipts"
    );

    Ok(Some(Event::PurchaseOrderStatusChanged {
        purchase_order_id: po.id,
        old_status: previous.as_str().to_string(),
        new_status: next.as_str().to_string(),
    }))
}

#[derive(Clone)]
pub struct PurchaseOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PurchaseOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        command: CreatePurchaseOrderCommand,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn upsert_line(
        &self,
        command: UpsertPurchaseOrderLineCommand,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        command: SetPurchaseOrderStatusCommand,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn refresh_receipt_status(
        &self,
        command: RefreshPurchaseOrderReceiptStatusCommand,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<PurchaseOrderDetail, ServiceError> {
        let db = &*self.db_pool;
        let header = PurchaseOrder::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Purchase order", id))?;
        detail_for(db, header).await
    }

    /// The PO created from a purchase request, if it has been converted.
    #[instrument(skip(self))]
    pub async fn find_by_source_pr(
        &self,
        purchase_request_id: Uuid,
    ) -> Result<Option<purchase_order::Model>, ServiceError> {
        PurchaseOrder::find()
            .filter(purchase_order::Column::SourcePrId.eq(purchase_request_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn list_for_project(
        &self,
        project_id: Uuid,
        status: Option<PurchaseOrderStatus>,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        let mut query =
            PurchaseOrder::find().filter(purchase_order::Column::ProjectId.eq(project_id));
        if let Some(status) = status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }
        query
            .order_by_desc(purchase_order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PurchaseOrderStatus::*;

    #[test]
    fn transition_table() {
        assert!(Draft.can_transition_to(Issued));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(!Draft.can_transition_to(Received));
        assert!(Issued.can_transition_to(Received));
        assert!(Acknowledged.can_transition_to(PartiallyReceived));
        assert!(PartiallyReceived.can_transition_to(Closed));
        assert!(Received.can_transition_to(Closed));
        assert!(Received.can_transition_to(Cancelled));
        assert!(!Closed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Draft));
        assert!(!PartiallyReceived.can_transition_to(Issued));
    }

    #[test]
    fn receipt_coverage_only_moves_open_orders_forward() {
        assert_eq!(
            receipt_driven_status(Issued, CoverageState::Partial),
            Some(PartiallyReceived)
        );
        assert_eq!(
            receipt_driven_status(PartiallyReceived, CoverageState::Received),
            Some(Received)
        );
        assert_eq!(receipt_driven_status(PartiallyReceived, CoverageState::Partial), None);
        assert_eq!(receipt_driven_status(PartiallyReceived, CoverageState::NotReceived), None);
        assert_eq!(receipt_driven_status(Draft, CoverageState::Received), None);
        assert_eq!(receipt_driven_status(Received, CoverageState::Partial), None);
    }
}

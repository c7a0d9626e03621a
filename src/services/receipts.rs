use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    commands::receipts::{
        CancelReceiptCommand, CreateReceiptCommand, MarkReceiptReceivedCommand,
        ReconcileReceiptCommand, UpsertReceiptLineCommand,
    },
    commands::Command,
    db::DbPool,
    entities::{
        purchase_order_line::{self, Entity as PurchaseOrderLine},
        receipt::{self, Entity as Receipt, ReceiptStatus},
        receipt_line::{self, Entity as ReceiptLine},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::purchase_orders,
};

/// A receipt header together with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptDetail {
    pub header: receipt::Model,
    pub lines: Vec<receipt_line::Model>,
    /// Lines received without a PO line to reconcile against.
    pub unlinked_count: usize,
}

pub fn unlinked_count(lines: &[receipt_line::Model]) -> usize {
    lines
        .iter()
        .filter(|l| l.purchase_order_line_id.is_none())
        .count()
}

pub(crate) async fn lock_receipt<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<receipt::Model, ServiceError> {
    Receipt::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Receipt", id))
}

pub(crate) async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    receipt_id: Uuid,
) -> Result<Vec<receipt_line::Model>, ServiceError> {
    ReceiptLine::find()
        .filter(receipt_line::Column::ReceiptId.eq(receipt_id))
        .order_by_asc(receipt_line::Column::CreatedAt)
        .order_by_asc(receipt_line::Column::Id)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

pub(crate) async fn detail_for<C: ConnectionTrait>(
    conn: &C,
    header: receipt::Model,
) -> Result<ReceiptDetail, ServiceError> {
    let lines = load_lines(conn, header.id).await?;
    Ok(ReceiptDetail {
        unlinked_count: unlinked_count(&lines),
        header,
        lines,
    })
}

/// Every PO a receipt touches: its header PO plus the orders owning the
/// PO lines its lines are linked to.
pub(crate) async fn referenced_purchase_orders<C: ConnectionTrait>(
    conn: &C,
    receipt: &receipt::Model,
    lines: &[receipt_line::Model],
) -> Result<Vec<Uuid>, ServiceError> {
    let mut ids: BTreeSet<Uuid> = receipt.purchase_order_id.into_iter().collect();
    let po_line_ids: Vec<Uuid> = lines
        .iter()
        .filter_map(|l| l.purchase_order_line_id)
        .collect();
    if !po_line_ids.is_empty() {
        let po_lines = PurchaseOrderLine::find()
            .filter(purchase_order_line::Column::Id.is_in(po_line_ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;
        ids.extend(po_lines.into_iter().map(|l| l.purchase_order_id));
    }
    Ok(ids.into_iter().collect())
}

/// Re-derives receiving status for every PO the receipt references.
pub(crate) async fn refresh_referenced_orders(
    txn: &DatabaseTransaction,
    receipt: &receipt::Model,
    lines: &[receipt_line::Model],
    actor_id: Uuid,
) -> Result<Vec<Event>, ServiceError> {
    let mut events = Vec::new();
    for po_id in referenced_purchase_orders(txn, receipt, lines).await? {
        if let Some(event) = purchase_orders::refresh_receipt_status(txn, po_id, actor_id).await? {
            events.push(event);
        }
    }
    Ok(events)
}

#[derive(Clone)]
pub struct ReceiptService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReceiptService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, command: CreateReceiptCommand) -> Result<ReceiptDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn upsert_line(
        &self,
        command: UpsertReceiptLineCommand,
    ) -> Result<ReceiptDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn mark_received(
        &self,
        command: MarkReceiptReceivedCommand,
    ) -> Result<ReceiptDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        command: ReconcileReceiptCommand,
    ) -> Result<ReceiptDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, command: CancelReceiptCommand) -> Result<ReceiptDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<ReceiptDetail, ServiceError> {
        let db = &*self.db_pool;
        let header = Receipt::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Receipt", id))?;
        detail_for(db, header).await
    }

    #[instrument(skip(self))]
    pub async fn list_for_purchase_order(
        &self,
        purchase_order_id: Uuid,
    ) -> Result<Vec<receipt::Model>, ServiceError> {
        Receipt::find()
            .filter(receipt::Column::PurchaseOrderId.eq(purchase_order_id))
            .order_by_asc(receipt::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn list_for_project(
        &self,
        project_id: Uuid,
        status: Option<ReceiptStatus>,
    ) -> Result<Vec<receipt::Model>, ServiceError> {
        let mut query = Receipt::find().filter(receipt::Column::ProjectId.eq(project_id));
        if let Some(status) = status {
            query = query.filter(receipt::Column::Status.eq(status));
        }
        query
            .order_by_desc(receipt::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

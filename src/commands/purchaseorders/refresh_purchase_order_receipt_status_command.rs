use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    db::{self, DbPool},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        authorization::{self, Action},
        purchase_orders::{self, detail_for, lock_purchase_order, PurchaseOrderDetail},
    },
};

/// Re-derives a PO's receiving status from its receipt coverage.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshPurchaseOrderReceiptStatusCommand {
    pub purchase_order_id: Uuid,
    pub actor_id: Uuid,
}

#[async_trait]
impl Command for RefreshPurchaseOrderReceiptStatusCommand {
    type Result = PurchaseOrderDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_order_id = %self.purchase_order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let (detail, event) = self.refresh(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("refresh_purchase_order_receipt_status", e.kind());
            warn!(error = %e, "Failed to refresh purchase order receipt status");
            e
        })?;

        if let Some(event) = event {
            event_sender.send_or_log(event).await;
        }
        Ok(detail)
    }
}

impl RefreshPurchaseOrderReceiptStatusCommand {
    async fn refresh(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(PurchaseOrderDetail, Option<Event>), ServiceError> {
        let txn = db::begin(db).await?;
        let actor = authorization::resolve_actor(&txn, self.actor_id).await?;
        authorization::ensure(
            authorization::can_receive(actor.role) || authorization::can_issue_po(actor.role),
            &actor,
            Action::ChangePurchaseOrderStatus,
        )?;

        let event =
            purchase_orders::refresh_receipt_status(&txn, self.purchase_order_id, self.actor_id)
                .await?;
        let po = lock_purchase_order(&txn, self.purchase_order_id).await?;
        let detail = detail_for(&txn, po).await?;
        db::commit(txn).await?;
        Ok((detail, event))
    }
}

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::{
        receipts::{apply_status, publish_all},
        Command,
    },
    common::entry_message,
    db::{self, DbPool},
    entities::receipt::ReceiptStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        authorization::{self, Action},
        receipts::{detail_for, load_lines, lock_receipt, refresh_referenced_orders, ReceiptDetail},
    },
};

/// Voids a receipt that has not been reconciled. Its quantities stop
/// counting toward coverage.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelReceiptCommand {
    pub receipt_id: Uuid,
    pub actor_id: Uuid,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

#[async_trait]
impl Command for CancelReceiptCommand {
    type Result = ReceiptDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(receipt_id = %self.receipt_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (detail, events) = self.cancel(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("cancel_receipt", e.kind());
            warn!(error = %e, "Failed to cancel receipt");
            e
        })?;

        info!(receipt_id = %detail.header.id, "Receipt cancelled");
        publish_all(&event_sender, events).await;
        Ok(detail)
    }
}

impl CancelReceiptCommand {
    async fn cancel(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(ReceiptDetail, Vec<Event>), ServiceError> {
        let txn = db::begin(db).await?;
        let actor = authorization::resolve_actor(&txn, self.actor_id).await?;
        authorization::ensure(
            authorization::can_receive(actor.role) || authorization::can_reconcile(actor.role),
            &actor,
            Action::CancelReceipt,
        )?;
        let receipt = lock_receipt(&txn, self.receipt_id).await?;

        if !matches!(
            receipt.status,
            ReceiptStatus::Pending | ReceiptStatus::Received
        ) {
            return Err(ServiceError::InvalidState(format!(
                "receipt {} is {} and cannot be cancelled",
                receipt.receipt_number,
                receipt.status.as_str()
            )));
        }

        let lines = load_lines(&txn, receipt.id).await?;
        let next = ReceiptStatus::Cancelled;
        let (receipt, event) = apply_status(
            &txn,
            receipt,
            next,
            self.actor_id,
            entry_message(self.message.as_deref(), next.as_str()),
            serde_json::json!({ "line_count": lines.len() }),
            Utc::now(),
        )
        .await?;

        let mut events = vec![event];
        events.extend(refresh_referenced_orders(&txn, &receipt, &lines, self.actor_id).await?);

        let detail = detail_for(&txn, receipt).await?;
        db::commit(txn).await?;
        Ok((detail, events))
    }
}

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
        receipts::{
            detail_for, load_lines, lock_receipt, refresh_referenced_orders, unlinked_count,
            ReceiptDetail,
        },
    },
};

/// Records that the goods on a pending receipt arrived. Fully linked
/// receipts go straight to `reconciled`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MarkReceiptReceivedCommand {
    pub receipt_id: Uuid,
    pub actor_id: Uuid,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

/// Target state for a pending receipt given how many of its lines are blind.
pub fn received_target(unlinked: usize) -> ReceiptStatus {
    if unlinked > 0 {
        ReceiptStatus::Received
    } else {
        ReceiptStatus::Reconciled
    }
}

#[async_trait]
impl Command for MarkReceiptReceivedCommand {
    type Result = ReceiptDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(receipt_id = %self.receipt_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (detail, events) = self.mark_received(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("mark_receipt_received", e.kind());
            warn!(error = %e, "Failed to mark receipt received");
            e
        })?;

        if !events.is_empty() {
            info!(
                receipt_id = %detail.header.id,
                status = detail.header.status.as_str(),
                unlinked = detail.unlinked_count,
                "Receipt received"
            );
        }
        publish_all(&event_sender, events).await;
        Ok(detail)
    }
}

impl MarkReceiptReceivedCommand {
    async fn mark_received(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(ReceiptDetail, Vec<Event>), ServiceError> {
        let txn = db::begin(db).await?;
        let actor = authorization::resolve_actor(&txn, self.actor_id).await?;
        authorization::ensure(
            authorization::can_receive(actor.role),
            &actor,
            Action::ReceiveGoods,
        )?;
        let receipt = lock_receipt(&txn, self.receipt_id).await?;

        match receipt.status {
            ReceiptStatus::Pending => {}
            ReceiptStatus::Received => {
                let detail = detail_for(&txn, receipt).await?;
                db::commit(txn).await?;
                return Ok((detail, Vec::new()));
            }
            other => {
                return Err(ServiceError::InvalidState(format!(
                    "receipt {} is {} and cannot be marked received",
                    receipt.receipt_number,
                    other.as_str()
                )));
            }
        }

        let lines = load_lines(&txn, receipt.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "receipt {} has no lines",
                receipt.receipt_number
            )));
        }

        let unlinked = unlinked_count(&lines);
        let next = received_target(unlinked);
        let (receipt, event) = apply_status(
            &txn,
            receipt,
            next,
            self.actor_id,
            entry_message(self.message.as_deref(), next.as_str()),
            serde_json::json!({
                "line_count": lines.len(),
                "unlinked_count": unlinked,
            }),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blind_lines_hold_receipt_at_received() {
        assert_eq!(received_target(0), ReceiptStatus::Reconciled);
        assert_eq!(received_target(1), ReceiptStatus::Received);
        assert_eq!(received_target(7), ReceiptStatus::Received);
    }
}

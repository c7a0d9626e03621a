pub mod cancel_receipt_command;
pub mod create_receipt_command;
pub mod mark_receipt_received_command;
pub mod reconcile_receipt_command;
pub mod upsert_receipt_line_command;

pub use cancel_receipt_command::CancelReceiptCommand;
pub use create_receipt_command::CreateReceiptCommand;
pub use mark_receipt_received_command::MarkReceiptReceivedCommand;
pub use reconcile_receipt_command::ReconcileReceiptCommand;
pub use upsert_receipt_line_command::UpsertReceiptLineCommand;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    entities::{
        receipt::{self, ReceiptStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::audit::{self, AuditEntry},
};

/// Moves a locked receipt to `next` and appends its log entry.
pub(crate) async fn apply_status(
    txn: &DatabaseTransaction,
    receipt: receipt::Model,
    next: ReceiptStatus,
    actor_id: Uuid,
    message: String,
    metadata: Value,
    now: DateTime<Utc>,
) -> Result<(receipt::Model, Event), ServiceError> {
    let previous = receipt.status;
    let stamp_received = receipt.received_at.is_none()
        && matches!(next, ReceiptStatus::Received | ReceiptStatus::Reconciled);

    let mut active: receipt::ActiveModel = receipt.into();
    active.status = Set(next);
    active.updated_at = Set(now);
    active.updated_by = Set(actor_id);
    if stamp_received {
        active.received_at = Set(Some(now));
        active.received_by = Set(Some(actor_id));
    }
    let receipt = active.update(txn).await.map_err(ServiceError::db_error)?;

    audit::record(
        txn,
        AuditEntry::new(AuditEntityType::Receipt, receipt.id, actor_id, message)
            .project(receipt.project_id)
            .transition(Some(previous.as_str()), Some(next.as_str()))
            .metadata(metadata),
    )
    .await?;
    metrics::record_transition("receipt", next.as_str());

    let event = Event::ReceiptStatusChanged {
        receipt_id: receipt.id,
        old_status: previous.as_str().to_string(),
        new_status: next.as_str().to_string(),
    };
    Ok((receipt, event))
}

/// Publishes a receipt's own event followed by any PO refresh events.
pub(crate) async fn publish_all(event_sender: &EventSender, events: Vec<Event>) {
    for event in events {
        event_sender.send_or_log(event).await;
    }
}

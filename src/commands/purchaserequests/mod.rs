use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use uuid::Uuid;

use crate::{
    entities::{
        purchase_request::{self, PurchaseRequestStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::Event,
    metrics,
    services::audit::{self, AuditEntry},
};

mod approve_purchase_request_command;
mod convert_purchase_request_command;
mod create_purchase_request_command;
mod reject_purchase_request_command;
mod submit_purchase_request_command;
mod update_purchase_request_header_command;
mod upsert_purchase_request_line_command;

pub use approve_purchase_request_command::ApprovePurchaseRequestCommand;
pub use convert_purchase_request_command::{
    ConvertPurchaseRequestCommand, ConvertPurchaseRequestResult, ShipTo,
};
pub use create_purchase_request_command::CreatePurchaseRequestCommand;
pub use reject_purchase_request_command::RejectPurchaseRequestCommand;
pub use submit_purchase_request_command::SubmitPurchaseRequestCommand;
pub use update_purchase_request_header_command::UpdatePurchaseRequestHeaderCommand;
pub use upsert_purchase_request_line_command::UpsertPurchaseRequestLineCommand;

/// Marks the PR as touched by `actor_id`. When it was approved, the approval
/// is withdrawn and the request goes back to `submitted`, with its own log
/// entry naming `reason`.
///
/// Returns the updated header and, when a reset happened, the event to
/// publish after commit.
pub(crate) async fn touch_and_reset_approval(
    txn: &DatabaseTransaction,
    pr: purchase_request::Model,
    actor_id: Uuid,
    now: DateTime<Utc>,
    reason: &str,
) -> Result<(purchase_request::Model, Option<Event>), ServiceError> {
    let was_approved = pr.status == PurchaseRequestStatus::Approved;
    let approved_by = pr.approved_by;
    let (pr_id, project_id) = (pr.id, pr.project_id);

    let mut active: purchase_request::ActiveModel = pr.into();
    active.updated_at = Set(now);
    active.updated_by = Set(actor_id);
    if was_approved {
        active.status = Set(PurchaseRequestStatus::Submitted);
        active.approved_by = Set(None);
        active.approved_at = Set(None);
    }
    let updated = active.update(txn).await.map_err(ServiceError::db_error)?;

    if !was_approved {
        return Ok((updated, None));
    }

    audit::record(
        txn,
        AuditEntry::new(AuditEntityType::PurchaseRequest, pr_id, actor_id, reason)
            .project(project_id)
            .transition(
                Some(PurchaseRequestStatus::Approved.as_str()),
                Some(PurchaseRequestStatus::Submitted.as_str()),
            )
            .metadata(serde_json::json!({ "previous_approver": approved_by })),
    )
    .await?;
    metrics::record_transition("purchase_request", PurchaseRequestStatus::Submitted.as_str());

    Ok((updated, Some(Event::PurchaseRequestApprovalReset(pr_id))))
}

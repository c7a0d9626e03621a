use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    common::entry_message,
    db::{self, DbPool},
    entities::{
        purchase_request::{self, PurchaseRequestStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry},
        authorization::{self, Action},
        purchase_requests::{
            detail_for, ensure_not_converted, lock_purchase_request, PurchaseRequestDetail,
        },
        settings,
    },
};

/// Rejection uses the same authority as approval for the request's total.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RejectPurchaseRequestCommand {
    pub purchase_request_id: Uuid,
    pub actor_id: Uuid,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

#[async_trait]
impl Command for RejectPurchaseRequestCommand {
    type Result = PurchaseRequestDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (detail, previous) = self.reject(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("reject_purchase_request", e.kind());
            warn!(error = %e, "Failed to reject purchase request");
            e
        })?;

        info!(purchase_request_id = %detail.header.id, "Purchase request rejected");
        event_sender
            .send_or_log(Event::PurchaseRequestStatusChanged {
                purchase_request_id: detail.header.id,
                old_status: previous.as_str().to_string(),
                new_status: PurchaseRequestStatus::Rejected.as_str().to_string(),
            })
            .await;
        Ok(detail)
    }
}

impl RejectPurchaseRequestCommand {
    async fn reject(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(PurchaseRequestDetail, PurchaseRequestStatus), ServiceError> {
        let txn = db::begin(db).await?;
        let actor = authorization::resolve_actor(&txn, self.actor_id).await?;
        let pr = lock_purchase_request(&txn, self.purchase_request_id).await?;
        ensure_not_converted(&pr)?;

        let previous = pr.status;
        if !matches!(
            previous,
            PurchaseRequestStatus::Submitted | PurchaseRequestStatus::Approved
        ) {
            return Err(ServiceError::InvalidState(format!(
                "cannot reject purchase request {} from status {}",
                pr.pr_number,
                previous.as_str()
            )));
        }

        let detail = detail_for(&txn, pr).await?;
        let policy = settings::load(&txn).await?.approval();
        authorization::ensure(
            authorization::can_approve_pr(actor.role, detail.total, &policy),
            &actor,
            Action::RejectPurchaseRequest,
        )?;

        let now = Utc::now();
        let mut active: purchase_request::ActiveModel = detail.header.clone().into();
        active.status = Set(PurchaseRequestStatus::Rejected);
        active.approved_by = Set(None);
        active.approved_at = Set(None);
        active.updated_at = Set(now);
        active.updated_by = Set(self.actor_id);
        let pr = active.update(&txn).await.map_err(ServiceError::db_error)?;

        audit::record(
            &txn,
            AuditEntry::new(
                AuditEntityType::PurchaseRequest,
                pr.id,
                self.actor_id,
                entry_message(self.message.as_deref(), "rejected"),
            )
            .project(pr.project_id)
            .transition(
                Some(previous.as_str()),
                Some(PurchaseRequestStatus::Rejected.as_str()),
            )
            .metadata(serde_json::json!({ "total": detail.total })),
        )
        .await?;

        let detail = PurchaseRequestDetail {
            header: pr,
            ..detail
        };
        db::commit(txn).await?;
        metrics::record_transition("purchase_request", PurchaseRequestStatus::Rejected.as_str());
        Ok((detail, previous))
    }
}

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

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApprovePurchaseRequestCommand {
    pub purchase_request_id: Uuid,
    pub actor_id: Uuid,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

#[async_trait]
impl Command for ApprovePurchaseRequestCommand {
    type Result = PurchaseRequestDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let detail = self.approve(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("approve_purchase_request", e.kind());
            warn!(error = %e, "Failed to approve purchase request");
            e
        })?;

        info!(
            purchase_request_id = %detail.header.id,
            approver = %self.actor_id,
            total = %detail.total,
            "Purchase request approved"
        );
        event_sender
            .send_or_log(Event::PurchaseRequestStatusChanged {
                purchase_request_id: detail.header.id,
                old_status: PurchaseRequestStatus::Submitted.as_str().to_string(),
                new_status: PurchaseRequestStatus::Approved.as_str().to_string(),
            })
            .await;
        Ok(detail)
    }
}

impl ApprovePurchaseRequestCommand {
    async fn approve(&self, db: &DatabaseConnection) -> Result<PurchaseRequestDetail, ServiceError> {
        let txn = db::begin(db).await?;
        let actor = authorization::resolve_actor(&txn, self.actor_id).await?;
        let pr = lock_purchase_request(&txn, self.purchase_request_id).await?;
        ensure_not_converted(&pr)?;

        if pr.status != PurchaseRequestStatus::Submitted {
            return Err(ServiceError::InvalidState(format!(
                "purchase request {} must be submitted to be approved (currently {})",
                pr.pr_number,
                pr.status.as_str()
            )));
        }

        let detail = detail_for(&txn, pr).await?;
        let policy = settings::load(&txn).await?.approval();
        authorization::ensure(
            authorization::can_approve_pr(actor.role, detail.total, &policy),
            &actor,
            Action::ApprovePurchaseRequest,
        )?;

        let now = Utc::now();
        let mut active: purchase_request::ActiveModel = detail.header.clone().into();
        active.status = Set(PurchaseRequestStatus::Approved);
        active.approved_by = Set(Some(self.actor_id));
        active.approved_at = Set(Some(now));
        active.updated_at = Set(now);
        active.updated_by = Set(self.actor_id);
        let pr = active.update(&txn).await.map_err(ServiceError::db_error)?;

        audit::record(
            &txn,
            AuditEntry::new(
                AuditEntityType::PurchaseRequest,
                pr.id,
                self.actor_id,
                entry_message(self.message.as_deref(), "approved"),
            )
            .project(pr.project_id)
            .transition(
                Some(PurchaseRequestStatus::Submitted.as_str()),
                Some(PurchaseRequestStatus::Approved.as_str()),
            )
            .metadata(serde_json::json!({
                "total": detail.total,
                "threshold": policy.threshold,
                "approver_role": actor.role.as_str(),
            })),
        )
        .await?;

        let detail = PurchaseRequestDetail {
            header: pr,
            ..detail
        };
        db::commit(txn).await?;
        metrics::record_transition("purchase_request", PurchaseRequestStatus::Approved.as_str());
        Ok(detail)
    }
}

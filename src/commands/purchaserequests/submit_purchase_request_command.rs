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
        authorization,
        purchase_requests::{
            detail_for, ensure_not_converted, lock_purchase_request, PurchaseRequestDetail,
        },
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitPurchaseRequestCommand {
    pub purchase_request_id: Uuid,
    pub actor_id: Uuid,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

#[async_trait]
impl Command for SubmitPurchaseRequestCommand {
    type Result = PurchaseRequestDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (detail, changed) = self.submit(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("submit_purchase_request", e.kind());
            warn!(error = %e, "Failed to submit purchase request");
            e
        })?;

        if changed {
            info!(purchase_request_id = %detail.header.id, "Purchase request submitted");
            event_sender
                .send_or_log(Event::PurchaseRequestStatusChanged {
                    purchase_request_id: detail.header.id,
                    old_status: PurchaseRequestStatus::Draft.as_str().to_string(),
                    new_status: PurchaseRequestStatus::Submitted.as_str().to_string(),
                })
                .await;
        }
        Ok(detail)
    }
}

impl SubmitPurchaseRequestCommand {
    async fn submit(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(PurchaseRequestDetail, bool), ServiceError> {
        let txn = db::begin(db).await?;
        authorization::resolve_actor(&txn, self.actor_id).await?;
        let pr = lock_purchase_request(&txn, self.purchase_request_id).await?;
        ensure_not_converted(&pr)?;

        match pr.status {
            PurchaseRequestStatus::Draft => {}
            PurchaseRequestStatus::Submitted => {
                let detail = detail_for(&txn, pr).await?;
                db::commit(txn).await?;
                return Ok((detail, false));
            }
            other => {
                return Err(ServiceError::InvalidState(format!(
                    "cannot submit purchase request {} from status {}",
                    pr.pr_number,
                    other.as_str()
                )))
            }
        }

        let detail = detail_for(&txn, pr).await?;
        if detail.active_lines().next().is_none() {
            return Err(ServiceError::ValidationError(format!(
                "purchase request {} needs at least one active line before it can be submitted",
                detail.header.pr_number
            )));
        }

        let now = Utc::now();
        let mut active: purchase_request::ActiveModel = detail.header.clone().into();
        active.status = Set(PurchaseRequestStatus::Submitted);
        active.updated_at = Set(now);
        active.updated_by = Set(self.actor_id);
        let pr = active.update(&txn).await.map_err(ServiceError::db_error)?;

        audit::record(
            &txn,
            AuditEntry::new(
                AuditEntityType::PurchaseRequest,
                pr.id,
                self.actor_id,
                entry_message(self.message.as_deref(), "submitted"),
            )
            .project(pr.project_id)
            .transition(
                Some(PurchaseRequestStatus::Draft.as_str()),
                Some(PurchaseRequestStatus::Submitted.as_str()),
            )
            .metadata(serde_json::json!({ "total": detail.total })),
        )
        .await?;

        let detail = PurchaseRequestDetail {
            header: pr,
            ..detail
        };
        db::commit(txn).await?;
        metrics::record_transition("purchase_request", PurchaseRequestStatus::Submitted.as_str());
        Ok((detail, true))
    }
}

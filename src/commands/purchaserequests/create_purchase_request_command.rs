use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    common::normalize_text,
    db::{self, DbPool},
    entities::{
        purchase_request::{self, PurchaseRequestPriority, PurchaseRequestStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry},
        authorization, numbering,
        numbering::DocumentCategory,
        purchase_requests::{detail_for, PurchaseRequestDetail},
        references, settings,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseRequestCommand {
    pub project_id: Uuid,
    pub actor_id: Uuid,
    pub needed_by: Option<NaiveDate>,
    pub priority: Option<PurchaseRequestPriority>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[async_trait]
impl Command for CreatePurchaseRequestCommand {
    type Result = PurchaseRequestDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(project_id = %self.project_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let detail = self.create_purchase_request(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("create_purchase_request", e.kind());
            warn!(error = %e, "Failed to create purchase request");
            e
        })?;

        info!(
            purchase_request_id = %detail.header.id,
            pr_number = %detail.header.pr_number,
            "Purchase request created"
        );
        event_sender
            .send_or_log(Event::PurchaseRequestCreated {
                purchase_request_id: detail.header.id,
                project_id: detail.header.project_id,
                pr_number: detail.header.pr_number.clone(),
            })
            .await;

        Ok(detail)
    }
}

impl CreatePurchaseRequestCommand {
    async fn create_purchase_request(
        &self,
        db: &DatabaseConnection,
    ) -> Result<PurchaseRequestDetail, ServiceError> {
        let txn = db::begin(db).await?;

        authorization::resolve_actor(&txn, self.actor_id).await?;
        references::require_active_project(&txn, self.project_id).await?;
        let policy = settings::load(&txn).await?;

        let now = Utc::now();
        let category = DocumentCategory::PurchaseRequest;
        let pr_number =
            numbering::allocate(&txn, category, policy.scheme_for(category), now).await?;

        let pr = purchase_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(self.project_id),
            pr_number: Set(pr_number),
            status: Set(PurchaseRequestStatus::Draft),
            requested_by: Set(self.actor_id),
            approved_by: Set(None),
            approved_at: Set(None),
            needed_by: Set(self.needed_by),
            priority: Set(self.priority.unwrap_or_default()),
            notes: Set(normalize_text(self.notes.as_deref())),
            converted_po_id: Set(None),
            converted_at: Set(None),
            converted_by: Set(None),
            created_at: Set(now),
            created_by: Set(self.actor_id),
            updated_at: Set(now),
            updated_by: Set(self.actor_id),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        audit::record(
            &txn,
            AuditEntry::new(AuditEntityType::PurchaseRequest, pr.id, self.actor_id, "created")
                .project(pr.project_id)
                .transition(None, Some(PurchaseRequestStatus::Draft.as_str()))
                .metadata(json!({ "pr_number": pr.pr_number })),
        )
        .await?;

        let detail = detail_for(&txn, pr).await?;
        db::commit(txn).await?;
        metrics::record_transition("purchase_request", PurchaseRequestStatus::Draft.as_str());
        Ok(detail)
    }
}

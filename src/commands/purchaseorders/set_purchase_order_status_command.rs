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
        actor::ActorRole,
        purchase_order::{self, PurchaseOrderStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::{
        audit::{self, AuditEntry},
        authorization::{self, Action},
        purchase_orders::{detail_for, ensure_transition, lock_purchase_order, PurchaseOrderDetail},
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetPurchaseOrderStatusCommand {
    pub purchase_order_id: Uuid,
    pub status: PurchaseOrderStatus,
    pub actor_id: Uuid,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

/// Receiving states may be set by receivers as well as buyers; every other
/// move needs purchase-order authority.
pub fn may_set_status(role: ActorRole, target: PurchaseOrderStatus) -> bool {
    match target {
        PurchaseOrderStatus::PartiallyReceived | PurchaseOrderStatus::Received => {
            authorization::can_receive(role) || authorization::can_issue_po(role)
        }
        _ => authorization::can_issue_po(role),
    }
}

#[async_trait]
impl Command for SetPurchaseOrderStatusCommand {
    type Result = PurchaseOrderDetail;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_order_id = %self.purchase_order_id, status = self.status.as_str()))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let (detail, previous) = self.set_status(db_pool.as_ref()).await.map_err(|e| {
            metrics::record_failure("set_purchase_order_status", e.kind());
            warn!(error = %e, "Failed to change purchase order status");
            e
        })?;

        if let Some(previous) = previous {
            info!(
                purchase_order_id = %detail.header.id,
                from = previous.as_str(),
                to = detail.header.status.as_str(),
                "Purchase order status changed"
            );
            event_sender
                .send_or_log(Event::PurchaseOrderStatusChanged {
                    purchase_order_id: detail.header.id,
                    old_status: previous.as_str().to_string(),
                    new_status: detail.header.status.as_str().to_string(),
                })
                .await;
        }
        Ok(detail)
    }
}

impl SetPurchaseOrderStatusCommand {
    async fn set_status(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(PurchaseOrderDetail, Option<PurchaseOrderStatus>), ServiceError> {
        let txn = db::begin(db).await?;
        let actor = authorization::resolve_actor(&txn, self.actor_id).await?;
        let po = lock_purchase_order(&txn, self.purchase_order_id).await?;

        if po.status == self.status {
            let detail = detail_for(&txn, po).await?;
            db::commit(txn).await?;
            return Ok((detail, None));
        }

        ensure_transition(&po, self.status)?;
        authorization::ensure(
            may_set_status(actor.role, self.status),
            &actor,
            Action::ChangePurchaseOrderStatus,
        )?;

        let now = Utc::now();
        let previous = po.status;
        let issued_at = po.issued_at;
        let acknowledged_at = po.acknowledged_at;

        let mut active: purchase_order::ActiveModel = po.into();
        active.status = Set(self.status);
        active.updated_at = Set(now);
        active.updated_by = Set(self.actor_id);
        match self.status {
            PurchaseOrderStatus::Issued if issued_at.is_none() => {
                active.issued_at = Set(Some(now));
            }
            PurchaseOrderStatus::Acknowledged => {
                if acknowledged_at.is_none() {
                    active.acknowledged_at = Set(Some(now));
                }
                if issued_at.is_none() {
                    active.issued_at = Set(Some(now));
                }
            }
            _ => {}
        }
        let po = active.update(&txn).await.map_err(ServiceError::db_error)?;

        audit::record(
            &txn,
            AuditEntry::new(
                AuditEntityType::PurchaseOrder,
                po.id,
                self.actor_id,
                entry_message(self.message.as_deref(), self.status.as_str()),
            )
            .project(po.project_id)
            .transition(Some(previous.as_str()), Some(self.status.as_str()))
            .metadata(serde_json::json!({ "actor_role": actor.role.as_str() })),
        )
        .await?;

        let detail = detail_for(&txn, po).await?;
        db::commit(txn).await?;
        metrics::record_transition("purchase_order", self.status.as_str());
        Ok((detail, Some(previous)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receivers_may_only_set_receiving_states() {
        assert!(may_set_status(ActorRole::Shop, PurchaseOrderStatus::Received));
        assert!(may_set_status(ActorRole::Super, PurchaseOrderStatus::PartiallyReceived));
        assert!(!may_set_status(ActorRole::Shop, PurchaseOrderStatus::Issued));
        assert!(!may_set_status(ActorRole::Shop, PurchaseOrderStatus::Closed));
        assert!(may_set_status(ActorRole::Purchasing, PurchaseOrderStatus::Received));
        assert!(may_set_status(ActorRole::Accounting, PurchaseOrderStatus::Cancelled));
        assert!(!may_set_status(ActorRole::Pm, PurchaseOrderStatus::Issued));
    }
}

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, QuerySelect, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    db::{self, DbPool},
    entities::actor::{self, ActorRole, Entity as Actor},
    errors::ServiceError,
    events::{Event, EventSender},
    services::authorization::{self, Action},
};

/// Role management. Roles drive every permission check, so only admin-tier
/// actors may change them.
#[derive(Clone)]
pub struct AdministrationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl AdministrationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn set_actor_role(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
        role: ActorRole,
    ) -> Result<actor::Model, ServiceError> {
        let txn = db::begin(&self.db_pool).await?;
        let actor = authorization::resolve_actor(&txn, actor_id).await?;
        authorization::ensure(
            authorization::can_administer(actor.role),
            &actor,
            Action::Administer,
        )?;

        let target = Actor::find_by_id(target_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Actor", target_id))?;

        if target.role == role {
            db::commit(txn).await?;
            return Ok(target);
        }

        let old_role = target.role;
        let mut active: actor::ActiveModel = target.into();
        active.role = Set(role);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;
        db::commit(txn).await?;

        info!(
            actor_id = %actor_id,
            target_id = %target_id,
            old_role = old_role.as_str(),
            new_role = role.as_str(),
            "Actor role changed"
        );
        self.event_sender
            .send_or_log(Event::ActorRoleChanged {
                actor_id: target_id,
                old_role: old_role.as_str().to_string(),
                new_role: role.as_str().to_string(),
            })
            .await;
        Ok(updated)
    }
}

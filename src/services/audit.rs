use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::status_log::{self, AuditEntityType, Entity as StatusLog},
    errors::ServiceError,
};

/// A status-log entry waiting to be appended.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub project_id: Option<Uuid>,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub message: String,
    pub metadata: Value,
    pub actor_id: Uuid,
}

impl AuditEntry {
    pub fn new(
        entity_type: AuditEntityType,
        entity_id: Uuid,
        actor_id: Uuid,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            project_id: None,
            from_status: None,
            to_status: None,
            message: message.into(),
            metadata: json!({}),
            actor_id,
        }
    }

    pub fn project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn transition(mut self, from: Option<&str>, to: Option<&str>) -> Self {
        self.from_status = from.map(str::to_string);
        self.to_status = to.map(str::to_string);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Appends one immutable entry to the status log.
///
/// Lifecycle operations call this inside their own transaction, so the entry
/// commits or rolls back together with the change it describes.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    entry: AuditEntry,
) -> Result<status_log::Model, ServiceError> {
    let model = status_log::ActiveModel {
        id: Set(Uuid::now_v7()),
        entity_type: Set(entry.entity_type),
        entity_id: Set(entry.entity_id),
        project_id: Set(entry.project_id),
        from_status: Set(entry.from_status),
        to_status: Set(entry.to_status),
        message: Set(entry.message),
        metadata: Set(entry.metadata),
        actor_id: Set(entry.actor_id),
        created_at: Set(Utc::now()),
    };

    let saved = model.insert(conn).await.map_err(ServiceError::db_error)?;
    debug!(
        entity_type = saved.entity_type.as_str(),
        entity_id = %saved.entity_id,
        message = %saved.message,
        "Status log entry recorded"
    );
    Ok(saved)
}

/// Read side of the status log.
#[derive(Clone)]
pub struct AuditLogService {
    db_pool: Arc<DbPool>,
}

impl AuditLogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// All entries for one document, oldest first.
    #[instrument(skip(self))]
    pub async fn entries_for_entity(
        &self,
        entity_type: AuditEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<status_log::Model>, ServiceError> {
        StatusLog::find()
            .filter(status_log::Column::EntityType.eq(entity_type))
            .filter(status_log::Column::EntityId.eq(entity_id))
            .order_by_asc(status_log::Column::CreatedAt)
            .order_by_asc(status_log::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Every entry recorded against a project, oldest first.
    #[instrument(skip(self))]
    pub async fn entries_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<status_log::Model>, ServiceError> {
        StatusLog::find()
            .filter(status_log::Column::ProjectId.eq(project_id))
            .order_by_asc(status_log::Column::CreatedAt)
            .order_by_asc(status_log::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Field-level diff carried in an entry's metadata as
/// `{"field": {"old": .., "new": ..}}`.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    fields: serde_json::Map<String, Value>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `field` when the two values differ.
    pub fn track<T: serde::Serialize + PartialEq>(&mut self, field: &str, old: &T, new: &T) {
        if old != new {
            self.fields.insert(
                field.to_string(),
                json!({ "old": json!(old), "new": json!(new) }),
            );
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

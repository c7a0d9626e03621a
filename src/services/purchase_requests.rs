use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    commands::purchaserequests::{
        ApprovePurchaseRequestCommand, ConvertPurchaseRequestCommand, ConvertPurchaseRequestResult,
        CreatePurchaseRequestCommand, RejectPurchaseRequestCommand,
        SubmitPurchaseRequestCommand, UpdatePurchaseRequestHeaderCommand,
        UpsertPurchaseRequestLineCommand,
    },
    commands::Command,
    db::DbPool,
    entities::{
        purchase_request::{self, Entity as PurchaseRequest, PurchaseRequestStatus},
        purchase_request_line::{self, Entity as PurchaseRequestLine},
    },
    errors::ServiceError,
    events::EventSender,
};

/// A purchase request header together with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequestDetail {
    pub header: purchase_request::Model,
    pub lines: Vec<purchase_request_line::Model>,
    /// Σ quantity × estimated cost over active lines.
    pub total: Decimal,
}

impl PurchaseRequestDetail {
    pub fn active_lines(&self) -> impl Iterator<Item = &purchase_request_line::Model> {
        self.lines.iter().filter(|l| l.is_active)
    }
}

pub fn active_total(lines: &[purchase_request_line::Model]) -> Decimal {
    lines
        .iter()
        .filter(|l| l.is_active)
        .map(|l| l.extended_cost())
        .sum()
}

/// Loads the PR row with `SELECT ... FOR UPDATE`.
pub(crate) async fn lock_purchase_request<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<purchase_request::Model, ServiceError> {
    PurchaseRequest::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Purchase request", id))
}

pub(crate) async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    purchase_request_id: Uuid,
) -> Result<Vec<purchase_request_line::Model>, ServiceError> {
    PurchaseRequestLine::find()
        .filter(purchase_request_line::Column::PurchaseRequestId.eq(purchase_request_id))
        .order_by_asc(purchase_request_line::Column::SortOrder)
        .order_by_asc(purchase_request_line::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

pub(crate) async fn detail_for<C: ConnectionTrait>(
    conn: &C,
    header: purchase_request::Model,
) -> Result<PurchaseRequestDetail, ServiceError> {
    let lines = load_lines(conn, header.id).await?;
    let total = active_total(&lines);
    Ok(PurchaseRequestDetail {
        header,
        lines,
        total,
    })
}

/// Rejects edits to converted requests and to requests outside the editable
/// states.
pub(crate) fn ensure_editable(pr: &purchase_request::Model) -> Result<(), ServiceError> {
    ensure_not_converted(pr)?;
    if !pr.status.is_editable() {
        return Err(ServiceError::InvalidState(format!(
            "purchase request {} is {} and can no longer be edited",
            pr.pr_number,
            pr.status.as_str()
        )));
    }
    Ok(())
}

pub(crate) fn ensure_not_converted(pr: &purchase_request::Model) -> Result<(), ServiceError> {
    if pr.is_converted() {
        return Err(ServiceError::InvalidState(format!(
            "purchase request {} has been converted to a purchase order and is locked",
            pr.pr_number
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PurchaseRequestService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PurchaseRequestService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        command: CreatePurchaseRequestCommand,
    ) -> Result<PurchaseRequestDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn upsert_line(
        &self,
        command: UpsertPurchaseRequestLineCommand,
    ) -> Result<PurchaseRequestDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_header(
        &self,
        command: UpdatePurchaseRequestHeaderCommand,
    ) -> Result<PurchaseRequestDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn submit(
        &self,
        command: SubmitPurchaseRequestCommand,
    ) -> Result<PurchaseRequestDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn approve(
        &self,
        command: ApprovePurchaseRequestCommand,
    ) -> Result<PurchaseRequestDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn reject(
        &self,
        command: RejectPurchaseRequestCommand,
    ) -> Result<PurchaseRequestDetail, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn convert_to_po(
        &self,
        command: ConvertPurchaseRequestCommand,
    ) -> Result<ConvertPurchaseRequestResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<PurchaseRequestDetail, ServiceError> {
        let db = &*self.db_pool;
        let header = PurchaseRequest::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Purchase request", id))?;
        detail_for(db, header).await
    }

    /// Requests for a project, newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_for_project(
        &self,
        project_id: Uuid,
        status: Option<PurchaseRequestStatus>,
    ) -> Result<Vec<purchase_request::Model>, ServiceError> {
        let mut query =
            PurchaseRequest::find().filter(purchase_request::Column::ProjectId.eq(project_id));
        if let Some(status) = status {
            query = query.filter(purchase_request::Column::Status.eq(status));
        }
        query
            .order_by_desc(purchase_request::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

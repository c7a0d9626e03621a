//! Lookups against the project and vendor spine. The engine never writes
//! these tables.

use sea_orm::{ConnectionTrait, EntityTrait};
use uuid::Uuid;

use crate::entities::{
    project::{self, Entity as Project},
    vendor::{self, Entity as Vendor},
};
use crate::errors::ServiceError;

pub async fn find_project<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
) -> Result<project::Model, ServiceError> {
    Project::find_by_id(project_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Project", project_id))
}

/// New documents may only be opened against active projects.
pub async fn require_active_project<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
) -> Result<project::Model, ServiceError> {
    let project = find_project(conn, project_id).await?;
    if !project.is_active {
        return Err(ServiceError::InvalidState(format!(
            "project {} is inactive",
            project.code
        )));
    }
    Ok(project)
}

pub async fn find_vendor<C: ConnectionTrait>(
    conn: &C,
    vendor_id: Uuid,
) -> Result<vendor::Model, ServiceError> {
    Vendor::find_by_id(vendor_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Vendor", vendor_id))
}

pub async fn require_active_vendor<C: ConnectionTrait>(
    conn: &C,
    vendor_id: Uuid,
) -> Result<vendor::Model, ServiceError> {
    let vendor = find_vendor(conn, vendor_id).await?;
    if !vendor.is_active {
        return Err(ServiceError::InvalidState(format!(
            "vendor {} is inactive",
            vendor.name
        )));
    }
    Ok(vendor)
}

//! Document number allocation.
//!
//! Each category keeps a counter row in `document_sequences`. Yearly counters
//! are keyed by calendar year and restart at 1; global counters use period 0.
//! Allocation happens inside the caller's transaction, so a rolled-back
//! operation may leave a gap but never hands out the same number twice.

use chrono::{DateTime, Datelike, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::document_sequence::{self, Entity as DocumentSequence};
use crate::errors::ServiceError;
use crate::metrics;

/// Whether a category's counter runs forever or restarts every year.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NumberingScheme {
    /// `PR-000042`
    Global,
    /// `PR-2024-0007`
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentCategory {
    PurchaseRequest,
    PurchaseOrder,
    Receipt,
}

impl DocumentCategory {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentCategory::PurchaseRequest => "PR",
            DocumentCategory::PurchaseOrder => "PO",
            DocumentCategory::Receipt => "RCV",
        }
    }
}

const GLOBAL_PERIOD: i32 = 0;

/// `PR-000042`
pub fn format_document_number(prefix: &str, value: i64) -> String {
    format!("{}-{:06}", prefix, value)
}

/// `PR-2024-0007`
pub fn format_year_scoped_number(prefix: &str, year: i32, value: i64) -> String {
    format!("{}-{:04}-{:04}", prefix, year, value)
}

fn period_for(scheme: NumberingScheme, now: DateTime<Utc>) -> i32 {
    match scheme {
        NumberingScheme::Global => GLOBAL_PERIOD,
        NumberingScheme::Yearly => now.year(),
    }
}

/// Increments and returns the counter for `category`.
///
/// The counter row is created on first use with `ON CONFLICT DO NOTHING` and
/// then bumped with a single `UPDATE ... SET last_value = last_value + 1`,
/// which holds the row lock until the surrounding transaction ends.
pub async fn next_number<C: ConnectionTrait>(
    conn: &C,
    category: DocumentCategory,
    scheme: NumberingScheme,
    now: DateTime<Utc>,
) -> Result<i64, ServiceError> {
    let prefix = category.prefix();
    let period_year = period_for(scheme, now);

    let seed = document_sequence::ActiveModel {
        category: Set(prefix.to_string()),
        period_year: Set(period_year),
        last_value: Set(0),
    };
    DocumentSequence::insert(seed)
        .on_conflict(
            OnConflict::columns([
                document_sequence::Column::Category,
                document_sequence::Column::PeriodYear,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(ServiceError::db_error)?;

    DocumentSequence::update_many()
        .col_expr(
            document_sequence::Column::LastValue,
            Expr::col(document_sequence::Column::LastValue).add(1),
        )
        .filter(document_sequence::Column::Category.eq(prefix))
        .filter(document_sequence::Column::PeriodYear.eq(period_year))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let row = DocumentSequence::find_by_id((prefix.to_string(), period_year))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("sequence {} vanished mid-transaction", prefix))
        })?;

    debug!(category = prefix, period_year, value = row.last_value, "Allocated sequence value");
    Ok(row.last_value)
}

/// Allocates the next formatted document number for `category`.
pub async fn allocate<C: ConnectionTrait>(
    conn: &C,
    category: DocumentCategory,
    scheme: NumberingScheme,
    now: DateTime<Utc>,
) -> Result<String, ServiceError> {
    let value = next_number(conn, category, scheme, now).await?;
    metrics::record_document_numbered(category.prefix());
    Ok(match scheme {
        NumberingScheme::Global => format_document_number(category.prefix(), value),
        NumberingScheme::Yearly => {
            format_year_scoped_number(category.prefix(), period_for(scheme, now), value)
        }
    })
}

//! Receipt-to-PO-line coverage.
//!
//! The arithmetic lives in pure functions; the loaders only gather rows and
//! hand them over, so the same rules apply whether a rollup is computed for
//! display or inside a receipt transaction to refresh a PO's status.

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        purchase_order::{self, Entity as PurchaseOrder, PurchaseOrderStatus},
        purchase_order_line::{self, Entity as PurchaseOrderLine, PurchaseOrderLineStatus},
        receipt::{Entity as Receipt, ReceiptStatus},
        receipt_line::{self, Entity as ReceiptLine},
        vendor::Entity as Vendor,
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageState {
    /// Ordered quantity is zero or missing, so coverage cannot be measured.
    Unknown,
    NotReceived,
    Partial,
    Received,
}

impl CoverageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageState::Unknown => "unknown",
            CoverageState::NotReceived => "not_received",
            CoverageState::Partial => "partial",
            CoverageState::Received => "received",
        }
    }
}

/// Sums received quantity per PO line, skipping cancelled receipts and
/// unlinked lines.
pub fn received_by_line<I>(entries: I) -> HashMap<Uuid, Decimal>
where
    I: IntoIterator<Item = (Option<Uuid>, ReceiptStatus, Decimal)>,
{
    let mut totals = HashMap::new();
    for (po_line_id, status, qty) in entries {
        let Some(po_line_id) = po_line_id else {
            continue;
        };
        if !status.counts_toward_coverage() {
            continue;
        }
        *totals.entry(po_line_id).or_insert(Decimal::ZERO) += qty;
    }
    totals
}

pub fn qty_open_remaining(ordered: Decimal, received: Decimal) -> Decimal {
    (ordered - received).max(Decimal::ZERO)
}

pub fn coverage_state(ordered: Option<Decimal>, received: Decimal) -> CoverageState {
    match ordered {
        None => CoverageState::Unknown,
        Some(q) if q <= Decimal::ZERO => CoverageState::Unknown,
        Some(_) if received <= Decimal::ZERO => CoverageState::NotReceived,
        Some(q) if received < q => CoverageState::Partial,
        Some(_) => CoverageState::Received,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageCounts {
    pub received: usize,
    pub partial: usize,
    pub not_received: usize,
    pub unknown: usize,
}

impl CoverageCounts {
    pub fn add(&mut self, state: CoverageState) {
        match state {
            CoverageState::Received => self.received += 1,
            CoverageState::Partial => self.partial += 1,
            CoverageState::NotReceived => self.not_received += 1,
            CoverageState::Unknown => self.unknown += 1,
        }
    }

    pub fn merge(&mut self, other: &CoverageCounts) {
        self.received += other.received;
        self.partial += other.partial;
        self.not_received += other.not_received;
        self.unknown += other.unknown;
    }

    /// Order-level receipt state. Lines with unknown coverage are ignored.
    pub fn overall(&self) -> CoverageState {
        let measurable = self.received + self.partial + self.not_received;
        if measurable == 0 {
            CoverageState::Unknown
        } else if self.received == measurable {
            CoverageState::Received
        } else if self.received + self.partial > 0 {
            CoverageState::Partial
        } else {
            CoverageState::NotReceived
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCoverage {
    pub purchase_order_line_id: Uuid,
    pub description: String,
    pub qty_ordered: Decimal,
    pub qty_received: Decimal,
    pub qty_open: Decimal,
    pub state: CoverageState,
}

pub fn line_coverage(line: &purchase_order_line::Model, received: Decimal) -> LineCoverage {
    LineCoverage {
        purchase_order_line_id: line.id,
        description: line.description.clone(),
        qty_ordered: line.quantity,
        qty_received: received,
        qty_open: qty_open_remaining(line.quantity, received),
        state: coverage_state(Some(line.quantity), received),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoCoverage {
    pub purchase_order_id: Uuid,
    pub po_number: String,
    pub status: PurchaseOrderStatus,
    pub lines: Vec<LineCoverage>,
    pub counts: CoverageCounts,
    pub receipt_state: CoverageState,
}

pub fn summarize_po(
    po: &purchase_order::Model,
    lines: &[purchase_order_line::Model],
    received: &HashMap<Uuid, Decimal>,
) -> PoCoverage {
    let mut counts = CoverageCounts::default();
    let lines: Vec<LineCoverage> = lines
        .iter()
        .filter(|l| l.is_receivable())
        .map(|l| {
            let cov = line_coverage(l, received.get(&l.id).copied().unwrap_or(Decimal::ZERO));
            counts.add(cov.state);
            cov
        })
        .collect();

    PoCoverage {
        purchase_order_id: po.id,
        po_number: po.po_number.clone(),
        status: po.status,
        lines,
        receipt_state: counts.overall(),
        counts,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRollup {
    pub vendor_id: Uuid,
    pub po_count: usize,
    pub open_po_count: usize,
    pub fully_received_po_count: usize,
    pub committed_value: Decimal,
    pub line_counts: CoverageCounts,
}

/// Received quantity per line for the given PO lines.
pub async fn load_received<C: ConnectionTrait>(
    conn: &C,
    po_line_ids: &[Uuid],
) -> Result<HashMap<Uuid, Decimal>, ServiceError> {
    if po_line_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = ReceiptLine::find()
        .find_also_related(Receipt)
        .filter(receipt_line::Column::PurchaseOrderLineId.is_in(po_line_ids.iter().copied()))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(received_by_line(rows.into_iter().filter_map(|(line, receipt)| {
        receipt.map(|r| (line.purchase_order_line_id, r.status, line.qty_received))
    })))
}

/// Total received against one PO line across non-cancelled receipts.
pub async fn qty_received_total<C: ConnectionTrait>(
    conn: &C,
    po_line_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let totals = load_received(conn, &[po_line_id]).await?;
    Ok(totals.get(&po_line_id).copied().unwrap_or(Decimal::ZERO))
}

/// Active, non-cancelled lines of the given orders.
async fn active_lines<C: ConnectionTrait>(
    conn: &C,
    po_ids: Vec<Uuid>,
) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
    PurchaseOrderLine::find()
        .filter(purchase_order_line::Column::PurchaseOrderId.is_in(po_ids))
        .filter(purchase_order_line::Column::IsActive.eq(true))
        .filter(purchase_order_line::Column::LineStatus.eq(PurchaseOrderLineStatus::Open))
        .order_by_asc(purchase_order_line::Column::SortOrder)
        .order_by_asc(purchase_order_line::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Coverage for an already-loaded PO header.
pub async fn compute_po_coverage<C: ConnectionTrait>(
    conn: &C,
    po: &purchase_order::Model,
) -> Result<PoCoverage, ServiceError> {
    let lines = active_lines(conn, vec![po.id]).await?;
    let ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();
    let received = load_received(conn, &ids).await?;
    Ok(summarize_po(po, &lines, &received))
}

/// Read-only coverage queries.
#[derive(Clone)]
pub struct CoverageService {
    db_pool: Arc<DbPool>,
}

impl CoverageService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn po_coverage(&self, purchase_order_id: Uuid) -> Result<PoCoverage, ServiceError> {
        let db = &*self.db_pool;
        let po = PurchaseOrder::find_by_id(purchase_order_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Purchase order", purchase_order_id))?;
        compute_po_coverage(db, &po).await
    }

    #[instrument(skip(self))]
    pub async fn qty_received_total(&self, po_line_id: Uuid) -> Result<Decimal, ServiceError> {
        qty_received_total(&*self.db_pool, po_line_id).await
    }

    /// Per-vendor counts across the vendor's non-cancelled POs.
    #[instrument(skip(self))]
    pub async fn vendor_rollup(&self, vendor_id: Uuid) -> Result<VendorRollup, ServiceError> {
        let db = &*self.db_pool;
        Vendor::find_by_id(vendor_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Vendor", vendor_id))?;

        let pos = PurchaseOrder::find()
            .filter(purchase_order::Column::VendorId.eq(vendor_id))
            .filter(purchase_order::Column::Status.ne(PurchaseOrderStatus::Cancelled))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let lines = active_lines(db, pos.iter().map(|p| p.id).collect()).await?;
        let ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();
        let received = load_received(db, &ids).await?;

        let mut by_po: HashMap<Uuid, Vec<purchase_order_line::Model>> = HashMap::new();
        for line in lines {
            by_po.entry(line.purchase_order_id).or_default().push(line);
        }

        let mut rollup = VendorRollup {
            vendor_id,
            po_count: pos.len(),
            open_po_count: 0,
            fully_received_po_count: 0,
            committed_value: Decimal::ZERO,
            line_counts: CoverageCounts::default(),
        };
        for po in &pos {
            let po_lines = by_po.remove(&po.id).unwrap_or_default();
            rollup.committed_value += po_lines.iter().map(|l| l.extended_cost()).sum::<Decimal>();
            let summary = summarize_po(po, &po_lines, &received);
            rollup.line_counts.merge(&summary.counts);
            if summary.receipt_state == CoverageState::Received {
                rollup.fully_received_po_count += 1;
            }
            if matches!(
                po.status,
                PurchaseOrderStatus::Issued
                    | PurchaseOrderStatus::Acknowledged
                    | PurchaseOrderStatus::PartiallyReceived
            ) {
                rollup.open_po_count += 1;
            }
        }
        Ok(rollup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn states_follow_received_quantity() {
        assert_eq!(coverage_state(None, dec!(5)), CoverageState::Unknown);
        assert_eq!(coverage_state(Some(dec!(0)), dec!(5)), CoverageState::Unknown);
        assert_eq!(coverage_state(Some(dec!(10)), dec!(0)), CoverageState::NotReceived);
        assert_eq!(coverage_state(Some(dec!(10)), dec!(4)), CoverageState::Partial);
        assert_eq!(coverage_state(Some(dec!(10)), dec!(10)), CoverageState::Received);
        assert_eq!(coverage_state(Some(dec!(10)), dec!(12)), CoverageState::Received);
    }

    #[test]
    fn cancelled_receipts_and_blind_lines_do_not_count() {
        let line = Uuid::new_v4();
        let totals = received_by_line(vec![
            (Some(line), ReceiptStatus::Received, dec!(3)),
            (Some(line), ReceiptStatus::Cancelled, dec!(100)),
            (Some(line), ReceiptStatus::Pending, dec!(2)),
            (None, ReceiptStatus::Received, dec!(7)),
        ]);
        assert_eq!(totals.get(&line), Some(&dec!(5)));
        assert_eq!(totals.len(), 1);
    }

    #[test]
    fn overall_state_ignores_unknown_lines() {
        let mut counts = CoverageCounts::default();
        counts.add(CoverageState::Unknown);
        assert_eq!(counts.overall(), CoverageState::Unknown);
        counts.add(CoverageState::Received);
        assert_eq!(counts.overall(), CoverageState::Received);
        counts.add(CoverageState::NotReceived);
        assert_eq!(counts.overall(), CoverageState::Partial);
    }

    fn qty() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000, 0u32..3).prop_map(|(m, s)| Decimal::new(m, s))
    }

    proptest! {
        #[test]
        fn open_quantity_is_never_negative(ordered in qty(), received in qty()) {
            let open = qty_open_remaining(ordered, received);
            prop_assert!(open >= Decimal::ZERO);
            prop_assert_eq!(open + received.min(ordered), ordered);
        }

        #[test]
        fn state_matches_open_quantity(ordered in qty(), received in qty()) {
            let state = coverage_state(Some(ordered), received);
            let open = qty_open_remaining(ordered, received);
            match state {
                CoverageState::Unknown => prop_assert!(ordered.is_zero()),
                CoverageState::NotReceived => prop_assert!(received.is_zero()),
                CoverageState::Partial => prop_assert!(open > Decimal::ZERO && received > Decimal::ZERO),
                CoverageState::Received => prop_assert!(open.is_zero()),
            }
        }

        #[test]
        fn received_total_is_sum_of_counted_entries(
            entries in proptest::collection::vec((qty(), any::<bool>()), 0..20)
        ) {
            let line = Uuid::nil();
            let expected: Decimal = entries.iter().filter(|(_, c)| !c).map(|(q, _)| *q).sum();
            let totals = received_by_line(entries.into_iter().map(|(q, cancelled)| {
                let status = if cancelled { ReceiptStatus::Cancelled } else { ReceiptStatus::Received };
                (Some(line), status, q)
            }));
            prop_assert_eq!(totals.get(&line).copied().unwrap_or(Decimal::ZERO), expected);
        }
    }
}

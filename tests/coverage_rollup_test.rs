mod common;

use assert_matches::assert_matches;
use purchasing_engine::{
    commands::{
        purchaseorders::{CreatePurchaseOrderCommand, SetPurchaseOrderStatusCommand},
        receipts::{CancelReceiptCommand, MarkReceiptReceivedCommand},
    },
    entities::{
        actor::ActorRole, purchase_order::PurchaseOrderStatus,
        purchase_order_line::PurchaseOrderLineStatus,
    },
    errors::ServiceError,
    services::coverage::CoverageState,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::TestEngine;

#[tokio::test]
async fn po_coverage_reports_each_active_line() {
    let t = TestEngine::new().await;
    let po = t
        .issued_po(&[
            ("Steel beam", dec!(4), dec!(250)),
            ("Bolts", dec!(100), dec!(2)),
            ("Freight placeholder", dec!(0), dec!(0)),
        ])
        .await;

    let receipt = t.receipt_for(Some(po.header.id)).await;
    t.receive_line(receipt.header.id, Some(po.lines[0].id), dec!(1))
        .await;
    t.receive_line(receipt.header.id, Some(po.lines[0].id), dec!(2))
        .await;

    let coverage = t
        .engine
        .services
        .coverage
        .po_coverage(po.header.id)
        .await
        .expect("coverage");
    assert_eq!(coverage.po_number, po.header.po_number);
    assert_eq!(coverage.lines.len(), 3);

    let beam = &coverage.lines[0];
    assert_eq!(beam.qty_received, dec!(3));
    assert_eq!(beam.qty_open, dec!(1));
    assert_eq!(beam.state, CoverageState::Partial);

    assert_eq!(coverage.lines[1].state, CoverageState::NotReceived);
    assert_eq!(coverage.lines[2].state, CoverageState::Unknown);

    assert_eq!(coverage.counts.partial, 1);
    assert_eq!(coverage.counts.not_received, 1);
    assert_eq!(coverage.counts.unknown, 1);
    assert_eq!(coverage.receipt_state, CoverageState::Partial);
}

#[tokio::test]
async fn over_receipt_clamps_open_quantity() {
    let t = TestEngine::new().await;
    let po = t.issued_po(&[("Bolts", dec!(10), dec!(2))]).await;
    let receipt = t.receipt_for(Some(po.header.id)).await;
    t.receive_line(receipt.header.id, Some(po.lines[0].id), dec!(12))
        .await;

    let coverage = t
        .engine
        .services
        .coverage
        .po_coverage(po.header.id)
        .await
        .expect("coverage");
    let line = &coverage.lines[0];
    assert_eq!(line.qty_received, dec!(12));
    assert_eq!(line.qty_open, dec!(0));
    assert_eq!(line.state, CoverageState::Received);
}

#[tokio::test]
async fn cancelled_receipts_do_not_count() {
    let t = TestEngine::new().await;
    let po = t.issued_po(&[("Bolts", dec!(10), dec!(2))]).await;
    let keep = t.receipt_for(Some(po.header.id)).await;
    t.receive_line(keep.header.id, Some(po.lines[0].id), dec!(3))
        .await;
    let drop = t.receipt_for(Some(po.header.id)).await;
    t.receive_line(drop.header.id, Some(po.lines[0].id), dec!(5))
        .await;

    let coverage = &t.engine.services.coverage;
    assert_eq!(
        coverage.qty_received_total(po.lines[0].id).await.expect("total"),
        dec!(8),
        "pending receipts count"
    );

    t.engine
        .services
        .receipts
        .cancel(CancelReceiptCommand {
            receipt_id: drop.header.id,
            actor_id: t.actor(ActorRole::Shop),
            message: Some("Duplicate entry".into()),
        })
        .await
        .expect("cancel");
    assert_eq!(
        coverage.qty_received_total(po.lines[0].id).await.expect("total"),
        dec!(3)
    );
}

#[tokio::test]
async fn unknown_purchase_order_is_not_found() {
    let t = TestEngine::new().await;
    assert_matches!(
        t.engine.services.coverage.po_coverage(Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        t.engine.services.coverage.vendor_rollup(Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn vendor_rollup_skips_cancelled_orders() {
    let t = TestEngine::new().await;
    let buyer = t.actor(ActorRole::Purchasing);

    let _open = t.issued_po(&[("Steel beam", dec!(4), dec!(250))]).await;
    let done = t.issued_po(&[("Bolts", dec!(10), dec!(2))]).await;
    let _draft = t.draft_po(&[("Anchors", dec!(5), dec!(10))]).await;
    let cancelled = t.draft_po(&[("Wire", dec!(1), dec!(999))]).await;
    t.engine
        .services
        .purchase_orders
        .set_status(SetPurchaseOrderStatusCommand {
            purchase_order_id: cancelled.header.id,
            status: PurchaseOrderStatus::Cancelled,
            actor_id: buyer,
            message: None,
        })
        .await
        .expect("cancel PO");

    let receipt = t.receipt_for(Some(done.header.id)).await;
    t.receive_line(receipt.header.id, Some(done.lines[0].id), dec!(10))
        .await;
    t.engine
        .services
        .receipts
        .mark_received(MarkReceiptReceivedCommand {
            receipt_id: receipt.header.id,
            actor_id: t.actor(ActorRole::Shop),
            message: None,
        })
        .await
        .expect("receive");

    // Another vendor's order stays out of the rollup.
    let rival = t.add_vendor("Rival Metals", true).await;
    let elsewhere = t
        .engine
        .services
        .purchase_orders
        .create(CreatePurchaseOrderCommand {
            project_id: t.project_id,
            vendor_id: rival,
            actor_id: buyer,
            ship_to: None,
            needed_by: None,
            freight_estimate: None,
            tax_estimate: None,
            notes: None,
        })
        .await
        .expect("rival PO");
    t.engine
        .services
        .purchase_orders
        .upsert_line(common::po_line(elsewhere.header.id, buyer, "Plate", dec!(1), dec!(500)))
        .await
        .expect("rival line");

    let rollup = t
        .engine
        .services
        .coverage
        .vendor_rollup(t.vendor_id)
        .await
        .expect("rollup");

    assert_eq!(rollup.po_count, 3);
    assert_eq!(rollup.open_po_count, 1, "the received order is no longer open");
    assert_eq!(rollup.fully_received_po_count, 1);
    assert_eq!(rollup.committed_value, dec!(1070));
    assert_eq!(rollup.line_counts.received, 1);
    assert_eq!(rollup.line_counts.not_received, 2);
}

#[tokio::test]
async fn cancelled_po_lines_leave_coverage_and_refuse_receipts() {
    let t = TestEngine::new().await;
    let buyer = t.actor(ActorRole::Purchasing);
    let po = t
        .issued_po(&[("Steel beam", dec!(4), dec!(250)), ("Bolts", dec!(100), dec!(2))])
        .await;
    let bolts = po.lines[1].id;

    let mut cancel_line = common::po_line(po.header.id, buyer, "Bolts", dec!(100), dec!(2));
    cancel_line.line_id = Some(bolts);
    cancel_line.line_status = Some(PurchaseOrderLineStatus::Cancelled);
    t.engine
        .services
        .purchase_orders
        .upsert_line(cancel_line)
        .await
        .expect("cancel bolts line");

    let receipt = t.receipt_for(Some(po.header.id)).await;
    assert_matches!(
        t.engine
            .services
            .receipts
            .upsert_line(common::receipt_line(
                receipt.header.id,
                t.actor(ActorRole::Shop),
                Some(bolts),
                dec!(10),
            ))
            .await,
        Err(ServiceError::ValidationError(_))
    );

    t.receive_line(receipt.header.id, Some(po.lines[0].id), dec!(4))
        .await;
    t.engine
        .services
        .receipts
        .mark_received(MarkReceiptReceivedCommand {
            receipt_id: receipt.header.id,
            actor_id: t.actor(ActorRole::Shop),
            message: None,
        })
        .await
        .expect("receive");

    let coverage = t
        .engine
        .services
        .coverage
        .po_coverage(po.header.id)
        .await
        .expect("coverage");
    assert_eq!(coverage.lines.len(), 1);
    assert_eq!(coverage.counts.received, 1);
    assert_eq!(coverage.counts.not_received, 0);
    assert_eq!(coverage.receipt_state, CoverageState::Received);

    let refreshed = t
        .engine
        .services
        .purchase_orders
        .get(po.header.id)
        .await
        .expect("load PO");
    assert_eq!(refreshed.header.status, PurchaseOrderStatus::Received);
}

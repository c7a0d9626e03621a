mod common;

use assert_matches::assert_matches;
use purchasing_engine::{
    commands::{
        purchaseorders::{CreatePurchaseOrderCommand, SetPurchaseOrderStatusCommand},
        receipts::MarkReceiptReceivedCommand,
    },
    entities::{
        actor::ActorRole, purchase_order::PurchaseOrderStatus, status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::Event,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{po_line, TestEngine};

fn status(id: Uuid, status: PurchaseOrderStatus, actor_id: Uuid) -> SetPurchaseOrderStatusCommand {
    SetPurchaseOrderStatusCommand {
        purchase_order_id: id,
        status,
        actor_id,
        message: None,
    }
}

#[tokio::test]
async fn direct_create_numbers_sequentially() {
    let t = TestEngine::new().await;
    let first = t.draft_po(&[]).await;
    let second = t.draft_po(&[]).await;

    assert_eq!(first.header.po_number, "PO-000001");
    assert_eq!(second.header.po_number, "PO-000002");
    assert_eq!(first.header.status, PurchaseOrderStatus::Draft);
    assert_eq!(first.header.source_pr_id, None);

    let log = t.log_for(AuditEntityType::PurchaseOrder, first.header.id).await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].message, "created");
}

#[tokio::test]
async fn create_refuses_inactive_vendor_and_negative_estimates() {
    let t = TestEngine::new().await;
    let retired = t.add_vendor("Gone Lumber", false).await;
    let service = &t.engine.services.purchase_orders;
    let buyer = t.actor(ActorRole::Purchasing);

    let command = |vendor_id: Uuid| CreatePurchaseOrderCommand {
        project_id: t.project_id,
        vendor_id,
        actor_id: buyer,
        ship_to: None,
        needed_by: None,
        freight_estimate: None,
        tax_estimate: None,
        notes: None,
    };

    assert_matches!(
        service.create(command(retired)).await,
        Err(ServiceError::InvalidState(_))
    );

    let mut negative = command(t.vendor_id);
    negative.freight_estimate = Some(dec!(-5));
    assert_matches!(
        service.create(negative).await,
        Err(ServiceError::ValidationError(_))
    );

    let closed_project = t.add_project("P-OLD", false).await;
    let mut stale = command(t.vendor_id);
    stale.project_id = closed_project;
    assert_matches!(
        service.create(stale).await,
        Err(ServiceError::InvalidState(_))
    );
}

#[tokio::test]
async fn total_tracks_active_lines() {
    let t = TestEngine::new().await;
    let po = t
        .draft_po(&[("Steel beam", dec!(4), dec!(250)), ("Bolts", dec!(100), dec!(2))])
        .await;
    assert_eq!(po.total, dec!(1200));
    assert_eq!(po.lines.len(), 2);
}

#[tokio::test]
async fn issue_then_acknowledge_stamps_timestamps() {
    let mut t = TestEngine::new().await;
    let po = t.draft_po(&[("Steel beam", dec!(4), dec!(250))]).await;
    let service = &t.engine.services.purchase_orders;
    let buyer = t.actor(ActorRole::Purchasing);

    let issued = service
        .set_status(status(po.header.id, PurchaseOrderStatus::Issued, buyer))
        .await
        .expect("issue");
    assert_eq!(issued.header.status, PurchaseOrderStatus::Issued);
    let issued_at = issued.header.issued_at.expect("issued_at stamped");
    assert_eq!(issued.header.acknowledged_at, None);

    let acknowledged = service
        .set_status(status(po.header.id, PurchaseOrderStatus::Acknowledged, buyer))
        .await
        .expect("acknowledge");
    assert!(acknowledged.header.acknowledged_at.is_some());
    assert_eq!(acknowledged.header.issued_at, Some(issued_at), "issue stamp kept");

    let log = t.log_for(AuditEntityType::PurchaseOrder, po.header.id).await;
    let moves: Vec<_> = log
        .iter()
        .filter_map(|e| e.to_status.as_deref())
        .collect();
    assert_eq!(moves, vec!["draft", "issued", "acknowledged"]);

    let events = t.drain_events();
    assert!(events.contains(&Event::PurchaseOrderStatusChanged {
        purchase_order_id: po.header.id,
        old_status: "issued".into(),
        new_status: "acknowledged".into(),
    }));
}

#[tokio::test]
async fn same_status_is_a_quiet_no_op() {
    let t = TestEngine::new().await;
    let po = t.issued_po(&[("Steel beam", dec!(1), dec!(10))]).await;
    let before = t.log_for(AuditEntityType::PurchaseOrder, po.header.id).await.len();

    let again = t
        .engine
        .services
        .purchase_orders
        .set_status(status(
            po.header.id,
            PurchaseOrderStatus::Issued,
            t.actor(ActorRole::Purchasing),
        ))
        .await
        .expect("repeat issue");
    assert_eq!(again.header.status, PurchaseOrderStatus::Issued);

    let after = t.log_for(AuditEntityType::PurchaseOrder, po.header.id).await.len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn illegal_transitions_are_invalid_state() {
    let t = TestEngine::new().await;
    let po = t.draft_po(&[("Steel beam", dec!(1), dec!(10))]).await;
    let service = &t.engine.services.purchase_orders;
    let admin = t.actor(ActorRole::Admin);

    for target in [
        PurchaseOrderStatus::Acknowledged,
        PurchaseOrderStatus::Received,
        PurchaseOrderStatus::Closed,
    ] {
        assert_matches!(
            service.set_status(status(po.header.id, target, admin)).await,
            Err(ServiceError::InvalidState(_))
        );
    }

    service
        .set_status(status(po.header.id, PurchaseOrderStatus::Cancelled, admin))
        .await
        .expect("cancel draft");
    assert_matches!(
        service
            .set_status(status(po.header.id, PurchaseOrderStatus::Issued, admin))
            .await,
        Err(ServiceError::InvalidState(_))
    );
}

#[tokio::test]
async fn status_changes_respect_roles() {
    let t = TestEngine::new().await;
    let po = t.issued_po(&[("Steel beam", dec!(1), dec!(10))]).await;
    let service = &t.engine.services.purchase_orders;

    // Shop can record receiving progress but not commercial moves.
    assert_matches!(
        service
            .set_status(status(
                po.header.id,
                PurchaseOrderStatus::Acknowledged,
                t.actor(ActorRole::Shop),
            ))
            .await,
        Err(ServiceError::AuthorizationError(_))
    );
    assert_matches!(
        service
            .set_status(status(
                po.header.id,
                PurchaseOrderStatus::Cancelled,
                t.actor(ActorRole::Pm),
            ))
            .await,
        Err(ServiceError::AuthorizationError(_))
    );

    let partial = service
        .set_status(status(
            po.header.id,
            PurchaseOrderStatus::PartiallyReceived,
            t.actor(ActorRole::Shop),
        ))
        .await
        .expect("shop may mark partial receipt");
    assert_eq!(partial.header.status, PurchaseOrderStatus::PartiallyReceived);
}

#[tokio::test]
async fn caller_message_replaces_default_log_text() {
    let t = TestEngine::new().await;
    let po = t.draft_po(&[("Steel beam", dec!(1), dec!(10))]).await;
    let mut command = status(
        po.header.id,
        PurchaseOrderStatus::Issued,
        t.actor(ActorRole::Ops),
    );
    command.message = Some("Emailed to vendor".into());
    t.engine
        .services
        .purchase_orders
        .set_status(command)
        .await
        .expect("issue");

    let log = t.log_for(AuditEntityType::PurchaseOrder, po.header.id).await;
    let last = log.last().expect("entry");
    assert_eq!(last.message, "Emailed to vendor");
    assert_eq!(last.from_status.as_deref(), Some("draft"));
    assert_eq!(last.metadata["actor_role"], "ops");
}

#[tokio::test]
async fn closed_orders_freeze_their_lines() {
    let t = TestEngine::new().await;
    let po = t.issued_po(&[("Steel beam", dec!(1), dec!(10))]).await;
    let service = &t.engine.services.purchase_orders;
    let buyer = t.actor(ActorRole::Purchasing);

    // Lines stay editable after issue.
    let mut edit = po_line(po.header.id, buyer, "Steel beam", dec!(2), dec!(10));
    edit.line_id = Some(po.lines[0].id);
    let edited = service.upsert_line(edit).await.expect("edit issued PO line");
    assert_eq!(edited.total, dec!(20));
    assert_eq!(edited.header.status, PurchaseOrderStatus::Issued);

    for next in [PurchaseOrderStatus::Received, PurchaseOrderStatus::Closed] {
        service
            .set_status(status(po.header.id, next, buyer))
            .await
            .expect("advance");
    }

    let late = po_line(po.header.id, buyer, "Extra", dec!(1), dec!(1));
    assert_matches!(
        service.upsert_line(late).await,
        Err(ServiceError::InvalidState(_))
    );
}

#[tokio::test]
async fn negative_line_values_are_rejected() {
    let t = TestEngine::new().await;
    let po = t.draft_po(&[]).await;
    let buyer = t.actor(ActorRole::Purchasing);
    let line = po_line(po.header.id, buyer, "Steel", dec!(1), dec!(-3));
    assert_matches!(
        t.engine.services.purchase_orders.upsert_line(line).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn list_filters_by_status() {
    let t = TestEngine::new().await;
    let draft = t.draft_po(&[]).await;
    let issued = t.issued_po(&[("Steel", dec!(1), dec!(1))]).await;
    let service = &t.engine.services.purchase_orders;

    let all = service
        .list_for_project(t.project_id, None)
        .await
        .expect("list");
    assert_eq!(all.len(), 2);

    let drafts = service
        .list_for_project(t.project_id, Some(PurchaseOrderStatus::Draft))
        .await
        .expect("list drafts");
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].id, draft.header.id);
    assert_ne!(drafts[0].id, issued.header.id);
}

#[tokio::test]
async fn received_order_can_still_be_cancelled() {
    let t = TestEngine::new().await;
    let po = t.issued_po(&[("Steel beam", dec!(2), dec!(10))]).await;
    let receipt = t.receipt_for(Some(po.header.id)).await;
    t.receive_line(receipt.header.id, Some(po.lines[0].id), dec!(2))
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

    let service = &t.engine.services.purchase_orders;
    let received = service.get(po.header.id).await.expect("load PO");
    assert_eq!(received.header.status, PurchaseOrderStatus::Received);

    let cancelled = service
        .set_status(status(
            po.header.id,
            PurchaseOrderStatus::Cancelled,
            t.actor(ActorRole::Purchasing),
        ))
        .await
        .expect("cancel received PO");
    assert_eq!(cancelled.header.status, PurchaseOrderStatus::Cancelled);

    let log = t.log_for(AuditEntityType::PurchaseOrder, po.header.id).await;
    let last = log.last().expect("cancel entry");
    assert_eq!(last.from_status.as_deref(), Some("received"));
    assert_eq!(last.to_status.as_deref(), Some("cancelled"));

    assert_matches!(
        service
            .set_status(status(po.header.id, PurchaseOrderStatus::Closed, t.actor(ActorRole::Admin)))
            .await,
        Err(ServiceError::InvalidState(_))
    );
}

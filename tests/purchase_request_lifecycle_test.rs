//! Purchase request lifecycle against an in-memory SQLite store.
//!
//! Covers:
//! - numbering and the draft → submitted → approved path
//! - threshold-based approval authority
//! - approval reset on edits after approval
//! - conversion into a draft purchase order (exactly once)

mod common;

use assert_matches::assert_matches;
use chrono::{Datelike, NaiveDate, Utc};
use purchasing_engine::{
    commands::purchaserequests::{
        ApprovePurchaseRequestCommand, ConvertPurchaseRequestCommand, RejectPurchaseRequestCommand,
        ShipTo, SubmitPurchaseRequestCommand, UpdatePurchaseRequestHeaderCommand,
    },
    common::FieldUpdate,
    entities::{
        actor::ActorRole,
        purchase_order::PurchaseOrderStatus,
        purchase_request::{PurchaseRequestPriority, PurchaseRequestStatus},
        status_log::AuditEntityType,
    },
    errors::ServiceError,
    events::Event,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{pr_line, TestEngine};

fn submit(id: Uuid, actor_id: Uuid) -> SubmitPurchaseRequestCommand {
    SubmitPurchaseRequestCommand {
        purchase_request_id: id,
        actor_id,
        message: None,
    }
}

fn approve(id: Uuid, actor_id: Uuid) -> ApprovePurchaseRequestCommand {
    ApprovePurchaseRequestCommand {
        purchase_request_id: id,
        actor_id,
        message: None,
    }
}

fn convert(id: Uuid, vendor_id: Uuid, actor_id: Uuid) -> ConvertPurchaseRequestCommand {
    ConvertPurchaseRequestCommand {
        purchase_request_id: id,
        vendor_id,
        actor_id,
        ship_to: None,
        notes: None,
    }
}

#[tokio::test]
async fn create_assigns_year_scoped_number_and_logs_creation() {
    let t = TestEngine::new().await;
    let first = t.draft_pr(&[]).await;
    let second = t.draft_pr(&[]).await;

    let year = Utc::now().year();
    assert_eq!(first.header.pr_number, format!("PR-{}-0001", year));
    assert_eq!(second.header.pr_number, format!("PR-{}-0002", year));
    assert_eq!(first.header.status, PurchaseRequestStatus::Draft);
    assert_eq!(first.header.priority, PurchaseRequestPriority::Normal);

    let log = t.log_for(AuditEntityType::PurchaseRequest, first.header.id).await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].message, "created");
    assert_eq!(log[0].to_status.as_deref(), Some("draft"));
}

#[tokio::test]
async fn create_rejects_unknown_project() {
    let t = TestEngine::new().await;
    let result = t
        .engine
        .services
        .purchase_requests
        .create(purchasing_engine::commands::purchaserequests::CreatePurchaseRequestCommand {
            project_id: Uuid::new_v4(),
            actor_id: t.actor(ActorRole::Pm),
            needed_by: None,
            priority: None,
            notes: None,
        })
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn total_sums_active_lines_only() {
    let t = TestEngine::new().await;
    let detail = t
        .draft_pr(&[("Rebar #5", dec!(10), dec!(20)), ("Tie wire", dec!(3), dec!(5))])
        .await;
    assert_eq!(detail.total, dec!(215));

    let mut deactivate = pr_line(
        detail.header.id,
        t.actor(ActorRole::Pm),
        "Tie wire",
        dec!(3),
        dec!(5),
    );
    deactivate.line_id = Some(detail.lines[1].id);
    deactivate.is_active = Some(false);
    let detail = t
        .engine
        .services
        .purchase_requests
        .upsert_line(deactivate)
        .await
        .expect("deactivate line");
    assert_eq!(detail.total, dec!(200));
    assert_eq!(detail.lines.len(), 2);
}

#[tokio::test]
async fn line_validation_rejects_bad_input() {
    let t = TestEngine::new().await;
    let pr = t.draft_pr(&[]).await;
    let service = &t.engine.services.purchase_requests;
    let pm = t.actor(ActorRole::Pm);

    let blank = pr_line(pr.header.id, pm, "   ", dec!(1), dec!(1));
    assert_matches!(
        service.upsert_line(blank).await,
        Err(ServiceError::ValidationError(_))
    );

    let negative = pr_line(pr.header.id, pm, "Anchor bolts", dec!(-1), dec!(1));
    assert_matches!(
        service.upsert_line(negative).await,
        Err(ServiceError::ValidationError(_))
    );

    let mut missing_qty = pr_line(pr.header.id, pm, "Anchor bolts", dec!(1), dec!(1));
    missing_qty.quantity = None;
    assert_matches!(
        service.upsert_line(missing_qty).await,
        Err(ServiceError::ValidationError(_))
    );

    let log = t.log_for(AuditEntityType::PurchaseRequest, pr.header.id).await;
    assert_eq!(log.len(), 1, "failed edits leave no trace");
}

#[tokio::test]
async fn submit_requires_an_active_line_and_is_idempotent() {
    let t = TestEngine::new().await;
    let service = &t.engine.services.purchase_requests;
    let pm = t.actor(ActorRole::Pm);

    let empty = t.draft_pr(&[]).await;
    assert_matches!(
        service.submit(submit(empty.header.id, pm)).await,
        Err(ServiceError::ValidationError(_))
    );

    let pr = t.draft_pr(&[("Plywood", dec!(10), dec!(30))]).await;
    let submitted = service.submit(submit(pr.header.id, pm)).await.expect("submit");
    assert_eq!(submitted.header.status, PurchaseRequestStatus::Submitted);

    let again = service.submit(submit(pr.header.id, pm)).await.expect("resubmit");
    assert_eq!(again.header.status, PurchaseRequestStatus::Submitted);

    let log = t.log_for(AuditEntityType::PurchaseRequest, pr.header.id).await;
    let submissions = log.iter().filter(|e| e.message == "submitted").count();
    assert_eq!(submissions, 1);
}

#[tokio::test]
async fn approval_below_threshold_allows_purchasing() {
    let mut t = TestEngine::new().await;
    let pr = t.draft_pr(&[("Plywood", dec!(10), dec!(30))]).await;
    let service = &t.engine.services.purchase_requests;
    service
        .submit(submit(pr.header.id, t.actor(ActorRole::Pm)))
        .await
        .expect("submit");

    let buyer = t.actor(ActorRole::Purchasing);
    let approved = service
        .approve(approve(pr.header.id, buyer))
        .await
        .expect("purchasing may approve small requests");
    assert_eq!(approved.header.status, PurchaseRequestStatus::Approved);
    assert_eq!(approved.header.approved_by, Some(buyer));
    assert!(approved.header.approved_at.is_some());

    let log = t.log_for(AuditEntityType::PurchaseRequest, pr.header.id).await;
    let entry = log.last().expect("approval entry");
    assert_eq!(entry.message, "approved");
    assert_eq!(entry.from_status.as_deref(), Some("submitted"));
    assert_eq!(entry.metadata["approver_role"], "purchasing");

    let events = t.drain_events();
    assert!(events.contains(&Event::PurchaseRequestStatusChanged {
        purchase_request_id: pr.header.id,
        old_status: "submitted".into(),
        new_status: "approved".into(),
    }));
}

#[tokio::test]
async fn approval_at_threshold_needs_senior_role() {
    let t = TestEngine::new().await;
    // Exactly 1000: the threshold is inclusive.
    let pr = t.draft_pr(&[("Generator rental", dec!(1), dec!(1000))]).await;
    let service = &t.engine.services.purchase_requests;
    service
        .submit(submit(pr.header.id, t.actor(ActorRole::Pm)))
        .await
        .expect("submit");

    for role in [ActorRole::Purchasing, ActorRole::Ops, ActorRole::Pm, ActorRole::Shop] {
        let result = service.approve(approve(pr.header.id, t.actor(role))).await;
        assert_matches!(result, Err(ServiceError::AuthorizationError(msg)) => {
            assert!(msg.contains(role.as_str()));
        });
    }

    let approved = service
        .approve(approve(pr.header.id, t.actor(ActorRole::Accounting)))
        .await
        .expect("accounting may approve large requests");
    assert_eq!(approved.header.status, PurchaseRequestStatus::Approved);
}

#[tokio::test]
async fn approve_requires_submitted_status() {
    let t = TestEngine::new().await;
    let pr = t.draft_pr(&[("Plywood", dec!(1), dec!(10))]).await;
    let result = t
        .engine
        .services
        .purchase_requests
        .approve(approve(pr.header.id, t.actor(ActorRole::Admin)))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn reject_clears_approval_and_freezes_request() {
    let t = TestEngine::new().await;
    let pr = t.approved_pr(&[("Plywood", dec!(2), dec!(10))]).await;
    let service = &t.engine.services.purchase_requests;

    let rejected = service
        .reject(RejectPurchaseRequestCommand {
            purchase_request_id: pr.header.id,
            actor_id: t.actor(ActorRole::Executive),
            message: Some("Use stock on hand".into()),
        })
        .await
        .expect("reject");
    assert_eq!(rejected.header.status, PurchaseRequestStatus::Rejected);
    assert_eq!(rejected.header.approved_by, None);

    let log = t.log_for(AuditEntityType::PurchaseRequest, pr.header.id).await;
    assert_eq!(log.last().map(|e| e.message.as_str()), Some("Use stock on hand"));

    let edit = pr_line(pr.header.id, t.actor(ActorRole::Pm), "More", dec!(1), dec!(1));
    assert_matches!(
        service.upsert_line(edit).await,
        Err(ServiceError::InvalidState(_))
    );
}

#[tokio::test]
async fn editing_an_approved_request_resets_approval() {
    let mut t = TestEngine::new().await;
    let pr = t.approved_pr(&[("Plywood", dec!(2), dec!(10))]).await;
    t.drain_events();
    let service = &t.engine.services.purchase_requests;
    let before = t.log_for(AuditEntityType::PurchaseRequest, pr.header.id).await.len();

    let mut edit = pr_line(
        pr.header.id,
        t.actor(ActorRole::Pm),
        "Plywood",
        dec!(4),
        dec!(10),
    );
    edit.line_id = Some(pr.lines[0].id);
    let detail = service.upsert_line(edit).await.expect("edit line");

    assert_eq!(detail.header.status, PurchaseRequestStatus::Submitted);
    assert_eq!(detail.header.approved_by, None);
    assert_eq!(detail.header.approved_at, None);
    assert_eq!(detail.total, dec!(40));

    let log = t.log_for(AuditEntityType::PurchaseRequest, pr.header.id).await;
    assert_eq!(log.len(), before + 2, "one edit entry plus one reset entry");
    let tail: Vec<_> = log.iter().rev().take(2).map(|e| e.message.as_str()).collect();
    assert_eq!(tail, vec!["approval reset due to line change", "line updated"]);
    let reset = log.last().expect("reset entry");
    assert_eq!(reset.from_status.as_deref(), Some("approved"));
    assert_eq!(reset.to_status.as_deref(), Some("submitted"));

    let events = t.drain_events();
    assert!(events.contains(&Event::PurchaseRequestApprovalReset(pr.header.id)));
}

#[tokio::test]
async fn header_update_distinguishes_clear_from_keep() {
    let t = TestEngine::new().await;
    let pr = t.approved_pr(&[("Plywood", dec!(2), dec!(10))]).await;
    let service = &t.engine.services.purchase_requests;
    let pm = t.actor(ActorRole::Pm);
    let date = NaiveDate::from_ymd_opt(2030, 5, 1).expect("valid date");
    let entries = || t.log_for(AuditEntityType::PurchaseRequest, pr.header.id);
    let approved_len = entries().await.len();

    // A no-op edit leaves approval intact.
    let unchanged = service
        .update_header(UpdatePurchaseRequestHeaderCommand {
            purchase_request_id: pr.header.id,
            actor_id: pm,
            ..Default::default()
        })
        .await
        .expect("no-op update");
    assert_eq!(unchanged.header.status, PurchaseRequestStatus::Approved);
    assert_eq!(entries().await.len(), approved_len, "no-op writes nothing");

    let updated = service
        .update_header(UpdatePurchaseRequestHeaderCommand {
            purchase_request_id: pr.header.id,
            actor_id: pm,
            needed_by: FieldUpdate::Set(date),
            priority: FieldUpdate::Set(PurchaseRequestPriority::Urgent),
            notes: FieldUpdate::Set("Deliver to gate 2".into()),
        })
        .await
        .expect("header update");
    assert_eq!(updated.header.needed_by, Some(date));
    assert_eq!(updated.header.priority, PurchaseRequestPriority::Urgent);
    assert_eq!(updated.header.status, PurchaseRequestStatus::Submitted);
    assert_eq!(updated.header.approved_by, None);

    let log = entries().await;
    assert_eq!(log.len(), approved_len + 2, "one edit entry plus one reset entry");
    let edit_entry = &log[log.len() - 2];
    assert_eq!(edit_entry.message, "header updated");
    assert_eq!(edit_entry.to_status, None);
    let reset = log.last().expect("reset entry");
    assert_eq!(reset.message, "approval reset due to header change");
    assert_eq!(reset.from_status.as_deref(), Some("approved"));
    assert_eq!(reset.to_status.as_deref(), Some("submitted"));

    let cleared = service
        .update_header(UpdatePurchaseRequestHeaderCommand {
            purchase_request_id: pr.header.id,
            actor_id: pm,
            notes: FieldUpdate::Clear,
            ..Default::default()
        })
        .await
        .expect("clear notes");
    assert_eq!(cleared.header.notes, None);
    assert_eq!(cleared.header.needed_by, Some(date), "absent field is kept");

    // Already submitted, so only the edit itself is logged.
    let log = entries().await;
    assert_eq!(log.len(), approved_len + 3);
    assert_eq!(log.last().map(|e| e.message.as_str()), Some("header updated"));
}

#[tokio::test]
async fn convert_creates_draft_po_exactly_once() {
    let mut t = TestEngine::new().await;
    let pr = t
        .approved_pr(&[("Rebar #5", dec!(10), dec!(20)), ("Tie wire", dec!(3), dec!(5))])
        .await;
    let service = &t.engine.services.purchase_requests;
    let buyer = t.actor(ActorRole::Purchasing);

    let mut command = convert(pr.header.id, t.vendor_id, buyer);
    command.ship_to = Some(ShipTo {
        name: Some("Site office".into()),
        city: Some("Denver".into()),
        ..Default::default()
    });
    let result = service.convert_to_po(command).await.expect("convert");

    let po = &result.purchase_order;
    assert_eq!(po.header.status, PurchaseOrderStatus::Draft);
    assert_eq!(po.header.po_number, "PO-000001");
    assert_eq!(po.header.source_pr_id, Some(pr.header.id));
    assert_eq!(po.header.ship_to_city.as_deref(), Some("Denver"));
    assert_eq!(po.lines.len(), 2);
    assert_eq!(po.total, pr.total);
    assert!(po.lines.iter().all(|l| l.source_pr_line_id.is_some()));
    assert_eq!(result.purchase_request.header.converted_po_id, Some(po.header.id));

    let pr_log = t.log_for(AuditEntityType::PurchaseRequest, pr.header.id).await;
    assert_eq!(pr_log.last().map(|e| e.message.as_str()), Some("converted to PO"));
    let po_log = t.log_for(AuditEntityType::PurchaseOrder, po.header.id).await;
    assert_eq!(po_log.len(), 1);
    assert_eq!(po_log[0].message, "created from PR");

    let again = service
        .convert_to_po(convert(pr.header.id, t.vendor_id, buyer))
        .await;
    assert_matches!(again, Err(ServiceError::Conflict(_)));

    let found = t
        .engine
        .services
        .purchase_orders
        .find_by_source_pr(pr.header.id)
        .await
        .expect("lookup");
    assert_eq!(found.map(|p| p.id), Some(po.header.id));

    let events = t.drain_events();
    assert!(events.contains(&Event::PurchaseRequestConverted {
        purchase_request_id: pr.header.id,
        purchase_order_id: po.header.id,
    }));
}

#[tokio::test]
async fn converted_request_is_frozen() {
    let t = TestEngine::new().await;
    let pr = t.approved_pr(&[("Rebar #5", dec!(10), dec!(20))]).await;
    let service = &t.engine.services.purchase_requests;
    service
        .convert_to_po(convert(pr.header.id, t.vendor_id, t.actor(ActorRole::Purchasing)))
        .await
        .expect("convert");

    let edit = pr_line(pr.header.id, t.actor(ActorRole::Pm), "More", dec!(1), dec!(1));
    assert_matches!(
        service.upsert_line(edit).await,
        Err(ServiceError::InvalidState(_))
    );
    assert_matches!(
        service
            .reject(RejectPurchaseRequestCommand {
                purchase_request_id: pr.header.id,
                actor_id: t.actor(ActorRole::Admin),
                message: None,
            })
            .await,
        Err(ServiceError::InvalidState(_))
    );
}

#[tokio::test]
async fn convert_checks_status_role_and_vendor() {
    let t = TestEngine::new().await;
    let service = &t.engine.services.purchase_requests;

    let draft = t.draft_pr(&[("Rebar", dec!(1), dec!(1))]).await;
    assert_matches!(
        service
            .convert_to_po(convert(draft.header.id, t.vendor_id, t.actor(ActorRole::Purchasing)))
            .await,
        Err(ServiceError::InvalidState(_))
    );

    let pr = t.approved_pr(&[("Rebar", dec!(1), dec!(1))]).await;
    assert_matches!(
        service
            .convert_to_po(convert(pr.header.id, t.vendor_id, t.actor(ActorRole::Shop)))
            .await,
        Err(ServiceError::AuthorizationError(_))
    );

    let retired = t.add_vendor("Closed Supply Co", false).await;
    assert_matches!(
        service
            .convert_to_po(convert(pr.header.id, retired, t.actor(ActorRole::Purchasing)))
            .await,
        Err(ServiceError::InvalidState(_))
    );
    assert_matches!(
        service
            .convert_to_po(convert(pr.header.id, Uuid::new_v4(), t.actor(ActorRole::Purchasing)))
            .await,
        Err(ServiceError::NotFound(_))
    );

    // Failed conversions left nothing behind.
    let found = t
        .engine
        .services
        .purchase_orders
        .find_by_source_pr(pr.header.id)
        .await
        .expect("lookup");
    assert!(found.is_none());
}

#[tokio::test]
async fn inactive_actor_is_refused() {
    let t = TestEngine::new().await;
    let pr = t.draft_pr(&[("Rebar", dec!(1), dec!(1))]).await;
    let former = t.add_actor(ActorRole::Pm, false).await;
    let result = t
        .engine
        .services
        .purchase_requests
        .submit(submit(pr.header.id, former))
        .await;
    assert_matches!(result, Err(ServiceError::AuthorizationError(_)));
}

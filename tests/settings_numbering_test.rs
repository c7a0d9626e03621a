//! Administration: the approval threshold, numbering schemes, actor roles and
//! the project-wide status log.

mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use chrono::{Datelike, Utc};
use purchasing_engine::{
    commands::purchaserequests::{ApprovePurchaseRequestCommand, SubmitPurchaseRequestCommand},
    entities::{actor::ActorRole, status_log::AuditEntityType},
    errors::ServiceError,
    events::Event,
    services::numbering::{DocumentCategory, NumberingScheme},
};
use rust_decimal_macros::dec;

use common::TestEngine;

#[tokio::test]
async fn settings_are_seeded_from_configuration() {
    let t = TestEngine::new().await;
    let policy = t.engine.services.settings.current().await.expect("settings");
    assert_eq!(policy.approval_threshold, dec!(1000));
    assert_eq!(policy.pr_numbering, NumberingScheme::Yearly);
    assert_eq!(policy.po_numbering, NumberingScheme::Global);
    assert_eq!(policy.receipt_numbering, NumberingScheme::Global);
    assert_eq!(policy.updated_by, None);
}

#[tokio::test]
async fn threshold_change_is_admin_only_and_takes_effect() {
    let mut t = TestEngine::new().await;
    let settings = t.engine.services.settings.clone();

    for role in [ActorRole::Executive, ActorRole::Purchasing, ActorRole::Accounting] {
        assert_matches!(
            settings.set_approval_threshold(t.actor(role), dec!(100)).await,
            Err(ServiceError::AuthorizationError(_))
        );
    }
    assert_matches!(
        settings
            .set_approval_threshold(t.actor(ActorRole::Admin), dec!(-1))
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let admin = t.actor(ActorRole::Admin);
    let policy = settings
        .set_approval_threshold(admin, dec!(100))
        .await
        .expect("admin may change threshold");
    assert_eq!(policy.approval_threshold, dec!(100));
    assert_eq!(policy.updated_by, Some(admin));

    // A 150 request is now above the threshold; purchasing can no longer approve it.
    let pr = t.draft_pr(&[("Paint", dec!(3), dec!(50))]).await;
    let requests = &t.engine.services.purchase_requests;
    requests
        .submit(SubmitPurchaseRequestCommand {
            purchase_request_id: pr.header.id,
            actor_id: t.actor(ActorRole::Pm),
            message: None,
        })
        .await
        .expect("submit");
    assert_matches!(
        requests
            .approve(ApprovePurchaseRequestCommand {
                purchase_request_id: pr.header.id,
                actor_id: t.actor(ActorRole::Purchasing),
                message: None,
            })
            .await,
        Err(ServiceError::AuthorizationError(_))
    );

    let events = t.drain_events();
    assert!(events.contains(&Event::ApprovalThresholdChanged {
        actor_id: admin,
        threshold: "100".into(),
    }));
}

#[tokio::test]
async fn numbering_scheme_switch_applies_to_new_documents() {
    let t = TestEngine::new().await;
    let settings = &t.engine.services.settings;

    assert_matches!(
        settings
            .set_numbering_scheme(
                t.actor(ActorRole::Ops),
                DocumentCategory::PurchaseOrder,
                NumberingScheme::Yearly,
            )
            .await,
        Err(ServiceError::AuthorizationError(_))
    );

    let first = t.draft_po(&[]).await;
    assert_eq!(first.header.po_number, "PO-000001");

    let policy = settings
        .set_numbering_scheme(
            t.actor(ActorRole::Commandant),
            DocumentCategory::PurchaseOrder,
            NumberingScheme::Yearly,
        )
        .await
        .expect("switch scheme");
    assert_eq!(policy.po_numbering, NumberingScheme::Yearly);

    let second = t.draft_po(&[]).await;
    assert_eq!(
        second.header.po_number,
        format!("PO-{}-0001", Utc::now().year())
    );
}

#[tokio::test]
async fn document_numbers_stay_unique_under_concurrency() {
    let t = TestEngine::new().await;
    let (a, b, c, d) = tokio::join!(
        t.draft_po(&[]),
        t.draft_po(&[]),
        t.draft_po(&[]),
        t.draft_po(&[]),
    );

    let numbers: HashSet<_> = [a, b, c, d]
        .into_iter()
        .map(|detail| detail.header.po_number)
        .collect();
    let expected: HashSet<_> = (1..=4).map(|n| format!("PO-{:06}", n)).collect();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn role_changes_are_admin_only() {
    let mut t = TestEngine::new().await;
    let admin_service = t.engine.services.administration.clone();
    let newcomer = t.add_actor(ActorRole::User, true).await;

    assert_matches!(
        admin_service
            .set_actor_role(t.actor(ActorRole::Executive), newcomer, ActorRole::Purchasing)
            .await,
        Err(ServiceError::AuthorizationError(_))
    );

    let updated = admin_service
        .set_actor_role(t.actor(ActorRole::Admin), newcomer, ActorRole::Purchasing)
        .await
        .expect("promote");
    assert_eq!(updated.role, ActorRole::Purchasing);

    // The new role is honoured immediately.
    let po = t.draft_po(&[("Steel", dec!(1), dec!(1))]).await;
    t.engine
        .services
        .purchase_orders
        .set_status(purchasing_engine::commands::purchaseorders::SetPurchaseOrderStatusCommand {
            purchase_order_id: po.header.id,
            status: purchasing_engine::entities::purchase_order::PurchaseOrderStatus::Issued,
            actor_id: newcomer,
            message: None,
        })
        .await
        .expect("promoted actor may issue");

    let events = t.drain_events();
    assert!(events.contains(&Event::ActorRoleChanged {
        actor_id: newcomer,
        old_role: "user".into(),
        new_role: "purchasing".into(),
    }));
}

#[tokio::test]
async fn project_log_interleaves_documents_in_order() {
    let t = TestEngine::new().await;
    let pr = t.approved_pr(&[("Rebar", dec!(1), dec!(10))]).await;
    let po = t.issued_po(&[("Rebar", dec!(1), dec!(10))]).await;

    let entries = t
        .engine
        .services
        .audit_log
        .entries_for_project(t.project_id)
        .await
        .expect("project log");

    assert!(entries.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    let first_po = entries
        .iter()
        .position(|e| e.entity_type == AuditEntityType::PurchaseOrder)
        .expect("PO entries present");
    let last_pr = entries
        .iter()
        .rposition(|e| e.entity_type == AuditEntityType::PurchaseRequest)
        .expect("PR entries present");
    assert!(last_pr < first_po, "PR work happened first");

    let pr_entries = entries
        .iter()
        .filter(|e| e.entity_id == pr.header.id)
        .count();
    assert_eq!(pr_entries, 4, "created, line created, submitted, approved");
    assert!(entries.iter().any(|e| e.entity_id == po.header.id));
    assert!(entries.iter().all(|e| e.project_id == Some(t.project_id)));
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use purchasing_engine::{
    commands::{
        purchaseorders::{
            CreatePurchaseOrderCommand, SetPurchaseOrderStatusCommand,
            UpsertPurchaseOrderLineCommand,
        },
        purchaserequests::{
            ApprovePurchaseRequestCommand, CreatePurchaseRequestCommand,
            SubmitPurchaseRequestCommand, UpsertPurchaseRequestLineCommand,
        },
        receipts::{CreateReceiptCommand, UpsertReceiptLineCommand},
    },
    config::AppConfig,
    db::{self, DbPool},
    entities::{
        actor::{self, ActorRole},
        project,
        purchase_order::PurchaseOrderStatus,
        status_log::{self, AuditEntityType},
        vendor,
    },
    events::Event,
    services::{
        purchase_orders::PurchaseOrderDetail, purchase_requests::PurchaseRequestDetail,
        receipts::ReceiptDetail,
    },
    PurchasingEngine,
};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const ALL_ROLES: [ActorRole; 10] = [
    ActorRole::User,
    ActorRole::Pm,
    ActorRole::Super,
    ActorRole::Ops,
    ActorRole::Executive,
    ActorRole::Accounting,
    ActorRole::Shop,
    ActorRole::Purchasing,
    ActorRole::Admin,
    ActorRole::Commandant,
];

/// Engine over a private in-memory SQLite database, seeded with one active
/// actor per role, a project and a vendor.
pub struct TestEngine {
    pub engine: PurchasingEngine,
    pub db: Arc<DbPool>,
    pub project_id: Uuid,
    pub vendor_id: Uuid,
    actors: HashMap<ActorRole, Uuid>,
    events: mpsc::Receiver<Event>,
}

impl TestEngine {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (engine, events) = PurchasingEngine::from_pool(pool, &cfg)
            .await
            .expect("engine wires up");
        let db = engine.db.clone();

        let mut harness = Self {
            engine,
            db,
            project_id: Uuid::nil(),
            vendor_id: Uuid::nil(),
            actors: HashMap::new(),
            events,
        };
        for role in ALL_ROLES {
            let id = harness.add_actor(role, true).await;
            harness.actors.insert(role, id);
        }
        harness.project_id = harness.add_project("P-100", true).await;
        harness.vendor_id = harness.add_vendor("Acme Steel", true).await;
        harness
    }

    pub fn actor(&self, role: ActorRole) -> Uuid {
        self.actors[&role]
    }

    pub async fn add_actor(&self, role: ActorRole, is_active: bool) -> Uuid {
        let now = Utc::now();
        actor::ActiveModel {
            id: Set(Uuid::new_v4()),
            display_name: Set(format!("{} user", role.as_str())),
            role: Set(role),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("insert actor")
        .id
    }

    pub async fn add_project(&self, code: &str, is_active: bool) -> Uuid {
        project::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(format!("Project {}", code)),
            is_active: Set(is_active),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("insert project")
        .id
    }

    pub async fn add_vendor(&self, name: &str, is_active: bool) -> Uuid {
        vendor::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            is_active: Set(is_active),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("insert vendor")
        .id
    }

    /// Events published so far, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn log_for(&self, entity_type: AuditEntityType, id: Uuid) -> Vec<status_log::Model> {
        self.engine
            .services
            .audit_log
            .entries_for_entity(entity_type, id)
            .await
            .expect("read status log")
    }

    pub async fn draft_pr(&self, lines: &[(&str, Decimal, Decimal)]) -> PurchaseRequestDetail {
        let requester = self.actor(ActorRole::Pm);
        let service = &self.engine.services.purchase_requests;
        let mut detail = service
            .create(CreatePurchaseRequestCommand {
                project_id: self.project_id,
                actor_id: requester,
                needed_by: None,
                priority: None,
                notes: None,
            })
            .await
            .expect("create PR");
        for (description, quantity, cost) in lines {
            detail = service
                .upsert_line(pr_line(detail.header.id, requester, description, *quantity, *cost))
                .await
                .expect("add PR line");
        }
        detail
    }

    pub async fn approved_pr(&self, lines: &[(&str, Decimal, Decimal)]) -> PurchaseRequestDetail {
        let detail = self.draft_pr(lines).await;
        let service = &self.engine.services.purchase_requests;
        service
            .submit(SubmitPurchaseRequestCommand {
                purchase_request_id: detail.header.id,
                actor_id: self.actor(ActorRole::Pm),
                message: None,
            })
            .await
            .expect("submit PR");
        service
            .approve(ApprovePurchaseRequestCommand {
                purchase_request_id: detail.header.id,
                actor_id: self.actor(ActorRole::Executive),
                message: None,
            })
            .await
            .expect("approve PR")
    }

    pub async fn draft_po(&self, lines: &[(&str, Decimal, Decimal)]) -> PurchaseOrderDetail {
        let buyer = self.actor(ActorRole::Purchasing);
        let service = &self.engine.services.purchase_orders;
        let mut detail = service
            .create(CreatePurchaseOrderCommand {
                project_id: self.project_id,
                vendor_id: self.vendor_id,
                actor_id: buyer,
                ship_to: None,
                needed_by: None,
                freight_estimate: None,
                tax_estimate: None,
                notes: None,
            })
            .await
            .expect("create PO");
        for (description, quantity, cost) in lines {
            detail = service
                .upsert_line(po_line(detail.header.id, buyer, description, *quantity, *cost))
                .await
                .expect("add PO line");
        }
        detail
    }

    pub async fn issued_po(&self, lines: &[(&str, Decimal, Decimal)]) -> PurchaseOrderDetail {
        let detail = self.draft_po(lines).await;
        self.engine
            .services
            .purchase_orders
            .set_status(SetPurchaseOrderStatusCommand {
                purchase_order_id: detail.header.id,
                status: PurchaseOrderStatus::Issued,
                actor_id: self.actor(ActorRole::Purchasing),
                message: None,
            })
            .await
            .expect("issue PO")
    }

    pub async fn receipt_for(&self, purchase_order_id: Option<Uuid>) -> ReceiptDetail {
        self.engine
            .services
            .receipts
            .create(CreateReceiptCommand {
                project_id: self.project_id,
                actor_id: self.actor(ActorRole::Shop),
                vendor_id: None,
                purchase_order_id,
                location: Some("Yard A".to_string()),
                notes: None,
            })
            .await
            .expect("create receipt")
    }

    pub async fn receive_line(
        &self,
        receipt_id: Uuid,
        po_line_id: Option<Uuid>,
        qty: Decimal,
    ) -> ReceiptDetail {
        self.engine
            .services
            .receipts
            .upsert_line(receipt_line(receipt_id, self.actor(ActorRole::Shop), po_line_id, qty))
            .await
            .expect("add receipt line")
    }
}

pub fn pr_line(
    purchase_request_id: Uuid,
    actor_id: Uuid,
    description: &str,
    quantity: Decimal,
    est_unit_cost: Decimal,
) -> UpsertPurchaseRequestLineCommand {
    UpsertPurchaseRequestLineCommand {
        purchase_request_id,
        actor_id,
        line_id: None,
        description: description.to_string(),
        quantity: Some(quantity),
        uom: Some("ea".to_string()),
        est_unit_cost: Some(est_unit_cost),
        catalog_item_id: None,
        sov_line_id: None,
        timeline_task_id: None,
        sort_order: None,
        is_active: None,
    }
}

pub fn po_line(
    purchase_order_id: Uuid,
    actor_id: Uuid,
    description: &str,
    quantity: Decimal,
    unit_cost: Decimal,
) -> UpsertPurchaseOrderLineCommand {
    UpsertPurchaseOrderLineCommand {
        purchase_order_id,
        actor_id,
        line_id: None,
        description: description.to_string(),
        quantity,
        uom: Some("ea".to_string()),
        unit_cost,
        line_status: None,
        catalog_item_id: None,
        sov_line_id: None,
        timeline_task_id: None,
        sort_order: None,
        is_active: None,
    }
}

pub fn receipt_line(
    receipt_id: Uuid,
    actor_id: Uuid,
    purchase_order_line_id: Option<Uuid>,
    qty_received: Decimal,
) -> UpsertReceiptLineCommand {
    UpsertReceiptLineCommand {
        receipt_id,
        actor_id,
        line_id: None,
        purchase_order_line_id,
        description: "Delivered material".to_string(),
        qty_received,
        uom: Some("ea".to_string()),
        condition: None,
        notes: None,
    }
}

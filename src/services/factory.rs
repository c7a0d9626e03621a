use std::sync::Arc;

use crate::{
    db::DbPool,
    events::EventSender,
    services::{
        administration::AdministrationService, audit::AuditLogService,
        coverage::CoverageService, purchase_orders::PurchaseOrderService,
        purchase_requests::PurchaseRequestService, receipts::ReceiptService,
        settings::SettingsService,
    },
};

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ServiceFactory {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    pub fn purchase_request_service(&self) -> PurchaseRequestService {
        PurchaseRequestService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn purchase_order_service(&self) -> PurchaseOrderService {
        PurchaseOrderService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn receipt_service(&self) -> ReceiptService {
        ReceiptService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn coverage_service(&self) -> CoverageService {
        CoverageService::new(self.db_pool.clone())
    }

    pub fn audit_log_service(&self) -> AuditLogService {
        AuditLogService::new(self.db_pool.clone())
    }

    pub fn settings_service(&self) -> SettingsService {
        SettingsService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn administration_service(&self) -> AdministrationService {
        AdministrationService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    /// Gets a reference to the database pool
    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }

    /// Gets a reference to the event sender
    pub fn event_sender(&self) -> &Arc<EventSender> {
        &self.event_sender
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub purchase_requests: Arc<PurchaseRequestService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub receipts: Arc<ReceiptService>,
    pub coverage: Arc<CoverageService>,
    pub audit_log: Arc<AuditLogService>,
    pub settings: Arc<SettingsService>,
    pub administration: Arc<AdministrationService>,
}

impl ServiceContainer {
    /// Creates a new service container with all services initialized
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            purchase_requests: Arc::new(factory.purchase_request_service()),
            purchase_orders: Arc::new(factory.purchase_order_service()),
            receipts: Arc::new(factory.receipt_service()),
            coverage: Arc::new(factory.coverage_service()),
            audit_log: Arc::new(factory.audit_log_service()),
            settings: Arc::new(factory.settings_service()),
            administration: Arc::new(factory.administration_service()),
        }
    }
}

// Shared building blocks used inside lifecycle transactions
pub mod audit;
pub mod authorization;
pub mod numbering;
pub mod references;

// Workflow services
pub mod purchase_orders;
pub mod purchase_requests;
pub mod receipts;

// Read models
pub mod coverage;

// Administration
pub mod administration;
pub mod settings;

// Service factory for dependency injection
pub mod factory;

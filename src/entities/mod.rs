pub mod actor;
pub mod document_sequence;
pub mod project;
pub mod purchase_order;
pub mod purchase_order_line;
pub mod purchase_request;
pub mod purchase_request_line;
pub mod purchasing_settings;
pub mod receipt;
pub mod receipt_line;
pub mod status_log;
pub mod vendor;

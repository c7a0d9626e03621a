mod create_purchase_order_command;
mod refresh_purchase_order_receipt_status_command;
mod set_purchase_order_status_command;
mod upsert_purchase_order_line_command;

pub use create_purchase_order_command::CreatePurchaseOrderCommand;
pub use refresh_purchase_order_receipt_status_command::RefreshPurchaseOrderReceiptStatusCommand;
pub use set_purchase_order_status_command::SetPurchaseOrderStatusCommand;
pub use upsert_purchase_order_line_command::UpsertPurchaseOrderLineCommand;

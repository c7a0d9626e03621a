use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Domain events published after a workflow transaction commits.
///
/// Delivery is best-effort: the audit log in the database is the record of
/// truth, events only notify in-process listeners.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    PurchaseRequestCreated {
        purchase_request_id: Uuid,
        project_id: Uuid,
        pr_number: String,
    },
    PurchaseRequestUpdated(Uuid),
    PurchaseRequestStatusChanged {
        purchase_request_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PurchaseRequestApprovalReset(Uuid),
    PurchaseRequestConverted {
        purchase_request_id: Uuid,
        purchase_order_id: Uuid,
    },

    PurchaseOrderCreated {
        purchase_order_id: Uuid,
        project_id: Uuid,
        po_number: String,
    },
    PurchaseOrderUpdated(Uuid),
    PurchaseOrderStatusChanged {
        purchase_order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    ReceiptCreated {
        receipt_id: Uuid,
        project_id: Uuid,
        receipt_number: String,
    },
    ReceiptUpdated(Uuid),
    ReceiptStatusChanged {
        receipt_id: Uuid,
        old_status: String,
        new_status: String,
    },

    ApprovalThresholdChanged {
        actor_id: Uuid,
        threshold: String,
    },
    ActorRoleChanged {
        actor_id: Uuid,
        old_role: String,
        new_role: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes an event after commit. The change is already durable, so a
    /// closed channel is logged rather than surfaced to the caller.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping domain event");
        }
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::PurchaseRequestStatusChanged {
                purchase_request_id,
                old_status,
                new_status,
            } => info!(
                purchase_request_id = %purchase_request_id,
                from = %old_status,
                to = %new_status,
                "Purchase request status changed"
            ),
            Event::PurchaseOrderStatusChanged {
                purchase_order_id,
                old_status,
                new_status,
            } => info!(
                purchase_order_id = %purchase_order_id,
                from = %old_status,
                to = %new_status,
                "Purchase order status changed"
            ),
            Event::ReceiptStatusChanged {
                receipt_id,
                old_status,
                new_status,
            } => info!(
                receipt_id = %receipt_id,
                from = %old_status,
                to = %new_status,
                "Receipt status changed"
            ),
            Event::PurchaseRequestConverted {
                purchase_request_id,
                purchase_order_id,
            } => info!(
                purchase_request_id = %purchase_request_id,
                purchase_order_id = %purchase_order_id,
                "Purchase request converted"
            ),
            other => debug!(event = ?other, "Received event"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (sender, rx) = channel(1);
        drop(rx);
        sender
            .send_or_log(Event::PurchaseOrderUpdated(Uuid::new_v4()))
            .await;
        assert!(sender
            .send(Event::ReceiptUpdated(Uuid::new_v4()))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (sender, mut rx) = channel(4);
        let id = Uuid::new_v4();
        sender.send(Event::PurchaseRequestUpdated(id)).await.unwrap();
        sender
            .send(Event::PurchaseRequestApprovalReset(id))
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(Event::PurchaseRequestUpdated(id)));
        assert_eq!(
            rx.recv().await,
            Some(Event::PurchaseRequestApprovalReset(id))
        );
    }
}

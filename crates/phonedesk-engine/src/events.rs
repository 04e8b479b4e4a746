//! # Sale Events
//!
//! Notifications published after a sale or revert has committed.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  complete_sale ──► commit ──► EventBus::publish(Completed) ──┐          │
//! │  revert_sale   ──► commit ──► EventBus::publish(Reverted)  ──┤          │
//! │                                                              ▼          │
//! │                                     broadcast::Sender<SaleEvent>        │
//! │                                        │          │                     │
//! │                                        ▼          ▼                     │
//! │                                 loyalty ledger   dashboards             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Publishing never fails the operation: the sale is already durable, and
//! a subscriber that lags or is absent only misses notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use phonedesk_core::{InventoryStatus, Money};

/// Something that happened to a sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaleEvent {
    Completed {
        sale_id: String,
        item_id: String,
        batch_id: Option<String>,
        sale_price: Money,
        buyer_phone: Option<String>,
        location_id: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Reverted {
        sale_id: String,
        item_id: String,
        restored_status: InventoryStatus,
        occurred_at: DateTime<Utc>,
    },
}

impl SaleEvent {
    pub fn sale_id(&self) -> &str {
        match self {
            SaleEvent::Completed { sale_id, .. } | SaleEvent::Reverted { sale_id, .. } => sale_id,
        }
    }
}

/// Fan-out channel for [`SaleEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SaleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaleEvent> {
        self.sender.subscribe()
    }

    /// Sends to every current subscriber.
    pub fn publish(&self, event: SaleEvent) {
        let sale_id = event.sale_id().to_string();
        match self.sender.send(event) {
            Ok(receivers) => debug!(sale_id = %sale_id, receivers, "Sale event published"),
            Err(_) => debug!(sale_id = %sale_id, "No subscribers for sale event"),
        }
    }
}

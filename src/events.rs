//! Inbound event definitions
//!
//! Defines the `OrderEvent` sum type for all order mutations carried by the
//! feed, and `MessageBatch`, the unit of delivery: one sequence number plus
//! an ordered list of events.
//!
//! Wire format is JSON with a `"type"` tag discriminating event variants
//! (`addOrder` / `changeOrder` / `deleteOrder`) and camelCase field names.
//! `MessageBatch` implements `Ord` on its sequence number so batches sort
//! deterministically after reassembly.

use serde::{Deserialize, Serialize};

use crate::ids::{OrderId, ProductId};

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

/// One order mutation carried by the feed.
///
/// Modeled as a closed sum type dispatched by `OrderTable::apply` rather than
/// open-ended dynamic dispatch, so every event is handled exhaustively and
/// all live orders share one record representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OrderEvent {
    /// A new order; inserts or overwrites the record for this id.
    #[serde(rename_all = "camelCase")]
    AddOrder {
        order_id: OrderId,
        product_id: ProductId,
        side: Side,
        price: i64,
        quantity: i64,
    },

    /// Price/quantity update for an existing order; no-op if the id is absent.
    #[serde(rename_all = "camelCase")]
    ChangeOrder {
        order_id: OrderId,
        price: i64,
        quantity: i64,
    },

    /// Removal of an existing order; no-op if the id is absent.
    #[serde(rename_all = "camelCase")]
    DeleteOrder { order_id: OrderId },
}

impl OrderEvent {
    /// The order id this event targets.
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::AddOrder { order_id, .. } => *order_id,
            OrderEvent::ChangeOrder { order_id, .. } => *order_id,
            OrderEvent::DeleteOrder { order_id } => *order_id,
        }
    }

    /// Get the event type as a string label for logging.
    pub fn event_type_label(&self) -> &'static str {
        match self {
            OrderEvent::AddOrder { .. } => "addOrder",
            OrderEvent::ChangeOrder { .. } => "changeOrder",
            OrderEvent::DeleteOrder { .. } => "deleteOrder",
        }
    }
}

/// One inbound delivery unit: a sequence number plus its ordered events.
///
/// The wire field is `inSequenceNumber`; `messages` holds the events in the
/// order they must be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBatch {
    /// Serial number of this batch within the feed.
    pub in_sequence_number: u64,
    /// Events to apply, in original list order.
    pub messages: Vec<OrderEvent>,
}

impl MessageBatch {
    /// Create a batch from a sequence number and its events.
    pub fn new(in_sequence_number: u64, messages: Vec<OrderEvent>) -> Self {
        Self {
            in_sequence_number,
            messages,
        }
    }
}

/// Ordering by sequence number for deterministic replay.
impl Ord for MessageBatch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.in_sequence_number.cmp(&other.in_sequence_number)
    }
}

impl PartialOrd for MessageBatch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

//! Cumulative order table
//!
//! Folds ordered `OrderEvent`s into the live set of orders, keyed by order
//! id. Uses `BTreeMap` for deterministic iteration when the aggregator walks
//! the live set.
//!
//! The table processes:
//! - `AddOrder` → insert or overwrite the record
//! - `ChangeOrder` → update price/quantity of an existing record
//! - `DeleteOrder` → remove the record
//!
//! Change and Delete events referencing an unknown id are silent no-ops: over
//! a lossy feed, an order's Add may simply never have arrived, and that must
//! not fail the pipeline.
//!
//! The table is cumulative process-lifetime state. It is never cleared
//! between aggregation cycles; only `DeleteOrder` removes entries.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::events::{OrderEvent, Side};
use crate::ids::{OrderId, ProductId};

/// Materialized state of one live order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    /// Product this order belongs to.
    pub product_id: ProductId,
    /// Buy or sell side.
    pub side: Side,
    /// Limit price in integer ticks.
    pub price: i64,
    /// Open quantity.
    pub quantity: i64,
}

/// Mutable map from order id to live order state.
#[derive(Debug, Default)]
pub struct OrderTable {
    orders: BTreeMap<OrderId, OrderRecord>,
}

impl OrderTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event to the table.
    ///
    /// Total over all inputs: unknown ids on Change/Delete are dropped
    /// silently, matching the lossy-transport contract.
    pub fn apply(&mut self, event: OrderEvent) {
        match event {
            OrderEvent::AddOrder {
                order_id,
                product_id,
                side,
                price,
                quantity,
            } => {
                trace!(order_id = %order_id, product_id = %product_id, "Adding order");
                self.orders.insert(
                    order_id,
                    OrderRecord {
                        product_id,
                        side,
                        price,
                        quantity,
                    },
                );
            }

            OrderEvent::ChangeOrder {
                order_id,
                price,
                quantity,
            } => {
                if let Some(record) = self.orders.get_mut(&order_id) {
                    record.price = price;
                    record.quantity = quantity;
                } else {
                    debug!(order_id = %order_id, "Change for unknown order — ignored");
                }
            }

            OrderEvent::DeleteOrder { order_id } => {
                if self.orders.remove(&order_id).is_none() {
                    debug!(order_id = %order_id, "Delete for unknown order — ignored");
                }
            }
        }
    }

    /// Apply every event of a batch in its original list order.
    pub fn apply_batch(&mut self, events: Vec<OrderEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Look up a live order.
    pub fn get(&self, order_id: OrderId) -> Option<&OrderRecord> {
        self.orders.get(&order_id)
    }

    /// Number of live orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the table holds no live orders.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Iterate over all live records in order-id order.
    pub fn records(&self) -> impl Iterator<Item = &OrderRecord> {
        self.orders.values()
    }
}

//! Price-level aggregation
//!
//! Drives one full aggregation cycle: drain the sequence buffer, replay the
//! batches into the order table, derive per-product price levels, and
//! partition the result into fixed-size bulks for transmission.
//!
//! Grouping is BTreeMap-keyed throughout, so the output is deterministic:
//! products appear in ascending product-id order, sell levels ascend by
//! price, buy levels descend. Bulks carry a 1-based `outSequenceNumber` so a
//! downstream consumer on a lossy transport can detect missing or reordered
//! bulks.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buffer::SequenceBuffer;
use crate::events::Side;
use crate::ids::ProductId;
use crate::order_table::{OrderRecord, OrderTable};

/// Aggregated quantity at one price, for one product and side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: i64,
    pub quantity: i64,
}

/// Aggregated price levels for one product.
///
/// `buy_levels` descend by price, `sell_levels` ascend. A side with no live
/// orders is an empty list, never absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: ProductId,
    pub buy_levels: Vec<Level>,
    pub sell_levels: Vec<Level>,
}

/// One outbound partition of the aggregated product list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsBulk {
    /// 1-based position of this bulk within the cycle's partition.
    pub out_sequence_number: u64,
    pub products: Vec<Product>,
}

/// Replays reassembled batches into the order table and derives bulked
/// price-level snapshots.
///
/// Exclusively owns the order table; shares the buffer with the ingestion
/// path through a mutex. One `run_cycle` call is one bounded, synchronous
/// unit of work.
pub struct PriceLevelAggregator {
    /// Reassembly buffer shared with the ingestion path.
    buffer: Arc<Mutex<SequenceBuffer>>,
    /// Cumulative order state, fed only by this aggregator.
    table: OrderTable,
    /// Maximum products per outbound bulk.
    bulk_size: usize,
}

impl PriceLevelAggregator {
    /// Create an aggregator over the shared buffer.
    ///
    /// `bulk_size` must be at least 1; config validation enforces this before
    /// construction.
    pub fn new(buffer: Arc<Mutex<SequenceBuffer>>, bulk_size: usize) -> Self {
        Self {
            buffer,
            table: OrderTable::new(),
            bulk_size,
        }
    }

    /// Run one aggregation cycle.
    ///
    /// Drains the buffer (snapshot-and-clear under the buffer lock), replays
    /// every batch's events in ascending sequence order, then aggregates the
    /// full current table. An empty table yields an empty bulk list.
    pub fn run_cycle(&mut self) -> Vec<ProductsBulk> {
        self.replay_drained();
        self.aggregate()
    }

    /// Number of live orders currently in the table.
    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    /// Pull everything out of the buffer and fold it into the order table.
    fn replay_drained(&mut self) {
        let batches = self.buffer.lock().drain();
        let batch_count = batches.len();

        for batch in batches {
            debug!(
                sequence = batch.in_sequence_number,
                events = batch.messages.len(),
                "Replaying batch"
            );
            self.table.apply_batch(batch.messages);
        }

        info!(
            batches = batch_count,
            live_orders = self.table.len(),
            "Replay finished"
        );
    }

    /// Derive sorted price levels per product and partition them into bulks.
    fn aggregate(&self) -> Vec<ProductsBulk> {
        // Ascending product-id order is the canonical (documented) contract.
        let mut by_product: BTreeMap<&ProductId, (Vec<&OrderRecord>, Vec<&OrderRecord>)> =
            BTreeMap::new();

        for record in self.table.records() {
            let (buys, sells) = by_product.entry(&record.product_id).or_default();
            match record.side {
                Side::Buy => buys.push(record),
                Side::Sell => sells.push(record),
            }
        }

        let products: Vec<Product> = by_product
            .into_iter()
            .map(|(product_id, (buys, sells))| Product {
                product_id: product_id.clone(),
                buy_levels: price_levels_descending(&buys),
                sell_levels: price_levels_ascending(&sells),
            })
            .collect();

        products
            .chunks(self.bulk_size)
            .enumerate()
            .map(|(index, chunk)| ProductsBulk {
                out_sequence_number: (index + 1) as u64,
                products: chunk.to_vec(),
            })
            .collect()
    }
}

/// Sum quantities per distinct price.
fn levels_by_price(records: &[&OrderRecord]) -> BTreeMap<i64, i64> {
    let mut levels: BTreeMap<i64, i64> = BTreeMap::new();
    for record in records {
        *levels.entry(record.price).or_insert(0) += record.quantity;
    }
    levels
}

/// Levels in ascending price order (sell side: best ask first).
fn price_levels_ascending(records: &[&OrderRecord]) -> Vec<Level> {
    levels_by_price(records)
        .into_iter()
        .map(|(price, quantity)| Level { price, quantity })
        .collect()
}

/// Levels in descending price order (buy side: best bid first).
fn price_levels_descending(records: &[&OrderRecord]) -> Vec<Level> {
    levels_by_price(records)
        .into_iter()
        .rev()
        .map(|(price, quantity)| Level { price, quantity })
        .collect()
}

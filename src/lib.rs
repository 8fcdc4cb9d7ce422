//! Stock Aggregator Service
//!
//! Consumes order-event batches from a lossy, unordered UDP multicast feed
//! and periodically republishes aggregated price levels:
//! - Sequence reassembly with gap detection and bounded caching
//! - Cumulative order table folded from Add/Change/Delete events
//! - Per-product sorted price levels, partitioned into fixed-size bulks
//!
//! # Architecture
//!
//! ```text
//! UDP multicast datagrams
//!        │
//!    ┌───▼────┐
//!    │ Buffer │  ← Reorders, dedupes, bounds out-of-order memory
//!    └───┬────┘
//!        │ drain (periodic)
//!    ┌───▼────────┐
//!    │ OrderTable │  ← Cumulative order state
//!    └───┬────────┘
//!        │
//!    ┌───▼────────┐
//!    │ Aggregator │  ← Price levels per product/side, bulk partitioning
//!    └───┬────────┘
//!        │
//!   UDP multicast emission (one datagram per bulk)
//! ```

pub mod aggregation;
pub mod buffer;
pub mod config;
pub mod events;
pub mod ids;
pub mod order_table;
pub mod udp;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";

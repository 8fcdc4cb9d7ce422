//! UDP multicast transport
//!
//! Wires the core to the outside world: a receive loop that decodes inbound
//! datagrams and submits them to the sequence buffer, and a periodic emitter
//! that runs one aggregation cycle per tick and sends each resulting bulk as
//! one JSON datagram.
//!
//! Malformed datagrams are logged and dropped here; the core never observes a
//! partially decoded batch. Send failures are likewise logged and never fed
//! back into core state.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::aggregation::PriceLevelAggregator;
use crate::buffer::SequenceBuffer;
use crate::config::ServiceConfig;
use crate::events::MessageBatch;

/// Largest datagram the receive loop will accept.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Errors raised by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to encode outbound bulk: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Bind the inbound socket and join the configured multicast group.
pub async fn bind_multicast(config: &ServiceConfig) -> Result<UdpSocket, TransportError> {
    let socket = UdpSocket::bind((config.listen_host.as_str(), config.listen_port)).await?;

    let group: IpAddr = config.multicast_address.parse().map_err(
        |e: std::net::AddrParseError| TransportError::InvalidAddress {
            address: config.multicast_address.clone(),
            reason: e.to_string(),
        },
    )?;

    match group {
        IpAddr::V4(addr) if addr.is_multicast() => {
            socket.join_multicast_v4(addr, Ipv4Addr::UNSPECIFIED)?;
            info!(group = %addr, "Joined multicast group");
        }
        IpAddr::V6(addr) if addr.is_multicast() => {
            socket.join_multicast_v6(&addr, 0)?;
            info!(group = %addr, "Joined multicast group");
        }
        other => {
            // Unicast address: nothing to join, plain bound socket suffices
            debug!(address = %other, "Configured feed address is not multicast");
        }
    }

    Ok(socket)
}

/// Decode one inbound datagram into a `MessageBatch`.
pub fn decode_batch(payload: &[u8]) -> Result<MessageBatch, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Receive loop: decode datagrams and submit them to the buffer.
///
/// Runs until the socket fails. Decode failures drop the datagram; the
/// sender is unreliable by assumption, so a bad payload is not worth more
/// than an error log.
pub async fn run_ingestion(
    socket: UdpSocket,
    buffer: Arc<Mutex<SequenceBuffer>>,
) -> Result<(), TransportError> {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;

        match decode_batch(&buf[..len]) {
            Ok(batch) => {
                debug!(
                    sequence = batch.in_sequence_number,
                    events = batch.messages.len(),
                    peer = %peer,
                    "Received batch"
                );
                buffer.lock().submit(batch);
            }
            Err(e) => {
                error!(peer = %peer, error = %e, "Failed to decode inbound datagram");
            }
        }
    }
}

/// Periodic emitter: one aggregation cycle per tick, one datagram per bulk.
///
/// Ticks that would overlap a still-running cycle are skipped rather than
/// queued; the aggregator is exclusively owned by this task, so cycles can
/// never run concurrently.
pub async fn run_emitter(
    config: &ServiceConfig,
    mut aggregator: PriceLevelAggregator,
) -> Result<(), TransportError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let destination = (config.emission_address.as_str(), config.emission_port);

    let mut interval = tokio::time::interval(Duration::from_millis(config.emission_period_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let bulks = aggregator.run_cycle();
        debug!(bulks = bulks.len(), "Aggregation cycle finished");

        for bulk in bulks {
            let payload = serde_json::to_vec(&bulk)?;
            match socket.send_to(&payload, destination).await {
                Ok(bytes) => debug!(
                    out_sequence = bulk.out_sequence_number,
                    bytes, "Bulk emitted"
                ),
                Err(e) => warn!(
                    out_sequence = bulk.out_sequence_number,
                    error = %e,
                    "Failed to emit bulk"
                ),
            }
        }
    }
}

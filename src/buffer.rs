//! Sequence reassembly buffer
//!
//! Absorbs `MessageBatch` arrivals that may be reordered or duplicated by the
//! transport and exposes them for consumption as a deduplicated run in
//! ascending sequence order, while bounding the memory spent on out-of-order
//! arrivals.
//!
//! A batch is accepted directly when the buffer is empty, when its sequence
//! number sits below the current maximum (retransmissions and stale numbers
//! collapse into the sorted set without a cache round-trip), or when it
//! extends the maximum by exactly one. Anything else opens a gap and is held
//! in a side cache until the gap closes. When the cache is full, the whole
//! cache is discarded at once rather than evicting single entries: bounded
//! memory is bought with the loss of an entire unresolved run.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::events::MessageBatch;

/// Reorders and deduplicates inbound batches between transport and aggregation.
///
/// `submit` and `drain` are both total; reassembly failures surface only as
/// data loss, never as errors.
pub struct SequenceBuffer {
    /// Accepted batches, keyed and sorted by sequence number.
    accepted: BTreeMap<u64, MessageBatch>,
    /// Gapped arrivals waiting for their predecessors.
    cache: HashMap<u64, MessageBatch>,
    /// Maximum number of gapped batches held before the cache is discarded.
    cache_capacity: usize,
    /// Total batches accepted into the ordered set.
    batches_accepted: u64,
    /// Total batches placed in the gap cache.
    batches_cached: u64,
    /// Total all-or-nothing cache evictions.
    cache_evictions: u64,
}

impl SequenceBuffer {
    /// Create a buffer with the given gap-cache capacity.
    pub fn new(cache_capacity: usize) -> Self {
        debug!(cache_capacity, "SequenceBuffer initialized");

        Self {
            accepted: BTreeMap::new(),
            cache: HashMap::with_capacity(cache_capacity),
            cache_capacity,
            batches_accepted: 0,
            batches_cached: 0,
            cache_evictions: 0,
        }
    }

    /// Submit one inbound batch.
    ///
    /// Accepted batches may close a gap, in which case the now-contiguous run
    /// held in the cache is folded into the ordered set in the same call.
    /// Insertion is idempotent: a sequence number already accepted is left
    /// untouched.
    pub fn submit(&mut self, batch: MessageBatch) {
        let mut pending = Some(batch);

        while let Some(batch) = pending.take() {
            let seq = batch.in_sequence_number;

            if self.is_expected(seq) {
                if let std::collections::btree_map::Entry::Vacant(entry) =
                    self.accepted.entry(seq)
                {
                    entry.insert(batch);
                    self.batches_accepted += 1;
                    debug!(
                        sequence = seq,
                        buffered = self.accepted.len(),
                        "Batch accepted"
                    );
                }
                // A cached successor may itself fail the acceptance check
                // (e.g. it now equals the maximum); it goes back to the cache.
                pending = self.cache.remove(&(seq + 1));
            } else {
                self.put_in_cache(batch);
            }
        }
    }

    /// Take the whole accepted run, ascending by sequence number.
    ///
    /// Empties the ordered set and unconditionally clears the gap cache: a
    /// batch still waiting on a predecessor at drain time is lost for good.
    pub fn drain(&mut self) -> Vec<MessageBatch> {
        if !self.cache.is_empty() {
            debug!(
                discarded = self.cache.len(),
                "Discarding unresolved gapped batches on drain"
            );
        }
        self.cache.clear();

        std::mem::take(&mut self.accepted).into_values().collect()
    }

    /// Number of batches currently accepted.
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    /// Whether the accepted set is empty.
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Number of gapped batches currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Highest accepted sequence number, if any.
    pub fn max_sequence(&self) -> Option<u64> {
        self.accepted.keys().next_back().copied()
    }

    /// Total batches accepted since creation.
    pub fn batches_accepted(&self) -> u64 {
        self.batches_accepted
    }

    /// Total batches cached since creation.
    pub fn batches_cached(&self) -> u64 {
        self.batches_cached
    }

    /// Total all-or-nothing cache evictions since creation.
    pub fn cache_evictions(&self) -> u64 {
        self.cache_evictions
    }

    /// A sequence number is expected when the buffer is empty, when it sits
    /// below the current maximum, or when it extends the maximum by one.
    fn is_expected(&self, seq: u64) -> bool {
        match self.max_sequence() {
            None => true,
            Some(max) => seq < max || seq == max + 1,
        }
    }

    /// Hold a gapped batch until its predecessors arrive.
    ///
    /// At capacity the entire cache is discarded and the new batch dropped
    /// with it; eviction is all-or-nothing, not per-entry.
    fn put_in_cache(&mut self, batch: MessageBatch) {
        if self.cache.len() >= self.cache_capacity {
            warn!(
                capacity = self.cache_capacity,
                dropped_sequence = batch.in_sequence_number,
                "Gap cache full — discarding all cached batches"
            );
            self.cache.clear();
            self.cache_evictions += 1;
        } else {
            debug!(
                sequence = batch.in_sequence_number,
                cached = self.cache.len() + 1,
                "Batch cached pending gap resolution"
            );
            self.cache.insert(batch.in_sequence_number, batch);
            self.batches_cached += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(seq: u64) -> MessageBatch {
        MessageBatch::new(seq, Vec::new())
    }

    fn drained_sequences(buffer: &mut SequenceBuffer) -> Vec<u64> {
        buffer
            .drain()
            .into_iter()
            .map(|b| b.in_sequence_number)
            .collect()
    }

    #[test]
    fn test_first_batch_always_accepted() {
        let mut buffer = SequenceBuffer::new(10);
        buffer.submit(batch(100));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.max_sequence(), Some(100));
    }

    #[test]
    fn test_contiguous_run_accepted_in_order() {
        let mut buffer = SequenceBuffer::new(10);
        for seq in 1..=5 {
            buffer.submit(batch(seq));
        }
        assert_eq!(drained_sequences(&mut buffer), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_gapped_batch_goes_to_cache() {
        let mut buffer = SequenceBuffer::new(10);
        buffer.submit(batch(1));
        buffer.submit(batch(3));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.cached_len(), 1);
    }

    #[test]
    fn test_gap_fill_folds_cached_run() {
        let mut buffer = SequenceBuffer::new(10);
        buffer.submit(batch(1));
        buffer.submit(batch(3));
        buffer.submit(batch(4));
        buffer.submit(batch(5));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.cached_len(), 3);

        // Closing the gap pulls the whole cached run in
        buffer.submit(batch(2));
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.cached_len(), 0);
        assert_eq!(drained_sequences(&mut buffer), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_below_max_accepted_directly() {
        let mut buffer = SequenceBuffer::new(10);
        buffer.submit(batch(5));
        // Stale/late numbers below the max skip the cache entirely
        buffer.submit(batch(2));
        buffer.submit(batch(4));

        assert_eq!(buffer.cached_len(), 0);
        assert_eq!(drained_sequences(&mut buffer), vec![2, 4, 5]);
    }

    #[test]
    fn test_duplicate_submission_is_idempotent() {
        let mut buffer = SequenceBuffer::new(10);
        buffer.submit(batch(1));
        buffer.submit(batch(2));
        buffer.submit(batch(1));
        buffer.submit(batch(1));

        assert_eq!(drained_sequences(&mut buffer), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_of_current_max_is_cached() {
        let mut buffer = SequenceBuffer::new(10);
        buffer.submit(batch(3));
        // Equal to the maximum: neither below it nor max + 1
        buffer.submit(batch(3));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.cached_len(), 1);
    }

    #[test]
    fn test_cache_eviction_is_all_or_nothing() {
        let mut buffer = SequenceBuffer::new(3);
        buffer.submit(batch(1));

        // Three gapped arrivals fill the cache
        buffer.submit(batch(10));
        buffer.submit(batch(11));
        buffer.submit(batch(12));
        assert_eq!(buffer.cached_len(), 3);

        // The fourth discards everything, itself included
        buffer.submit(batch(13));
        assert_eq!(buffer.cached_len(), 0);
        assert_eq!(buffer.cache_evictions(), 1);

        // Even after the predecessors arrive, the discarded run is gone
        for seq in 2..=9 {
            buffer.submit(batch(seq));
        }
        assert_eq!(
            drained_sequences(&mut buffer),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9]
        );
    }

    #[test]
    fn test_cache_refills_after_eviction() {
        let mut buffer = SequenceBuffer::new(2);
        buffer.submit(batch(1));
        buffer.submit(batch(5));
        buffer.submit(batch(6));
        // Eviction clears the cache...
        buffer.submit(batch(7));
        assert_eq!(buffer.cached_len(), 0);
        // ...and new gapped arrivals start filling it again
        buffer.submit(batch(8));
        assert_eq!(buffer.cached_len(), 1);
    }

    #[test]
    fn test_drain_clears_cache() {
        let mut buffer = SequenceBuffer::new(10);
        buffer.submit(batch(1));
        buffer.submit(batch(5));
        assert_eq!(buffer.cached_len(), 1);

        let drained = buffer.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(buffer.cached_len(), 0);

        // The cached batch was discarded: its predecessors arriving later
        // cannot resurrect it
        buffer.submit(batch(2));
        buffer.submit(batch(3));
        buffer.submit(batch(4));
        assert_eq!(drained_sequences(&mut buffer), vec![2, 3, 4]);
    }

    #[test]
    fn test_drain_twice_is_empty() {
        let mut buffer = SequenceBuffer::new(10);
        buffer.submit(batch(1));
        buffer.submit(batch(2));

        assert_eq!(buffer.drain().len(), 2);
        assert!(buffer.drain().is_empty());
        assert!(buffer.is_empty());
        assert_eq!(buffer.cached_len(), 0);
    }

    #[test]
    fn test_reverse_order_delivery() {
        let mut buffer = SequenceBuffer::new(10);
        // Descending delivery never needs the cache: every arrival after the
        // first sits below the maximum
        for seq in (1..=6).rev() {
            buffer.submit(batch(seq));
        }
        assert_eq!(buffer.cached_len(), 0);
        assert_eq!(drained_sequences(&mut buffer), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_buffer_stats() {
        let mut buffer = SequenceBuffer::new(2);
        buffer.submit(batch(1));
        buffer.submit(batch(2));
        buffer.submit(batch(9));
        assert_eq!(buffer.batches_accepted(), 2);
        assert_eq!(buffer.batches_cached(), 1);
        assert_eq!(buffer.cache_evictions(), 0);
    }
}

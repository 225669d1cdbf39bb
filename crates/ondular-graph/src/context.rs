//! Per-block evaluation context and dedup cache.
//!
//! Stateful nodes advance internal clocks as a side effect of sampling. When
//! the same node instance is reachable from two paths in the graph (a
//! diamond), pulling it twice in one block would double-advance that clock
//! and desynchronize the two consumers. The [`EvalContext`] prevents this:
//! the first pull of a tracked node within a block computes and stores the
//! result; every further same-block pull returns the stored block unchanged.
//!
//! The context is owned by the driver and threaded through the pull
//! traversal. The driver calls [`begin_block`](EvalContext::begin_block) once
//! per output block (or uses [`next_block`](EvalContext::next_block)), which
//! invalidates all cached entries by bumping the block serial.

use std::collections::HashMap;

use crate::node::{Block, NodeId, NodeRef};

struct CacheEntry {
    /// Block serial the entry was stored under.
    serial: u64,
    /// The computed result — `None` caches end-of-stream, so a finished
    /// shared node reports end-of-stream consistently to every consumer.
    result: Option<Block>,
}

/// Mutable evaluation state for one graph, passed through every pull.
#[derive(Default)]
pub struct EvalContext {
    serial: u64,
    cache: HashMap<NodeId, CacheEntry>,
}

impl EvalContext {
    /// Creates a fresh context with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a new output block, invalidating all cached
    /// entries from the previous one.
    pub fn begin_block(&mut self) {
        self.serial += 1;
    }

    /// The current block serial. Advances monotonically in block order.
    pub fn block_serial(&self) -> u64 {
        self.serial
    }

    /// Convenience driver step: begins a new block and pulls the root.
    pub fn next_block(&mut self, root: &NodeRef, count: usize) -> Option<Block> {
        self.begin_block();
        root.borrow_mut().sample(self, count)
    }

    /// Returns the result already computed for `id` within the current
    /// block, if any. The outer `Option` distinguishes "not sampled yet this
    /// block" from a cached end-of-stream (`Some(None)`).
    pub fn lookup(&self, id: NodeId) -> Option<Option<Block>> {
        self.cache
            .get(&id)
            .filter(|entry| entry.serial == self.serial)
            .map(|entry| entry.result.clone())
    }

    /// Records the result of sampling `id` for the current block.
    pub fn store(&mut self, id: NodeId, result: Option<Block>) {
        self.cache.insert(
            id,
            CacheEntry {
                serial: self.serial,
                result,
            },
        );
    }

    /// Drops any cached result for `id`.
    pub fn invalidate(&mut self, id: NodeId) {
        self.cache.remove(&id);
    }

    /// Notification that `id`'s sample rate changed; purges per-rate cached
    /// state so the next pull recomputes at the new rate.
    pub fn rate_changed(&mut self, id: NodeId) {
        if self.cache.remove(&id).is_some() {
            tracing::trace!("cache purge after rate change: {id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::silence;

    #[test]
    fn lookup_misses_before_store() {
        let ctx = EvalContext::new();
        assert!(ctx.lookup(NodeId::next()).is_none());
    }

    #[test]
    fn stored_block_hits_within_same_block() {
        let mut ctx = EvalContext::new();
        let id = NodeId::next();
        ctx.begin_block();

        let block = silence(16);
        ctx.store(id, Some(block.clone()));

        let hit = ctx.lookup(id).expect("entry present");
        let hit = hit.expect("not end-of-stream");
        assert!(std::rc::Rc::ptr_eq(&hit, &block), "same buffer, not a copy");
    }

    #[test]
    fn begin_block_invalidates_previous_entries() {
        let mut ctx = EvalContext::new();
        let id = NodeId::next();
        ctx.begin_block();
        ctx.store(id, Some(silence(16)));

        ctx.begin_block();
        assert!(ctx.lookup(id).is_none());
    }

    #[test]
    fn end_of_stream_is_cached() {
        let mut ctx = EvalContext::new();
        let id = NodeId::next();
        ctx.begin_block();
        ctx.store(id, None);

        assert_eq!(ctx.lookup(id), Some(None));
    }

    #[test]
    fn rate_change_purges_entry() {
        let mut ctx = EvalContext::new();
        let id = NodeId::next();
        ctx.begin_block();
        ctx.store(id, Some(silence(8)));

        ctx.rate_changed(id);
        assert!(ctx.lookup(id).is_none());
    }
}

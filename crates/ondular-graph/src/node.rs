//! The node contract for the pull-based signal graph.
//!
//! Every processing element implements [`SignalNode`]: it produces a block of
//! samples on demand, names its upstream sources, and reports its sample rate
//! and rate-change capability. Nodes never own each other exclusively —
//! sources are shared [`NodeRef`] handles, so one node may feed any number of
//! downstream consumers (the diamond case).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::EvalContext;

/// One block of samples. Reference-counted so the per-block cache can hand
/// the same buffer to every consumer that pulls a shared node.
pub type Block = Rc<[f32]>;

/// Shared handle to a graph node.
///
/// The evaluation model is single-threaded and cooperative (one logical audio
/// thread pulls the root once per block), so `Rc<RefCell<_>>` is the right
/// ownership shape: cheap to clone, interior mutability for the pull, no
/// locking discipline required.
pub type NodeRef = Rc<RefCell<dyn SignalNode>>;

/// Named upstream sources of a node, in pull order.
pub type NamedSources = Vec<(String, NodeRef)>;

/// Sample rate assumed by nodes that need one before any rate has been
/// propagated through the graph.
pub const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

/// Unique identifier for a graph node.
///
/// IDs come from a process-wide counter and are never reused, so they remain
/// stable across graph mutations — the per-block cache keys on them rather
/// than on addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

impl NodeId {
    /// Allocates a fresh node ID.
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// How a node responds to sample-rate changes.
///
/// This replaces a duck-typed "responds to rate-change" probe with an explicit
/// capability checked before any mutation happens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RateSupport {
    /// Rate may be set; propagation recurses into this node's sources.
    #[default]
    Adjustable,
    /// Rate is fixed; a propagation that reaches this node fails whole.
    Fixed,
    /// The node resamples internally. Propagation neither sets its rate nor
    /// recurses past it.
    Boundary,
}

/// A node in the pull-based signal graph.
///
/// # Contract
///
/// - [`sample`](Self::sample) returns a block of exactly `count` samples, or
///   `None` as the end-of-stream marker. End-of-stream is a normal terminal
///   condition, not an error.
/// - Any node whose `sample` advances internal time-varying state must route
///   the call through the [`EvalContext`] cache (see
///   [`EvalContext::lookup`]), so that a shared node advances exactly once
///   per block no matter how many paths pull it. Pure combiners may
///   recompute.
/// - Graphs are acyclic. Pulling a node from inside its own upstream chain
///   would panic on the `RefCell` borrow.
pub trait SignalNode {
    /// Stable identity of this node, used as the cache key.
    fn id(&self) -> NodeId;

    /// Human-readable name, used in error messages and introspection.
    fn name(&self) -> &str;

    /// Produces the next `count` samples, or `None` at end-of-stream.
    fn sample(&mut self, ctx: &mut EvalContext, count: usize) -> Option<Block>;

    /// Named upstream sources, used by rate propagation and introspection.
    fn sources(&self) -> NamedSources {
        Vec::new()
    }

    /// The node's sample rate, or `None` if no rate has been assigned yet
    /// (pure combiners start unset).
    fn sample_rate(&self) -> Option<f32>;

    /// Rate-change capability of this node.
    fn rate_support(&self) -> RateSupport {
        RateSupport::Adjustable
    }

    /// Applies a new sample rate.
    ///
    /// Called only by the propagation machinery after the whole upstream
    /// closure has been verified, never directly by consumers — use
    /// [`propagate_sample_rate`](crate::propagate_sample_rate).
    fn set_rate(&mut self, rate: f32);
}

/// Wraps a concrete node into a shared [`NodeRef`].
pub fn shared<N: SignalNode + 'static>(node: N) -> Rc<RefCell<N>> {
    Rc::new(RefCell::new(node))
}

/// An all-zero block of the given length.
pub fn silence(count: usize) -> Block {
    Rc::from(vec![0.0f32; count])
}

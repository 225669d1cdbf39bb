//! Ondular Graph - pull-based signal graph core
//!
//! A lazily-evaluated audio graph: every node produces a fixed-size block of
//! `f32` samples on demand, pulling its sources first. Graphs are frequently
//! DAGs with shared subgraphs (diamonds); the evaluation context guarantees
//! that a shared stateful node advances exactly once per output block no
//! matter how many paths pull it.
//!
//! # Core Abstractions
//!
//! - [`SignalNode`] — the node contract: `sample(ctx, count)`, named
//!   `sources()`, a sample rate, and an explicit rate-change capability
//! - [`EvalContext`] — driver-owned evaluation state with the per-block
//!   dedup cache
//! - [`Constant`] — smoothed scalar parameter source, the base of every
//!   externally-modulated parameter
//! - [`Mix`] / [`Product`] — arithmetic combinators
//! - [`Resample`] — linear-interpolation rate boundary
//! - [`propagate_sample_rate`] / [`reconcile_sample_rate`] — transactional
//!   rate changes across the upstream closure
//!
//! # Driving a graph
//!
//! The driver (an audio output loop, external to this crate) owns the root
//! handle and the context, and pulls once per block:
//!
//! ```rust
//! use ondular_graph::{Constant, EvalContext, Mix, NodeRef, Unit, shared};
//!
//! let a: NodeRef = shared(Constant::new("a", 0.25, -1.0..=1.0, Unit::None).unwrap());
//! let b: NodeRef = shared(Constant::new("b", 0.5, -1.0..=1.0, Unit::None).unwrap());
//! let root: NodeRef = shared(Mix::new("mix", vec![a, b]));
//!
//! let mut ctx = EvalContext::new();
//! let block = ctx.next_block(&root, 64).expect("not end-of-stream");
//! assert_eq!(block.len(), 64);
//! ```
//!
//! # Concurrency model
//!
//! Evaluation is single-threaded and cooperative: one logical audio thread
//! pulls the root, and all graph computation for a block completes
//! synchronously. Handles are `Rc<RefCell<_>>`; an implementation that moves
//! device I/O to another thread must hand blocks off through a thread-safe
//! queue at the I/O boundary, outside this core.

mod constant;
mod context;
mod error;
mod node;
mod ops;
mod param;
mod rate;
mod resample;

pub use constant::{Constant, DEFAULT_SMOOTHING_SECS, Unit};
pub use context::EvalContext;
pub use error::{GraphError, Result};
pub use node::{
    Block, DEFAULT_SAMPLE_RATE, NamedSources, NodeId, NodeRef, RateSupport, SignalNode, shared,
    silence,
};
pub use ops::{Mix, Product};
pub use param::{LinearRamp, OnePoleSmoother};
pub use rate::{propagate_sample_rate, reconcile_sample_rate, with_sample_rate};
pub use resample::Resample;

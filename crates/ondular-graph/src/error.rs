//! Error types for graph construction and mutation.
//!
//! Two families, per the library's error policy: range errors fail at the
//! call that introduced the bad value, naming the originating node;
//! capability errors fail a rate-change transaction before anything is
//! mutated. End-of-stream is *not* an error — it is the `None` result of
//! [`SignalNode::sample`](crate::SignalNode::sample).

/// Errors raised by graph construction and rate-change operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A sample rate was non-finite, non-positive, or otherwise unusable.
    #[error("invalid sample rate {rate} for node {node}")]
    InvalidSampleRate {
        /// Name of the node the rate was applied to.
        node: String,
        /// The rejected rate value.
        rate: f32,
    },

    /// A rate-change transaction reached a node that cannot change rate.
    /// Nothing was mutated.
    #[error("node {node} does not support sample rate changes")]
    RateNotAdjustable {
        /// Name of the rate-fixed node that blocked the transaction.
        node: String,
    },

    /// Two connected nodes disagree on sample rate and neither side can
    /// adopt the other's.
    #[error("cannot reconcile sample rate of {node} ({rate}) with upstream {upstream} ({upstream_rate})")]
    RateMismatch {
        /// Downstream node name.
        node: String,
        /// Downstream rate.
        rate: f32,
        /// Upstream node name.
        upstream: String,
        /// Upstream rate.
        upstream_rate: f32,
    },

    /// A declared value range was malformed (reversed bounds or non-finite).
    #[error("invalid range {min}..={max} for node {node}")]
    InvalidRange {
        /// Name of the node the range was declared on.
        node: String,
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },

    /// A node that requires an assigned sample rate was used without one.
    #[error("node {node} has no sample rate assigned")]
    MissingSampleRate {
        /// Name of the node.
        node: String,
    },

    /// Wavetable construction was handed inconsistent dimensions.
    #[error("malformed wavetable: {reason}")]
    MalformedWavetable {
        /// What was wrong with the table.
        reason: String,
    },
}

/// Result alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

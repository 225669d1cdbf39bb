//! Transactional sample-rate propagation.
//!
//! Setting a node's rate must reach every rate-aware node in its upstream
//! closure — except rate boundaries, which resample internally and shield
//! whatever sits behind them. The change is all-or-nothing: the closure is
//! collected and verified first, and only if every collected node is
//! adjustable does any rate get written. A half-converted graph is never
//! observable.

use std::collections::HashSet;

use crate::context::EvalContext;
use crate::error::{GraphError, Result};
use crate::node::{NodeId, NodeRef, RateSupport};

/// Sets `node`'s sample rate and recursively the rate of every adjustable
/// source, stopping at rate boundaries.
///
/// # Errors
///
/// - [`GraphError::InvalidSampleRate`] if `rate` is non-finite or not
///   positive.
/// - [`GraphError::RateNotAdjustable`] if the node itself or any reachable
///   non-boundary source is rate-fixed. No node's rate is modified in that
///   case.
pub fn propagate_sample_rate(node: &NodeRef, rate: f32, ctx: &mut EvalContext) -> Result<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(GraphError::InvalidSampleRate {
            node: node.borrow().name().to_owned(),
            rate,
        });
    }

    // Verify the whole closure before touching anything.
    let mut seen = HashSet::new();
    let mut targets: Vec<NodeRef> = Vec::new();
    collect(node, true, &mut seen, &mut targets)?;

    for target in &targets {
        let mut n = target.borrow_mut();
        n.set_rate(rate);
        ctx.rate_changed(n.id());
        tracing::debug!(node = n.name(), rate, "sample rate set");
    }
    Ok(())
}

/// Chaining form of [`propagate_sample_rate`]: applies the rate and returns
/// the node handle.
pub fn with_sample_rate(node: NodeRef, rate: f32, ctx: &mut EvalContext) -> Result<NodeRef> {
    propagate_sample_rate(&node, rate, ctx)?;
    Ok(node)
}

/// Reconciles `node`'s rate with `upstream`'s.
///
/// Equal (or both unset) rates are a no-op. If `node` has no rate yet it
/// adopts the upstream rate. Otherwise `node`'s rate is pushed onto the
/// upstream subgraph; if the upstream cannot adjust, the operation fails
/// with [`GraphError::RateMismatch`] and nothing is modified.
pub fn reconcile_sample_rate(
    node: &NodeRef,
    upstream: &NodeRef,
    ctx: &mut EvalContext,
) -> Result<()> {
    let node_rate = node.borrow().sample_rate();
    let upstream_rate = upstream.borrow().sample_rate();

    match (node_rate, upstream_rate) {
        (None, None) => Ok(()),
        (Some(a), Some(b)) if a == b => Ok(()),
        (None, Some(b)) => propagate_sample_rate(node, b, ctx),
        (Some(a), b) => {
            propagate_sample_rate(upstream, a, ctx).map_err(|_| GraphError::RateMismatch {
                node: node.borrow().name().to_owned(),
                rate: a,
                upstream: upstream.borrow().name().to_owned(),
                upstream_rate: b.unwrap_or(0.0),
            })
        }
    }
}

fn collect(
    node: &NodeRef,
    is_root: bool,
    seen: &mut HashSet<NodeId>,
    targets: &mut Vec<NodeRef>,
) -> Result<()> {
    let n = node.borrow();
    if !seen.insert(n.id()) {
        return Ok(());
    }
    match n.rate_support() {
        RateSupport::Fixed => Err(GraphError::RateNotAdjustable {
            node: n.name().to_owned(),
        }),
        // A boundary as the propagation root has its own output rate set;
        // a boundary reached as a source is left alone entirely.
        RateSupport::Boundary => {
            if is_root {
                targets.push(node.clone());
            }
            Ok(())
        }
        RateSupport::Adjustable => {
            targets.push(node.clone());
            for (_, source) in n.sources() {
                collect(&source, false, seen, targets)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::{Constant, Unit};
    use crate::node::{Block, NamedSources, NodeId, NodeRef, SignalNode, shared, silence};
    use std::rc::Rc;

    /// Minimal pass-through used to build diamond topologies in tests.
    struct Probe {
        id: NodeId,
        name: &'static str,
        sources: NamedSources,
        rate: Option<f32>,
        support: RateSupport,
    }

    impl Probe {
        fn new(name: &'static str, sources: Vec<NodeRef>, support: RateSupport) -> Self {
            Self {
                id: NodeId::next(),
                name,
                sources: sources
                    .into_iter()
                    .enumerate()
                    .map(|(i, s)| (format!("in{i}"), s))
                    .collect(),
                rate: None,
                support,
            }
        }
    }

    impl SignalNode for Probe {
        fn id(&self) -> NodeId {
            self.id
        }
        fn name(&self) -> &str {
            self.name
        }
        fn sample(&mut self, _ctx: &mut EvalContext, count: usize) -> Option<Block> {
            Some(silence(count))
        }
        fn sources(&self) -> NamedSources {
            self.sources.clone()
        }
        fn sample_rate(&self) -> Option<f32> {
            self.rate
        }
        fn rate_support(&self) -> RateSupport {
            self.support
        }
        fn set_rate(&mut self, rate: f32) {
            self.rate = Some(rate);
        }
    }

    fn constant(name: &str) -> NodeRef {
        shared(Constant::new(name, 0.0, -1.0..=1.0, Unit::None).unwrap())
    }

    #[test]
    fn rejects_bad_rates() {
        let mut ctx = EvalContext::new();
        let c = constant("c");
        for bad in [0.0, -48000.0, f32::NAN, f32::INFINITY] {
            let err = propagate_sample_rate(&c, bad, &mut ctx).unwrap_err();
            assert!(matches!(err, GraphError::InvalidSampleRate { .. }), "{bad}");
        }
        assert_eq!(c.borrow().sample_rate(), None);
    }

    #[test]
    fn propagates_through_a_diamond_once() {
        let mut ctx = EvalContext::new();
        let base = constant("base");
        let left: NodeRef = shared(Probe::new(
            "left",
            vec![base.clone()],
            RateSupport::Adjustable,
        ));
        let right: NodeRef = shared(Probe::new(
            "right",
            vec![base.clone()],
            RateSupport::Adjustable,
        ));
        let root: NodeRef = shared(Probe::new(
            "root",
            vec![left.clone(), right.clone()],
            RateSupport::Adjustable,
        ));

        propagate_sample_rate(&root, 44100.0, &mut ctx).unwrap();
        for node in [&root, &left, &right, &base] {
            assert_eq!(node.borrow().sample_rate(), Some(44100.0));
        }
    }

    #[test]
    fn fixed_source_fails_whole_transaction() {
        let mut ctx = EvalContext::new();
        let ok = constant("ok");
        let fixed: NodeRef = shared(Probe::new("device", vec![], RateSupport::Fixed));
        let root: NodeRef = shared(Probe::new(
            "root",
            vec![ok.clone(), fixed],
            RateSupport::Adjustable,
        ));

        let err = propagate_sample_rate(&root, 48000.0, &mut ctx).unwrap_err();
        assert!(matches!(err, GraphError::RateNotAdjustable { .. }));
        assert!(err.to_string().contains("device"));

        assert_eq!(root.borrow().sample_rate(), None, "nothing was mutated");
        assert_eq!(ok.borrow().sample_rate(), None, "nothing was mutated");
    }

    #[test]
    fn boundary_source_stops_propagation() {
        let mut ctx = EvalContext::new();
        let behind = constant("behind");
        let boundary: NodeRef = shared(Probe::new(
            "resampler",
            vec![behind.clone()],
            RateSupport::Boundary,
        ));
        let root: NodeRef = shared(Probe::new(
            "root",
            vec![boundary.clone()],
            RateSupport::Adjustable,
        ));

        propagate_sample_rate(&root, 96000.0, &mut ctx).unwrap();
        assert_eq!(root.borrow().sample_rate(), Some(96000.0));
        assert_eq!(boundary.borrow().sample_rate(), None, "boundary untouched");
        assert_eq!(behind.borrow().sample_rate(), None, "shielded by boundary");
    }

    #[test]
    fn boundary_as_root_gets_its_output_rate_set() {
        let mut ctx = EvalContext::new();
        let behind = constant("behind");
        let boundary: NodeRef = shared(Probe::new(
            "resampler",
            vec![behind.clone()],
            RateSupport::Boundary,
        ));

        propagate_sample_rate(&boundary, 22050.0, &mut ctx).unwrap();
        assert_eq!(boundary.borrow().sample_rate(), Some(22050.0));
        assert_eq!(behind.borrow().sample_rate(), None);
    }

    #[test]
    fn reconcile_adopts_upstream_when_unset() {
        let mut ctx = EvalContext::new();
        let up = constant("up");
        propagate_sample_rate(&up, 48000.0, &mut ctx).unwrap();
        let down: NodeRef = shared(Probe::new("down", vec![], RateSupport::Adjustable));

        reconcile_sample_rate(&down, &up, &mut ctx).unwrap();
        assert_eq!(down.borrow().sample_rate(), Some(48000.0));
    }

    #[test]
    fn reconcile_pushes_own_rate_upstream() {
        let mut ctx = EvalContext::new();
        let up = constant("up");
        propagate_sample_rate(&up, 44100.0, &mut ctx).unwrap();
        let down: NodeRef = shared(Probe::new("down", vec![], RateSupport::Adjustable));
        propagate_sample_rate(&down, 48000.0, &mut ctx).unwrap();

        reconcile_sample_rate(&down, &up, &mut ctx).unwrap();
        assert_eq!(up.borrow().sample_rate(), Some(48000.0));
    }

    #[test]
    fn reconcile_fails_when_neither_side_can_move() {
        let mut ctx = EvalContext::new();
        let up: NodeRef = shared(Probe::new("device", vec![], RateSupport::Fixed));
        let down = constant("down");
        propagate_sample_rate(&down, 48000.0, &mut ctx).unwrap();

        let err = reconcile_sample_rate(&down, &up, &mut ctx).unwrap_err();
        assert!(matches!(err, GraphError::RateMismatch { .. }));
    }

    #[test]
    fn chaining_alias_returns_the_node() {
        let mut ctx = EvalContext::new();
        let c = constant("c");
        let same = with_sample_rate(c.clone(), 48000.0, &mut ctx).unwrap();
        assert!(Rc::ptr_eq(&c, &same));
        assert_eq!(same.borrow().sample_rate(), Some(48000.0));
    }
}

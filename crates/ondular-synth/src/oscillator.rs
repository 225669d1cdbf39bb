//! Phase accumulator oscillator.

use std::rc::Rc;

use ondular_graph::{
    Block, DEFAULT_SAMPLE_RATE, EvalContext, NamedSources, NodeId, NodeRef, SignalNode,
};

/// Phase accumulator in cycles, wrapped to `[0, 1)`.
///
/// Frequency comes from an upstream node, so a pitch source (for example a
/// note-to-frequency node) can drive it sample by sample. The output is the
/// natural phase input for a [`WavetableNode`](crate::WavetableNode).
///
/// Phase accumulates in f64 so long renders do not drift.
pub struct Phasor {
    id: NodeId,
    name: String,
    freq: NodeRef,
    phase: f64,
    sample_rate: Option<f32>,
}

impl Phasor {
    /// Creates a phasor driven by the given frequency node, starting at
    /// phase 0.
    pub fn new(name: &str, freq: NodeRef) -> Self {
        Self {
            id: NodeId::next(),
            name: name.to_owned(),
            freq,
            phase: 0.0,
            sample_rate: None,
        }
    }

    /// Resets the accumulator to the given phase (cycles, fractional part
    /// kept).
    pub fn reset(&mut self, phase: f64) {
        self.phase = phase - phase.floor();
    }
}

impl SignalNode for Phasor {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sample(&mut self, ctx: &mut EvalContext, count: usize) -> Option<Block> {
        if let Some(hit) = ctx.lookup(self.id) {
            return hit;
        }

        let Some(freq) = self.freq.borrow_mut().sample(ctx, count) else {
            ctx.store(self.id, None);
            return None;
        };

        let rate = f64::from(self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE));
        let mut buf = Vec::with_capacity(count);
        for &f in freq.iter() {
            buf.push(self.phase as f32);
            self.phase += f64::from(f) / rate;
            self.phase -= self.phase.floor();
        }

        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sources(&self) -> NamedSources {
        vec![("frequency".to_owned(), self.freq.clone())]
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ondular_graph::{Constant, Unit, propagate_sample_rate, shared};

    #[test]
    fn phase_advances_by_freq_over_rate_and_wraps() {
        let freq: NodeRef = shared(
            Constant::new("freq", 12000.0, 0.0..=20000.0, Unit::Hertz).unwrap(),
        );
        let osc = shared(Phasor::new("osc", freq));
        let node: NodeRef = osc.clone();
        let mut ctx = EvalContext::new();
        propagate_sample_rate(&node, 48000.0, &mut ctx).unwrap();

        // 12 kHz at 48 kHz steps a quarter cycle per sample.
        let block = ctx.next_block(&node, 8).unwrap();
        let expected = [0.0, 0.25, 0.5, 0.75, 0.0, 0.25, 0.5, 0.75];
        for (got, want) in block.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
    }

    #[test]
    fn phase_continues_across_blocks() {
        let freq: NodeRef = shared(
            Constant::new("freq", 12000.0, 0.0..=20000.0, Unit::Hertz).unwrap(),
        );
        let osc = shared(Phasor::new("osc", freq));
        let node: NodeRef = osc.clone();
        let mut ctx = EvalContext::new();
        propagate_sample_rate(&node, 48000.0, &mut ctx).unwrap();

        ctx.next_block(&node, 3).unwrap();
        let next = ctx.next_block(&node, 2).unwrap();
        assert!((next[0] - 0.75).abs() < 1e-6);
        assert!((next[1] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn ends_when_frequency_source_ends() {
        struct Done(NodeId);
        impl SignalNode for Done {
            fn id(&self) -> NodeId {
                self.0
            }
            fn name(&self) -> &str {
                "done"
            }
            fn sample(&mut self, _ctx: &mut EvalContext, _count: usize) -> Option<Block> {
                None
            }
            fn sample_rate(&self) -> Option<f32> {
                None
            }
            fn set_rate(&mut self, _rate: f32) {}
        }

        let freq: NodeRef = shared(Done(NodeId::next()));
        let osc = shared(Phasor::new("osc", freq));
        let node: NodeRef = osc.clone();
        let mut ctx = EvalContext::new();
        assert!(ctx.next_block(&node, 16).is_none());
    }
}

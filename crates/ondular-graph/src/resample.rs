//! Linear-interpolation resampler — the graph's rate boundary.
//!
//! `Resample` pulls its source at the source's own rate into a FIFO and
//! reads it back at the output rate with linear interpolation. It is a
//! [`RateSupport::Boundary`]: rate propagation sets its output rate when
//! targeted directly but never reaches through it to the upstream subgraph.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::context::EvalContext;
use crate::error::{GraphError, Result};
use crate::node::{Block, NamedSources, NodeId, NodeRef, RateSupport, SignalNode};

/// Rate-converting pass-through node.
pub struct Resample {
    id: NodeId,
    name: String,
    source: NodeRef,
    source_rate: f32,
    rate: f32,
    fifo: VecDeque<f32>,
    pos: f64,
    source_done: bool,
    exhausted: bool,
}

impl Resample {
    /// Creates a resampler reading `source` at its declared rate and
    /// emitting at `rate`.
    ///
    /// # Errors
    ///
    /// The source must already have a sample rate assigned, and `rate` must
    /// be finite and positive.
    pub fn new(name: &str, source: NodeRef, rate: f32) -> Result<Self> {
        let source_rate = source.borrow().sample_rate().ok_or_else(|| {
            GraphError::MissingSampleRate {
                node: source.borrow().name().to_owned(),
            }
        })?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(GraphError::InvalidSampleRate {
                node: name.to_owned(),
                rate,
            });
        }
        Ok(Self {
            id: NodeId::next(),
            name: name.to_owned(),
            source,
            source_rate,
            rate,
            fifo: VecDeque::new(),
            pos: 0.0,
            source_done: false,
            exhausted: false,
        })
    }

    /// The rate the source is pulled at.
    pub fn source_rate(&self) -> f32 {
        self.source_rate
    }

    fn advance(&mut self, ctx: &mut EvalContext, count: usize) -> Option<Block> {
        if self.exhausted || (self.source_done && self.fifo.is_empty()) {
            return None;
        }

        let step = f64::from(self.source_rate) / f64::from(self.rate);
        let needed = (self.pos + step * count as f64).ceil() as usize + 1;
        // One pull per block: the source may sit behind the per-block cache,
        // so a second same-block pull would hand back the identical buffer
        // instead of fresh samples. Ask for the whole deficit at once.
        if !self.source_done && self.fifo.len() < needed {
            let deficit = needed - self.fifo.len();
            match self.source.borrow_mut().sample(ctx, deficit) {
                Some(block) => self.fifo.extend(block.iter().copied()),
                None => self.source_done = true,
            }
        }

        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let idx = self.pos.floor() as usize;
            let frac = (self.pos - self.pos.floor()) as f32;
            let sample = if idx + 1 < self.fifo.len() {
                self.fifo[idx] * (1.0 - frac) + self.fifo[idx + 1] * frac
            } else if idx < self.fifo.len() {
                // Last buffered sample; held flat at the stream tail.
                self.fifo[idx]
            } else {
                0.0
            };
            out.push(sample);
            self.pos += step;
        }

        let consumed = (self.pos.floor() as usize).min(self.fifo.len());
        self.fifo.drain(..consumed);
        self.pos -= consumed as f64;

        if self.source_done && self.fifo.len() <= 1 {
            self.exhausted = true;
        }
        Some(Rc::from(out))
    }
}

impl SignalNode for Resample {
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
        let result = self.advance(ctx, count);
        ctx.store(self.id, result.clone());
        result
    }

    fn sources(&self) -> NamedSources {
        vec![("source".to_owned(), self.source.clone())]
    }

    fn sample_rate(&self) -> Option<f32> {
        Some(self.rate)
    }

    fn rate_support(&self) -> RateSupport {
        RateSupport::Boundary
    }

    fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
    }
}

//! Arithmetic combinators for composing graphs.
//!
//! [`Mix`] sums its inputs and [`Product`] multiplies them (ring modulation,
//! envelope application). Both are pure combiners over their sources; they
//! still go through the per-block cache so a shared combinator hands every
//! consumer the identical buffer.
//!
//! End-of-stream policy: `Mix` substitutes silence for finished inputs and
//! only ends once every input has ended. `Product` ends as soon as any input
//! ends — a vanished factor has no meaningful substitute.

use std::rc::Rc;

use crate::context::EvalContext;
use crate::node::{Block, NamedSources, NodeId, NodeRef, SignalNode};

/// Sums any number of input nodes.
pub struct Mix {
    id: NodeId,
    name: String,
    inputs: Vec<NodeRef>,
    sample_rate: Option<f32>,
}

impl Mix {
    /// Creates a named mixer over the given inputs.
    pub fn new(name: &str, inputs: Vec<NodeRef>) -> Self {
        Self {
            id: NodeId::next(),
            name: name.to_owned(),
            inputs,
            sample_rate: None,
        }
    }

    /// Appends another input.
    pub fn push(&mut self, input: NodeRef) {
        self.inputs.push(input);
    }
}

impl SignalNode for Mix {
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

        let mut acc = vec![0.0f32; count];
        let mut any_live = self.inputs.is_empty();
        for input in &self.inputs {
            if let Some(block) = input.borrow_mut().sample(ctx, count) {
                any_live = true;
                for (a, s) in acc.iter_mut().zip(block.iter()) {
                    *a += s;
                }
            }
        }

        let result: Option<Block> = any_live.then(|| Rc::from(acc));
        ctx.store(self.id, result.clone());
        result
    }

    fn sources(&self) -> NamedSources {
        self.inputs
            .iter()
            .enumerate()
            .map(|(i, input)| (format!("in{i}"), input.clone()))
            .collect()
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
    }
}

/// Multiplies any number of input nodes elementwise.
pub struct Product {
    id: NodeId,
    name: String,
    inputs: Vec<NodeRef>,
    sample_rate: Option<f32>,
}

impl Product {
    /// Creates a named product over the given inputs.
    pub fn new(name: &str, inputs: Vec<NodeRef>) -> Self {
        Self {
            id: NodeId::next(),
            name: name.to_owned(),
            inputs,
            sample_rate: None,
        }
    }
}

impl SignalNode for Product {
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

        let mut acc = vec![1.0f32; count];
        let mut ended = false;
        for input in &self.inputs {
            match input.borrow_mut().sample(ctx, count) {
                Some(block) => {
                    for (a, s) in acc.iter_mut().zip(block.iter()) {
                        *a *= s;
                    }
                }
                None => {
                    ended = true;
                    break;
                }
            }
        }

        let result: Option<Block> = (!ended).then(|| Rc::from(acc));
        ctx.store(self.id, result.clone());
        result
    }

    fn sources(&self) -> NamedSources {
        self.inputs
            .iter()
            .enumerate()
            .map(|(i, input)| (format!("in{i}"), input.clone()))
            .collect()
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
    }
}

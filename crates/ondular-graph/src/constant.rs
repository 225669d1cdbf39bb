//! Smoothed scalar parameter source.
//!
//! [`Constant`] is the base of every externally-modulated parameter in the
//! graph: it wraps a target value, a declared range, and display-only unit
//! metadata, and ramps toward the target over a short window so that updates
//! arriving between blocks never produce a step discontinuity.

use std::ops::RangeInclusive;
use std::rc::Rc;

use crate::context::EvalContext;
use crate::error::{GraphError, Result};
use crate::node::{Block, DEFAULT_SAMPLE_RATE, NodeId, SignalNode};
use crate::param::LinearRamp;

/// Display-only unit descriptor for a parameter value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Unit {
    /// Dimensionless value.
    #[default]
    None,
    /// Frequency in Hertz.
    Hertz,
    /// Time in seconds.
    Seconds,
    /// Pitch offset in semitones.
    Semitones,
    /// Level in decibels.
    Decibels,
    /// MIDI note or controller number.
    MidiNumber,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Hertz => write!(f, "Hz"),
            Self::Seconds => write!(f, "s"),
            Self::Semitones => write!(f, "st"),
            Self::Decibels => write!(f, "dB"),
            Self::MidiNumber => write!(f, "midi"),
        }
    }
}

/// Default smoothing window for parameter updates, in seconds.
pub const DEFAULT_SMOOTHING_SECS: f32 = 0.005;

/// Smoothed scalar parameter node.
///
/// `sample` emits a linear ramp from the last emitted value toward the
/// current target; the output is always within the declared range. Updating
/// the target clamps it into the range.
#[derive(Debug, Clone)]
pub struct Constant {
    id: NodeId,
    name: String,
    min: f32,
    max: f32,
    unit: Unit,
    ramp: LinearRamp,
    sample_rate: Option<f32>,
}

impl Constant {
    /// Creates a named constant with an initial value, a declared range, and
    /// a unit descriptor.
    ///
    /// The initial value is clamped into the range. A reversed or non-finite
    /// range is a range error naming the node.
    pub fn new(name: &str, value: f32, range: RangeInclusive<f32>, unit: Unit) -> Result<Self> {
        let (min, max) = (*range.start(), *range.end());
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(GraphError::InvalidRange {
                node: name.to_owned(),
                min,
                max,
            });
        }
        let value = value.clamp(min, max);
        Ok(Self {
            id: NodeId::next(),
            name: name.to_owned(),
            min,
            max,
            unit,
            ramp: LinearRamp::new(value, DEFAULT_SAMPLE_RATE, DEFAULT_SMOOTHING_SECS),
            sample_rate: None,
        })
    }

    /// Sets a new target value, clamped into the declared range. The output
    /// ramps toward it over the smoothing window.
    pub fn set(&mut self, value: f32) {
        self.ramp.set_target(value.clamp(self.min, self.max));
    }

    /// Sets the value immediately, bypassing smoothing. Still clamped.
    pub fn snap(&mut self, value: f32) {
        self.ramp.set_immediate(value.clamp(self.min, self.max));
    }

    /// The current target value.
    pub fn value(&self) -> f32 {
        self.ramp.target()
    }

    /// The declared valid range.
    pub fn range(&self) -> RangeInclusive<f32> {
        self.min..=self.max
    }

    /// The display unit.
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Adjusts the smoothing window, in seconds. Zero disables smoothing.
    pub fn set_smoothing_secs(&mut self, secs: f32) {
        self.ramp.set_window_secs(secs);
    }

    /// Fills `out` with smoothed samples, advancing the ramp.
    ///
    /// This is the shared implementation the event-driven value nodes build
    /// on by composition; they update the target from decoded events and
    /// then call `fill`.
    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.ramp.advance().clamp(self.min, self.max);
        }
    }
}

impl SignalNode for Constant {
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
        let mut buf = vec![0.0f32; count];
        self.fill(&mut buf);
        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
        self.ramp.set_sample_rate(rate);
    }
}

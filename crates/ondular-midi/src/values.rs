//! Event-driven value nodes.
//!
//! Each node subscribes, at construction, to one category of event and
//! forwards decoded payloads into a smoothed [`Constant`] (or, for the gate
//! and click, its own per-sample state). All of them:
//!
//! - call the hub's `update` exactly once at the top of their own `sample`,
//!   so queued events are drained before this block's state is read;
//! - go through the per-block cache, so a node shared between two paths
//!   advances once and hands both consumers the identical buffer;
//! - advertise the hub's stand-in node as their single named source.
//!
//! Hub callbacks write into small shared cells owned by the node rather
//! than into the node itself — the node is already borrowed while `update`
//! runs.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::rc::Rc;

use libm::{exp2f, powf};

use ondular_graph::{
    Block, Constant, DEFAULT_SAMPLE_RATE, EvalContext, NamedSources, NodeId, NodeRef, Result,
    SignalNode, Unit,
};

use crate::hub::HubRef;

/// Converts a (possibly fractional) MIDI note number to a frequency in Hz.
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * exp2f((note - 69.0) / 12.0)
}

fn scale_velocity(velocity: u8, min: f32, max: f32) -> f32 {
    min + (f32::from(velocity) / 127.0) * (max - min)
}

// ---------------------------------------------------------------------------
// Control change
// ---------------------------------------------------------------------------

/// Smoothed value of one MIDI controller, scaled into a declared range.
pub struct CcValue {
    id: NodeId,
    hub: HubRef,
    hub_node: NodeRef,
    state: Rc<Cell<f32>>,
    value: Constant,
    sample_rate: Option<f32>,
}

impl CcValue {
    /// Subscribes to controller `number` on the hub.
    pub fn new(
        hub: &HubRef,
        hub_node: NodeRef,
        name: &str,
        number: u8,
        range: RangeInclusive<f32>,
        default: f32,
    ) -> Result<Self> {
        let mut value = Constant::new(name, default, range.clone(), Unit::None)?;
        value.snap(default);
        let state = Rc::new(Cell::new(default));
        let sink = state.clone();
        hub.borrow_mut()
            .on_control_change(number, range, default, move |v| sink.set(v));
        Ok(Self {
            id: NodeId::next(),
            hub: hub.clone(),
            hub_node,
            state,
            value,
            sample_rate: None,
        })
    }

    /// The current (unsmoothed) controller value.
    pub fn value(&self) -> f32 {
        self.state.get()
    }
}

impl SignalNode for CcValue {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        self.value.name()
    }

    fn sample(&mut self, ctx: &mut EvalContext, count: usize) -> Option<Block> {
        if let Some(hit) = ctx.lookup(self.id) {
            return hit;
        }
        self.hub.borrow_mut().update();
        self.value.set(self.state.get());

        let mut buf = vec![0.0f32; count];
        self.value.fill(&mut buf);
        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sources(&self) -> NamedSources {
        vec![("midi".to_owned(), self.hub_node.clone())]
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
        self.value.set_rate(rate);
    }
}

// ---------------------------------------------------------------------------
// Velocity
// ---------------------------------------------------------------------------

/// What a velocity node does when the tracked note is released.
///
/// The original behavior on note-off was left open; holding the last attack
/// velocity is the default, with release-velocity tracking available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Keep the last attack velocity (default).
    #[default]
    Hold,
    /// Adopt the release velocity of the note-off.
    ReleaseVelocity,
}

/// Attack velocity of the most recently pressed note, scaled into a range.
pub struct VelocityValue {
    id: NodeId,
    hub: HubRef,
    hub_node: NodeRef,
    state: Rc<Cell<f32>>,
    value: Constant,
    sample_rate: Option<f32>,
}

impl VelocityValue {
    /// Subscribes to note events, optionally filtered to one note number.
    pub fn new(
        hub: &HubRef,
        hub_node: NodeRef,
        name: &str,
        range: RangeInclusive<f32>,
        note_filter: Option<u8>,
        policy: ReleasePolicy,
    ) -> Result<Self> {
        let (min, max) = (*range.start(), *range.end());
        let default = min;
        let mut value = Constant::new(name, default, range, Unit::None)?;
        value.snap(default);
        let state = Rc::new(Cell::new(default));
        let sink = state.clone();
        hub.borrow_mut().on_note(move |note, velocity, is_on| {
            if note_filter.is_some_and(|only| only != note) {
                return;
            }
            if is_on || policy == ReleasePolicy::ReleaseVelocity {
                sink.set(scale_velocity(velocity, min, max));
            }
        });
        Ok(Self {
            id: NodeId::next(),
            hub: hub.clone(),
            hub_node,
            state,
            value,
            sample_rate: None,
        })
    }
}

impl SignalNode for VelocityValue {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        self.value.name()
    }

    fn sample(&mut self, ctx: &mut EvalContext, count: usize) -> Option<Block> {
        if let Some(hit) = ctx.lookup(self.id) {
            return hit;
        }
        self.hub.borrow_mut().update();
        self.value.set(self.state.get());

        let mut buf = vec![0.0f32; count];
        self.value.fill(&mut buf);
        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sources(&self) -> NamedSources {
        vec![("midi".to_owned(), self.hub_node.clone())]
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
        self.value.set_rate(rate);
    }
}

// ---------------------------------------------------------------------------
// Pitch bend
// ---------------------------------------------------------------------------

/// Pitch-bend position scaled into a range; rests at the midpoint.
pub struct PitchBendValue {
    id: NodeId,
    hub: HubRef,
    hub_node: NodeRef,
    state: Rc<Cell<f32>>,
    value: Constant,
    sample_rate: Option<f32>,
}

impl PitchBendValue {
    /// Subscribes to pitch-bend events on the hub.
    pub fn new(
        hub: &HubRef,
        hub_node: NodeRef,
        name: &str,
        range: RangeInclusive<f32>,
    ) -> Result<Self> {
        let midpoint = (range.start() + range.end()) / 2.0;
        let mut value = Constant::new(name, midpoint, range.clone(), Unit::None)?;
        value.snap(midpoint);
        let state = Rc::new(Cell::new(midpoint));
        let sink = state.clone();
        hub.borrow_mut()
            .on_pitch_bend(range, None, move |v| sink.set(v));
        Ok(Self {
            id: NodeId::next(),
            hub: hub.clone(),
            hub_node,
            state,
            value,
            sample_rate: None,
        })
    }
}

impl SignalNode for PitchBendValue {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        self.value.name()
    }

    fn sample(&mut self, ctx: &mut EvalContext, count: usize) -> Option<Block> {
        if let Some(hit) = ctx.lookup(self.id) {
            return hit;
        }
        self.hub.borrow_mut().update();
        self.value.set(self.state.get());

        let mut buf = vec![0.0f32; count];
        self.value.fill(&mut buf);
        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sources(&self) -> NamedSources {
        vec![("midi".to_owned(), self.hub_node.clone())]
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
        self.value.set_rate(rate);
    }
}

// ---------------------------------------------------------------------------
// Note number / frequency
// ---------------------------------------------------------------------------

/// Output domain of a [`NoteValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteMode {
    /// Linear MIDI note number (bend added in semitones).
    Number,
    /// Frequency in Hz through equal temperament (A4 = 440).
    Frequency,
}

struct NoteState {
    note: Option<f32>,
    bend: f32,
}

/// Held note number combined with live pitch bend, as a number or an
/// equal-tempered frequency. Recomputes on either callback.
pub struct NoteValue {
    id: NodeId,
    hub: HubRef,
    hub_node: NodeRef,
    state: Rc<RefCell<NoteState>>,
    mode: NoteMode,
    value: Constant,
    sample_rate: Option<f32>,
}

impl NoteValue {
    /// Subscribes to note and bend events; `bend_semitones` is the full
    /// wheel deflection in semitones.
    pub fn new(
        hub: &HubRef,
        hub_node: NodeRef,
        name: &str,
        mode: NoteMode,
        bend_semitones: f32,
    ) -> Result<Self> {
        let bend = bend_semitones.abs();
        let (range, default, unit) = match mode {
            NoteMode::Number => ((-bend)..=(127.0 + bend), 69.0, Unit::MidiNumber),
            NoteMode::Frequency => (0.0..=20000.0, 440.0, Unit::Hertz),
        };
        let mut value = Constant::new(name, default, range, unit)?;
        value.snap(default);

        let state = Rc::new(RefCell::new(NoteState {
            note: None,
            bend: 0.0,
        }));
        let note_sink = state.clone();
        hub.borrow_mut().on_note(move |note, _velocity, is_on| {
            if is_on {
                note_sink.borrow_mut().note = Some(f32::from(note));
            }
        });
        let bend_sink = state.clone();
        hub.borrow_mut()
            .on_pitch_bend((-bend)..=bend, Some(0.0), move |v| {
                bend_sink.borrow_mut().bend = v;
            });

        Ok(Self {
            id: NodeId::next(),
            hub: hub.clone(),
            hub_node,
            state,
            mode,
            value,
            sample_rate: None,
        })
    }
}

impl SignalNode for NoteValue {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        self.value.name()
    }

    fn sample(&mut self, ctx: &mut EvalContext, count: usize) -> Option<Block> {
        if let Some(hit) = ctx.lookup(self.id) {
            return hit;
        }
        self.hub.borrow_mut().update();
        {
            let state = self.state.borrow();
            if let Some(note) = state.note {
                let bent = note + state.bend;
                let target = match self.mode {
                    NoteMode::Number => bent,
                    NoteMode::Frequency => midi_to_freq(bent),
                };
                self.value.set(target);
            }
        }

        let mut buf = vec![0.0f32; count];
        self.value.fill(&mut buf);
        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sources(&self) -> NamedSources {
        vec![("midi".to_owned(), self.hub_node.clone())]
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
        self.value.set_rate(rate);
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

struct GateState {
    held: Vec<u8>,
    velocity: f32,
    pedal: f32,
}

/// Note-on velocity while any note (or the sustain pedal) is held, with
/// pedal-controlled exponential decay after release.
///
/// The per-chunk decay factor is `pedal^(count / sample_rate)`, applied one
/// sample at a time: a full pedal (1.0) sustains indefinitely, a lifted
/// pedal (0.0) cuts immediately, anything between is a half-pedal decay.
pub struct GateValue {
    id: NodeId,
    name: String,
    hub: HubRef,
    hub_node: NodeRef,
    state: Rc<RefCell<GateState>>,
    min: f32,
    max: f32,
    level: f32,
    sample_rate: Option<f32>,
}

impl GateValue {
    /// Subscribes to note events and sustain pedal (CC 64).
    pub fn new(
        hub: &HubRef,
        hub_node: NodeRef,
        name: &str,
        range: RangeInclusive<f32>,
    ) -> Result<Self> {
        let (min, max) = (*range.start(), *range.end());
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ondular_graph::GraphError::InvalidRange {
                node: name.to_owned(),
                min,
                max,
            });
        }

        let state = Rc::new(RefCell::new(GateState {
            held: Vec::new(),
            velocity: 0.0,
            pedal: 0.0,
        }));
        let note_sink = state.clone();
        hub.borrow_mut().on_note(move |note, velocity, is_on| {
            let mut st = note_sink.borrow_mut();
            if is_on {
                st.held.retain(|&n| n != note);
                st.held.push(note);
                st.velocity = f32::from(velocity) / 127.0;
            } else {
                st.held.retain(|&n| n != note);
            }
        });
        let pedal_sink = state.clone();
        hub.borrow_mut()
            .on_control_change(64, 0.0..=1.0, 0.0, move |v| {
                pedal_sink.borrow_mut().pedal = v;
            });

        Ok(Self {
            id: NodeId::next(),
            name: name.to_owned(),
            hub: hub.clone(),
            hub_node,
            state,
            min,
            max,
            level: 0.0,
            sample_rate: None,
        })
    }
}

impl SignalNode for GateValue {
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
        self.hub.borrow_mut().update();

        let rate = self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
        let mut buf = Vec::with_capacity(count);
        {
            let state = self.state.borrow();
            if state.held.is_empty() {
                let factor = if state.pedal <= 0.0 {
                    0.0
                } else {
                    powf(state.pedal, 1.0 / rate)
                };
                for _ in 0..count {
                    self.level *= factor;
                    buf.push(self.min + self.level * (self.max - self.min));
                }
            } else {
                self.level = state.velocity;
                let out = self.min + self.level * (self.max - self.min);
                buf.resize(count, out);
            }
        }

        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sources(&self) -> NamedSources {
        vec![("midi".to_owned(), self.hub_node.clone())]
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
    }
}

// ---------------------------------------------------------------------------
// One-shot click
// ---------------------------------------------------------------------------

/// All-zero output except one velocity-scaled impulse at the block boundary
/// nearest each note-on. Used to ping a downstream filter.
///
/// Events drain at the start of the block, so the nearest boundary is the
/// block's first sample; overlapping note-ons queue one impulse per block.
pub struct ClickValue {
    id: NodeId,
    name: String,
    hub: HubRef,
    hub_node: NodeRef,
    pending: Rc<RefCell<VecDeque<f32>>>,
    peak: f32,
    sample_rate: Option<f32>,
}

impl ClickValue {
    /// Subscribes to note-on events; impulses are `velocity/127 * peak`.
    pub fn new(hub: &HubRef, hub_node: NodeRef, name: &str, peak: f32) -> Self {
        let pending = Rc::new(RefCell::new(VecDeque::new()));
        let sink = pending.clone();
        hub.borrow_mut().on_note(move |_note, velocity, is_on| {
            if is_on {
                sink.borrow_mut().push_back(f32::from(velocity) / 127.0);
            }
        });
        Self {
            id: NodeId::next(),
            name: name.to_owned(),
            hub: hub.clone(),
            hub_node,
            pending,
            peak,
            sample_rate: None,
        }
    }
}

impl SignalNode for ClickValue {
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
        self.hub.borrow_mut().update();

        let mut buf = vec![0.0f32; count];
        if let Some(velocity) = self.pending.borrow_mut().pop_front() {
            if count > 0 {
                buf[0] = velocity * self.peak;
            }
        }
        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sources(&self) -> NamedSources {
        vec![("midi".to_owned(), self.hub_node.clone())]
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
    }
}

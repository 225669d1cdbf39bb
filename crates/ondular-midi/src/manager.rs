//! Graph-facing front for one MIDI session.
//!
//! [`MidiManager`] owns the shared [`EventHub`] and the [`HubNode`] stand-in
//! that every event-driven node advertises as its upstream source. Dependents
//! and sample-rate propagation therefore see one uniform source instead of a
//! concrete device connection.

use std::ops::RangeInclusive;
use std::rc::Rc;

use ondular_graph::{
    Block, EvalContext, NodeId, NodeRef, Result, SignalNode, shared, silence,
};

use crate::event::{EventSource, QueueHandle, QueueSource};
use crate::hub::{EventHub, HubRef};
use crate::values::{
    CcValue, ClickValue, GateValue, NoteMode, NoteValue, PitchBendValue, ReleasePolicy,
    VelocityValue,
};

/// Silent stand-in node representing the event manager inside the graph.
///
/// It produces silence; its purpose is to give event-driven nodes a uniform
/// named source for introspection and rate propagation.
pub struct HubNode {
    id: NodeId,
    hub: HubRef,
    sample_rate: Option<f32>,
}

impl HubNode {
    /// Creates the stand-in for the given hub.
    pub fn new(hub: HubRef) -> Self {
        Self {
            id: NodeId::next(),
            hub,
            sample_rate: None,
        }
    }

    /// The hub this node fronts.
    pub fn hub(&self) -> HubRef {
        self.hub.clone()
    }
}

impl SignalNode for HubNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        "midi"
    }

    fn sample(&mut self, _ctx: &mut EvalContext, count: usize) -> Option<Block> {
        Some(silence(count))
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
    }
}

/// One MIDI session: hub, stand-in node, and constructors for the
/// event-driven value nodes.
pub struct MidiManager {
    hub: HubRef,
    hub_node: NodeRef,
}

impl MidiManager {
    /// Creates a manager over a decoded-event source.
    pub fn new(source: Box<dyn EventSource>) -> Self {
        let hub = EventHub::new(source).into_shared();
        let hub_node: NodeRef = shared(HubNode::new(hub.clone()));
        Self { hub, hub_node }
    }

    /// Creates a manager over an in-memory queue, returning the push handle.
    pub fn from_queue() -> (Self, QueueHandle) {
        let (source, handle) = QueueSource::new();
        (Self::new(Box::new(source)), handle)
    }

    /// The shared event hub.
    pub fn hub(&self) -> HubRef {
        self.hub.clone()
    }

    /// The stand-in node event-driven nodes advertise as their source.
    pub fn hub_node(&self) -> NodeRef {
        self.hub_node.clone()
    }

    /// A control-change value node for one controller number.
    pub fn cc(
        &self,
        name: &str,
        number: u8,
        range: RangeInclusive<f32>,
        default: f32,
    ) -> Result<Rc<std::cell::RefCell<CcValue>>> {
        Ok(shared(CcValue::new(
            &self.hub,
            self.hub_node(),
            name,
            number,
            range,
            default,
        )?))
    }

    /// A velocity-tracking value node.
    pub fn velocity(
        &self,
        name: &str,
        range: RangeInclusive<f32>,
        note_filter: Option<u8>,
        policy: ReleasePolicy,
    ) -> Result<Rc<std::cell::RefCell<VelocityValue>>> {
        Ok(shared(VelocityValue::new(
            &self.hub,
            self.hub_node(),
            name,
            range,
            note_filter,
            policy,
        )?))
    }

    /// A pitch-bend value node defaulting to the range midpoint.
    pub fn pitch_bend(
        &self,
        name: &str,
        range: RangeInclusive<f32>,
    ) -> Result<Rc<std::cell::RefCell<PitchBendValue>>> {
        Ok(shared(PitchBendValue::new(
            &self.hub,
            self.hub_node(),
            name,
            range,
        )?))
    }

    /// A note number/frequency value node with the given bend depth in
    /// semitones.
    pub fn note(
        &self,
        name: &str,
        mode: NoteMode,
        bend_semitones: f32,
    ) -> Result<Rc<std::cell::RefCell<NoteValue>>> {
        Ok(shared(NoteValue::new(
            &self.hub,
            self.hub_node(),
            name,
            mode,
            bend_semitones,
        )?))
    }

    /// A gate value node (velocity while held, pedal-controlled decay).
    pub fn gate(&self, name: &str, range: RangeInclusive<f32>) -> Result<Rc<std::cell::RefCell<GateValue>>> {
        GateValue::new(&self.hub, self.hub_node(), name, range).map(shared)
    }

    /// A one-shot click node emitting a velocity-scaled impulse per note-on.
    pub fn click(&self, name: &str, peak: f32) -> Rc<std::cell::RefCell<ClickValue>> {
        shared(ClickValue::new(&self.hub, self.hub_node(), name, peak))
    }
}

//! MIDI event plumbing for the ondular signal graph.
//!
//! The crate sits between an external event source (hardware port, SMF
//! reader, test queue) and the graph: an [`EventHub`] drains decoded
//! [`MidiEvent`]s and fans them out to subscribed callbacks, and a family of
//! event-driven value nodes turns those callbacks into sampleable signals —
//! controller position, note velocity, pitch bend, note number or frequency,
//! a pedal-aware gate, and a one-shot click.
//!
//! [`MidiManager`] is the usual entry point:
//!
//! ```
//! use ondular_graph::{EvalContext, NodeRef, propagate_sample_rate};
//! use ondular_midi::{MidiEvent, MidiManager, NoteMode};
//!
//! let (manager, handle) = MidiManager::from_queue();
//! let freq: NodeRef = manager.note("freq", NoteMode::Frequency, 2.0).unwrap();
//!
//! let mut ctx = EvalContext::new();
//! propagate_sample_rate(&freq, 48000.0, &mut ctx).unwrap();
//!
//! handle.push(MidiEvent::NoteOn { channel: 0, note: 69, velocity: 100 });
//! let block = ctx.next_block(&freq, 64).unwrap();
//! assert!(block[0] > 0.0);
//! ```

mod event;
mod hub;
mod manager;
mod values;

pub use event::{EventSource, MidiEvent, QueueHandle, QueueSource};
pub use hub::{EventHub, HubRef};
pub use manager::{HubNode, MidiManager};
pub use values::{
    CcValue, ClickValue, GateValue, NoteMode, NoteValue, PitchBendValue, ReleasePolicy,
    VelocityValue, midi_to_freq,
};

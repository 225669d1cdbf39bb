//! The event hub: callback registry over an event source.
//!
//! Nodes subscribe at construction; [`EventHub::update`] drains whatever the
//! source has queued and dispatches to the registered callbacks. `update`
//! never blocks and is harmless to call repeatedly within a block — the
//! first caller drains everything, later callers see an empty queue. Every
//! event-driven node calls it exactly once at the top of its own `sample`,
//! so queued events are consumed before any of this block's state is read.
//!
//! Callbacks run while the hub is borrowed; they must write into their own
//! shared state (a `Cell`/`RefCell` owned by the subscribing node), never
//! back into the hub or into graph nodes.

use std::cell::RefCell;
use std::ops::RangeInclusive;
use std::rc::Rc;

use crate::event::{EventSource, MidiEvent};

/// Shared handle to an [`EventHub`].
pub type HubRef = Rc<RefCell<EventHub>>;

type NoteCallback = Box<dyn FnMut(u8, u8, bool)>;

struct CcSubscription {
    number: u8,
    min: f32,
    max: f32,
    callback: Box<dyn FnMut(f32)>,
}

struct BendSubscription {
    min: f32,
    max: f32,
    callback: Box<dyn FnMut(f32)>,
}

/// Per-session registry of event callbacks, keyed by event kind.
pub struct EventHub {
    source: Box<dyn EventSource>,
    note_subs: Vec<NoteCallback>,
    cc_subs: Vec<CcSubscription>,
    bend_subs: Vec<BendSubscription>,
    channel: Option<u8>,
}

impl EventHub {
    /// Creates a hub over a decoded-event source, listening on all channels.
    pub fn new(source: Box<dyn EventSource>) -> Self {
        Self {
            source,
            note_subs: Vec::new(),
            cc_subs: Vec::new(),
            bend_subs: Vec::new(),
            channel: None,
        }
    }

    /// Wraps the hub in a shared handle.
    pub fn into_shared(self) -> HubRef {
        Rc::new(RefCell::new(self))
    }

    /// Restricts dispatch to one channel (`None` = omni).
    pub fn set_channel(&mut self, channel: Option<u8>) {
        self.channel = channel;
    }

    /// Subscribes to note events: `callback(note, velocity, is_on)`.
    pub fn on_note(&mut self, callback: impl FnMut(u8, u8, bool) + 'static) {
        self.note_subs.push(Box::new(callback));
    }

    /// Subscribes to one controller number. The raw 0..=127 value is scaled
    /// into `range` before dispatch; the callback is invoked immediately
    /// with `default` so subscribers start from a defined value.
    pub fn on_control_change(
        &mut self,
        number: u8,
        range: RangeInclusive<f32>,
        default: f32,
        mut callback: impl FnMut(f32) + 'static,
    ) {
        callback(default);
        self.cc_subs.push(CcSubscription {
            number,
            min: *range.start(),
            max: *range.end(),
            callback: Box::new(callback),
        });
    }

    /// Subscribes to pitch bend. The signed 14-bit value is scaled into
    /// `range`; `default` falls back to the range midpoint and is dispatched
    /// immediately.
    pub fn on_pitch_bend(
        &mut self,
        range: RangeInclusive<f32>,
        default: Option<f32>,
        mut callback: impl FnMut(f32) + 'static,
    ) {
        let (min, max) = (*range.start(), *range.end());
        callback(default.unwrap_or((min + max) / 2.0));
        self.bend_subs.push(BendSubscription {
            min,
            max,
            callback: Box::new(callback),
        });
    }

    /// Drains queued events and dispatches them. Never blocks.
    pub fn update(&mut self) {
        while let Some(event) = self.source.poll() {
            self.dispatch(event);
        }
    }

    /// True once the source is finished and everything queued has been
    /// dispatched.
    pub fn finished(&self) -> bool {
        self.source.finished()
    }

    fn dispatch(&mut self, event: MidiEvent) {
        if let Some(only) = self.channel {
            let channel = match event {
                MidiEvent::NoteOn { channel, .. }
                | MidiEvent::NoteOff { channel, .. }
                | MidiEvent::ControlChange { channel, .. }
                | MidiEvent::PitchBend { channel, .. } => channel,
            };
            if channel != only {
                return;
            }
        }

        tracing::trace!(?event, "midi dispatch");
        match event {
            MidiEvent::NoteOn {
                note, velocity: 0, ..
            } => {
                // Running-status convention: velocity 0 means note-off.
                for callback in &mut self.note_subs {
                    callback(note, 0, false);
                }
            }
            MidiEvent::NoteOn { note, velocity, .. } => {
                for callback in &mut self.note_subs {
                    callback(note, velocity, true);
                }
            }
            MidiEvent::NoteOff { note, velocity, .. } => {
                for callback in &mut self.note_subs {
                    callback(note, velocity, false);
                }
            }
            MidiEvent::ControlChange { number, value, .. } => {
                for sub in &mut self.cc_subs {
                    if sub.number == number {
                        let scaled =
                            sub.min + (f32::from(value) / 127.0) * (sub.max - sub.min);
                        (sub.callback)(scaled);
                    }
                }
            }
            MidiEvent::PitchBend { value, .. } => {
                for sub in &mut self.bend_subs {
                    let mid = (sub.min + sub.max) / 2.0;
                    let half = (sub.max - sub.min) / 2.0;
                    let scaled = mid + (f32::from(value) / 8192.0) * half;
                    (sub.callback)(scaled.clamp(sub.min, sub.max));
                }
            }
        }
    }
}

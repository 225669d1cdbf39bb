//! Decoded MIDI events and the event source boundary.
//!
//! Wire-protocol decoding (hardware ports, SMF files) happens outside this
//! crate; whatever sits at that boundary implements [`EventSource`] and hands
//! over already-decoded [`MidiEvent`] values. [`QueueSource`] is the stock
//! implementation: a shared queue the owner pushes into from the same thread.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// One decoded MIDI event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiEvent {
    /// Key pressed. A velocity of 0 is treated as a note-off, per convention.
    NoteOn {
        /// Channel 0..=15.
        channel: u8,
        /// Note number 0..=127.
        note: u8,
        /// Attack velocity 0..=127.
        velocity: u8,
    },
    /// Key released.
    NoteOff {
        /// Channel 0..=15.
        channel: u8,
        /// Note number 0..=127.
        note: u8,
        /// Release velocity 0..=127.
        velocity: u8,
    },
    /// Controller moved.
    ControlChange {
        /// Channel 0..=15.
        channel: u8,
        /// Controller number 0..=127.
        number: u8,
        /// Controller value 0..=127.
        value: u8,
    },
    /// Pitch wheel moved.
    PitchBend {
        /// Channel 0..=15.
        channel: u8,
        /// Signed bend, -8192..=8191 (0 = center).
        value: i16,
    },
}

/// Boundary trait for whatever queues decoded events.
///
/// `poll` drains one event if available and never blocks. `finished` reports
/// that no further events can ever arrive (end of a file, closed queue) —
/// live sources stay unfinished forever.
pub trait EventSource {
    /// Takes the next queued event, if any.
    fn poll(&mut self) -> Option<MidiEvent>;

    /// True once the source can produce no further events.
    fn finished(&self) -> bool {
        false
    }
}

/// Push handle paired with a [`QueueSource`].
#[derive(Clone)]
pub struct QueueHandle {
    queue: Rc<RefCell<VecDeque<MidiEvent>>>,
    closed: Rc<Cell<bool>>,
}

impl QueueHandle {
    /// Queues an event for the next `update` drain.
    pub fn push(&self, event: MidiEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    /// Marks the source finished once the queue drains.
    pub fn close(&self) {
        self.closed.set(true);
    }
}

/// In-memory event source over a shared queue.
pub struct QueueSource {
    queue: Rc<RefCell<VecDeque<MidiEvent>>>,
    closed: Rc<Cell<bool>>,
}

impl QueueSource {
    /// Creates the source and its push handle.
    pub fn new() -> (Self, QueueHandle) {
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        let closed = Rc::new(Cell::new(false));
        let handle = QueueHandle {
            queue: queue.clone(),
            closed: closed.clone(),
        };
        (Self { queue, closed }, handle)
    }
}

impl EventSource for QueueSource {
    fn poll(&mut self) -> Option<MidiEvent> {
        self.queue.borrow_mut().pop_front()
    }

    fn finished(&self) -> bool {
        self.closed.get() && self.queue.borrow().is_empty()
    }
}

//! ADSR envelope node.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ondular_graph::{
    Block, DEFAULT_SAMPLE_RATE, EvalContext, GraphError, NamedSources, NodeId, NodeRef,
    OnePoleSmoother, SignalNode,
};
use ondular_midi::{HubRef, MidiManager};

use crate::Result;

/// Default cutoff of the post-envelope smoothing stage, in Hz.
pub const DEFAULT_ENVELOPE_CUTOFF: f32 = 1000.0;

const SETTLE_THRESHOLD: f32 = 1e-4;

/// Where the envelope currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvStage {
    /// Not sounding.
    Idle,
    /// Ramping toward the trigger peak.
    Attack,
    /// Ramping from peak down to the sustain level.
    Decay,
    /// Holding `sustain * peak`.
    Sustain,
    /// Ramping toward zero.
    Release,
}

enum NoteEdge {
    On { note: u8, velocity: u8 },
    Off { note: u8 },
}

/// Attack-decay-sustain-release envelope with a smoothed, range-scaled
/// output.
///
/// Times are in seconds and the sustain level is a fraction of the trigger
/// peak. The raw piecewise-linear value runs through a one-pole low-pass
/// (see [`DEFAULT_ENVELOPE_CUTOFF`]) before scaling into the output range,
/// so triggers and releases land without clicks. Retriggering while
/// sounding ramps from the current level rather than resetting to zero.
///
/// Standalone envelopes are driven by [`trigger`](Self::trigger) and
/// [`release`](Self::release); [`attach_notes`](Self::attach_notes) wires
/// them to note events instead, releasing only on the note-off matching
/// the note that most recently triggered.
pub struct AdsrNode {
    id: NodeId,
    name: String,
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,
    stage: EnvStage,
    seg_start: f32,
    elapsed: f32,
    since_trigger: f32,
    peak: f32,
    auto_release: Option<f32>,
    current: f32,
    has_released: bool,
    done: bool,
    smoother: OnePoleSmoother,
    min: f32,
    max: f32,
    hub: Option<HubRef>,
    hub_node: Option<NodeRef>,
    pending: Rc<RefCell<VecDeque<NoteEdge>>>,
    active_note: Option<u8>,
    sample_rate: Option<f32>,
}

impl AdsrNode {
    /// Creates an idle envelope. Negative times are clamped to zero and
    /// the sustain level to `[0, 1]`; a reversed or non-finite output
    /// range is rejected.
    pub fn new(
        name: &str,
        attack: f32,
        decay: f32,
        sustain: f32,
        release: f32,
        range: std::ops::RangeInclusive<f32>,
    ) -> Result<Self> {
        let (min, max) = (*range.start(), *range.end());
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(GraphError::InvalidRange {
                node: name.to_owned(),
                min,
                max,
            }
            .into());
        }

        Ok(Self {
            id: NodeId::next(),
            name: name.to_owned(),
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.0),
            stage: EnvStage::Idle,
            seg_start: 0.0,
            elapsed: 0.0,
            since_trigger: 0.0,
            peak: 0.0,
            auto_release: None,
            current: 0.0,
            has_released: false,
            done: false,
            smoother: OnePoleSmoother::new(DEFAULT_SAMPLE_RATE, DEFAULT_ENVELOPE_CUTOFF),
            min,
            max,
            hub: None,
            hub_node: None,
            pending: Rc::new(RefCell::new(VecDeque::new())),
            active_note: None,
            sample_rate: None,
        })
    }

    /// Starts (or restarts) the envelope toward `peak`, clamped to
    /// `[0, 1]`. When sounding, the attack ramps from the current level.
    /// With `auto_release` the envelope releases itself that many seconds
    /// after the trigger.
    pub fn trigger(&mut self, peak: f32, auto_release: Option<f32>) {
        self.seg_start = self.current;
        self.elapsed = 0.0;
        self.since_trigger = 0.0;
        self.peak = peak.clamp(0.0, 1.0);
        self.auto_release = auto_release;
        self.stage = EnvStage::Attack;
        self.done = false;
    }

    /// Begins the release ramp from the current level. No-op when idle.
    pub fn release(&mut self) {
        if self.stage == EnvStage::Idle {
            return;
        }
        self.seg_start = self.current;
        self.elapsed = 0.0;
        self.stage = EnvStage::Release;
        self.has_released = true;
    }

    /// Current lifecycle stage.
    pub fn stage(&self) -> EnvStage {
        self.stage
    }

    /// Sets the cutoff of the smoothing stage, in Hz.
    pub fn set_smoothing_cutoff(&mut self, cutoff_hz: f32) {
        self.smoother.set_cutoff(cutoff_hz);
    }

    /// Drives the envelope from note events: note-on triggers with
    /// `velocity / 127` as peak, and only the note-off matching the most
    /// recent triggering note releases. The manager's stand-in node becomes
    /// this envelope's named source.
    pub fn attach_notes(&mut self, manager: &MidiManager) {
        let hub = manager.hub();
        let sink = self.pending.clone();
        hub.borrow_mut().on_note(move |note, velocity, is_on| {
            let edge = if is_on {
                NoteEdge::On { note, velocity }
            } else {
                NoteEdge::Off { note }
            };
            sink.borrow_mut().push_back(edge);
        });
        self.hub = Some(hub);
        self.hub_node = Some(manager.hub_node());
    }

    fn drain_note_edges(&mut self) {
        loop {
            let edge = self.pending.borrow_mut().pop_front();
            match edge {
                Some(NoteEdge::On { note, velocity }) => {
                    self.active_note = Some(note);
                    self.trigger(f32::from(velocity) / 127.0, None);
                }
                Some(NoteEdge::Off { note }) => {
                    if self.active_note == Some(note) {
                        self.active_note = None;
                        self.release();
                    }
                }
                None => break,
            }
        }
    }

    /// Raw piecewise-linear value for one sample, advancing time by `dt`.
    fn step_raw(&mut self, dt: f32) -> f32 {
        if let Some(after) = self.auto_release {
            let sounding = matches!(
                self.stage,
                EnvStage::Attack | EnvStage::Decay | EnvStage::Sustain
            );
            if sounding && self.since_trigger >= after {
                self.release();
            }
        }

        let value = match self.stage {
            EnvStage::Idle => 0.0,
            EnvStage::Attack => {
                if self.elapsed >= self.attack {
                    self.stage = EnvStage::Decay;
                    self.seg_start = self.peak;
                    self.elapsed = (self.elapsed - self.attack).max(0.0);
                    return self.step_raw(dt);
                }
                self.seg_start + (self.peak - self.seg_start) * (self.elapsed / self.attack)
            }
            EnvStage::Decay => {
                let target = self.sustain * self.peak;
                if self.elapsed >= self.decay {
                    self.stage = EnvStage::Sustain;
                    self.elapsed = 0.0;
                    target
                } else {
                    self.seg_start + (target - self.seg_start) * (self.elapsed / self.decay)
                }
            }
            EnvStage::Sustain => self.sustain * self.peak,
            EnvStage::Release => {
                if self.elapsed >= self.release {
                    self.stage = EnvStage::Idle;
                    0.0
                } else {
                    self.seg_start * (1.0 - self.elapsed / self.release)
                }
            }
        };

        self.current = value;
        self.elapsed += dt;
        self.since_trigger += dt;
        value
    }
}

impl SignalNode for AdsrNode {
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
        if self.done {
            ctx.store(self.id, None);
            return None;
        }

        if let Some(hub) = self.hub.clone() {
            hub.borrow_mut().update();
            self.drain_note_edges();
        }

        let rate = self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
        let dt = 1.0 / rate;
        let span = self.max - self.min;
        let mut buf = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = self.step_raw(dt);
            let smoothed = self.smoother.process(raw);
            buf.push(self.min + smoothed * span);
        }

        let settled = self.has_released
            && self.stage == EnvStage::Idle
            && self.smoother.state().abs() < SETTLE_THRESHOLD;
        let source_open = self
            .hub
            .as_ref()
            .is_some_and(|hub| !hub.borrow().finished());
        if settled && !source_open {
            tracing::debug!(name = %self.name, "envelope finished");
            self.done = true;
        }

        let block: Block = Rc::from(buf);
        ctx.store(self.id, Some(block.clone()));
        Some(block)
    }

    fn sources(&self) -> NamedSources {
        match &self.hub_node {
            Some(node) => vec![("midi".to_owned(), node.clone())],
            None => Vec::new(),
        }
    }

    fn sample_rate(&self) -> Option<f32> {
        self.sample_rate
    }

    fn set_rate(&mut self, rate: f32) {
        self.sample_rate = Some(rate);
        self.smoother.set_sample_rate(rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ondular_graph::{propagate_sample_rate, shared};

    const RATE: f32 = 48000.0;

    /// Envelope with the smoothing stage effectively bypassed, so raw
    /// segment shapes can be asserted directly.
    fn raw_env(attack: f32, decay: f32, sustain: f32, release: f32) -> AdsrNode {
        let mut env = AdsrNode::new("env", attack, decay, sustain, release, 0.0..=1.0).unwrap();
        env.set_smoothing_cutoff(1.0e6);
        env
    }

    fn run(env: &Rc<RefCell<AdsrNode>>, ctx: &mut EvalContext, count: usize) -> Block {
        let node: NodeRef = env.clone();
        ctx.next_block(&node, count).expect("still sounding")
    }

    #[test]
    fn rejects_reversed_output_range() {
        let err = AdsrNode::new("env", 0.01, 0.01, 0.5, 0.01, 1.0..=0.0).err().unwrap();
        assert!(matches!(
            err,
            crate::SynthError::Graph(GraphError::InvalidRange { .. })
        ));
    }

    #[test]
    fn attack_ramps_to_peak_then_decays_to_sustain() {
        let env = shared(raw_env(0.01, 0.01, 0.5, 0.01));
        let mut ctx = EvalContext::new();
        let node: NodeRef = env.clone();
        propagate_sample_rate(&node, RATE, &mut ctx).unwrap();

        env.borrow_mut().trigger(1.0, None);
        let attack = run(&env, &mut ctx, 480);
        assert!(attack[0] < 0.01, "starts near zero");
        assert!(attack[479] > 0.95, "near peak at end of attack");
        assert!(attack.windows(2).all(|w| w[1] >= w[0]), "monotone attack");

        let decay = run(&env, &mut ctx, 480);
        assert!(decay.windows(2).all(|w| w[1] <= w[0]), "monotone decay");

        let sustain = run(&env, &mut ctx, 480);
        assert!((sustain[479] - 0.5).abs() < 0.01, "holds sustain level");
        assert_eq!(env.borrow().stage(), EnvStage::Sustain);
    }

    #[test]
    fn release_from_mid_decay_is_continuous() {
        let env = shared(raw_env(0.005, 0.1, 0.2, 0.05));
        let mut ctx = EvalContext::new();
        let node: NodeRef = env.clone();
        propagate_sample_rate(&node, RATE, &mut ctx).unwrap();

        env.borrow_mut().trigger(1.0, None);
        // Through the attack and partway into the decay.
        let mid = run(&env, &mut ctx, 1440);
        assert_eq!(env.borrow().stage(), EnvStage::Decay);
        let before = mid[1439];

        env.borrow_mut().release();
        let after = run(&env, &mut ctx, 16);
        assert!(
            (after[0] - before).abs() < 0.01,
            "no jump at release: {before} -> {}",
            after[0]
        );
        assert!(after.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn retrigger_while_sounding_ramps_from_current_level() {
        let env = shared(raw_env(0.01, 0.1, 0.5, 0.05));
        let mut ctx = EvalContext::new();
        let node: NodeRef = env.clone();
        propagate_sample_rate(&node, RATE, &mut ctx).unwrap();

        env.borrow_mut().trigger(1.0, None);
        let first = run(&env, &mut ctx, 960);
        let level = first[959];
        assert!(level > 0.5);

        env.borrow_mut().trigger(1.0, None);
        let second = run(&env, &mut ctx, 16);
        assert!(
            (second[0] - level).abs() < 0.01,
            "attack restarts from {level}, got {}",
            second[0]
        );
    }

    #[test]
    fn returns_none_after_release_settles() {
        let env = shared(raw_env(0.001, 0.001, 0.5, 0.005));
        let mut ctx = EvalContext::new();
        let node: NodeRef = env.clone();
        propagate_sample_rate(&node, RATE, &mut ctx).unwrap();

        env.borrow_mut().trigger(1.0, None);
        run(&env, &mut ctx, 480);
        env.borrow_mut().release();

        let mut ended = false;
        for _ in 0..20 {
            if ctx.next_block(&node, 480).is_none() {
                ended = true;
                break;
            }
        }
        assert!(ended, "envelope never signalled end of stream");
        assert!(ctx.next_block(&node, 480).is_none(), "stays ended");
    }

    #[test]
    fn idle_envelope_outputs_range_floor_without_ending() {
        let env = shared(raw_env(0.01, 0.01, 0.5, 0.01));
        let mut ctx = EvalContext::new();
        let node: NodeRef = env.clone();

        let block = ctx.next_block(&node, 64).expect("idle is not end of stream");
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn auto_release_lets_go_without_an_explicit_call() {
        let env = shared(raw_env(0.001, 0.001, 0.5, 0.01));
        let mut ctx = EvalContext::new();
        let node: NodeRef = env.clone();
        propagate_sample_rate(&node, RATE, &mut ctx).unwrap();

        env.borrow_mut().trigger(1.0, Some(0.01));
        run(&env, &mut ctx, 960);
        assert!(matches!(
            env.borrow().stage(),
            EnvStage::Release | EnvStage::Idle
        ));
    }

    #[test]
    fn output_scales_into_declared_range() {
        let env = shared({
            let mut env =
                AdsrNode::new("env", 0.001, 0.001, 0.5, 0.01, 2.0..=4.0).unwrap();
            env.set_smoothing_cutoff(1.0e6);
            env
        });
        let mut ctx = EvalContext::new();
        let node: NodeRef = env.clone();
        propagate_sample_rate(&node, RATE, &mut ctx).unwrap();

        env.borrow_mut().trigger(1.0, None);
        let block = run(&env, &mut ctx, 960);
        // Sustaining at 0.5 of peak inside 2..=4 lands at 3.
        assert!((block[959] - 3.0).abs() < 0.02);
    }
}

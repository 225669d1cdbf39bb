//! Parameter smoothing primitives shared across the graph.
//!
//! External updates to a parameter (a MIDI CC, a pitch bend, a direct `set`)
//! land between blocks; emitting the new value immediately would produce a
//! single-sample step. The value nodes instead smooth toward their target:
//!
//! - [`LinearRamp`] — constant-rate approach over a configured window, used
//!   by the Constant node and everything composed from it.
//! - [`OnePoleSmoother`] — one-pole lowpass by cutoff frequency, used as the
//!   envelope's post-processing stage to round off block-rate stair-steps.

use libm::expf;

use crate::node::DEFAULT_SAMPLE_RATE;

/// Linear, constant-rate smoothing toward a target value.
///
/// The ramp covers the configured window regardless of distance: a larger
/// jump moves faster, so any update settles in the same wall-clock time.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    increment: f32,
    samples_remaining: u32,
    sample_rate: f32,
    window_secs: f32,
}

impl LinearRamp {
    /// Creates a ramp resting at `initial`, smoothing over `window_secs`.
    pub fn new(initial: f32, sample_rate: f32, window_secs: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            increment: 0.0,
            samples_remaining: 0,
            sample_rate,
            window_secs,
        }
    }

    /// Starts ramping toward `target` over the smoothing window.
    ///
    /// Re-announcing the current target is a no-op: an in-flight transition
    /// keeps its remaining window instead of restarting, so callers may
    /// safely repeat the target once per block.
    pub fn set_target(&mut self, target: f32) {
        if (target - self.target).abs() < 1e-9 {
            return;
        }
        self.target = target;

        let samples = (self.window_secs * self.sample_rate) as u32;
        if samples == 0 {
            self.current = target;
            self.increment = 0.0;
            self.samples_remaining = 0;
        } else {
            self.increment = (target - self.current) / samples as f32;
            self.samples_remaining = samples;
        }
    }

    /// Jumps straight to `value` with no smoothing.
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.increment = 0.0;
        self.samples_remaining = 0;
    }

    /// Updates the sample rate. The current transition, if any, is restarted
    /// at the new rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        if self.samples_remaining > 0 {
            let target = self.target;
            self.samples_remaining = 0;
            self.set_target(target);
        }
    }

    /// Updates the smoothing window, in seconds.
    pub fn set_window_secs(&mut self, window_secs: f32) {
        self.window_secs = window_secs.max(0.0);
    }

    /// Advances one sample and returns the smoothed value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.samples_remaining > 0 {
            self.current += self.increment;
            self.samples_remaining -= 1;
            if self.samples_remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// The value being ramped toward.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the ramp has reached its target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.samples_remaining == 0
    }
}

impl Default for LinearRamp {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_SAMPLE_RATE, 0.005)
    }
}

/// One-pole (6 dB/oct) lowpass smoother.
///
/// Difference equation `y[n] = x[n] + coeff * (y[n-1] - x[n])` with
/// `coeff = exp(-2π * cutoff / sample_rate)`. `coeff` stays in [0, 1) for
/// stable operation; state below 1e-20 is flushed to zero.
#[derive(Debug, Clone)]
pub struct OnePoleSmoother {
    state: f32,
    coeff: f32,
    cutoff_hz: f32,
    sample_rate: f32,
}

impl OnePoleSmoother {
    /// Creates a smoother with the given cutoff at the given rate.
    pub fn new(sample_rate: f32, cutoff_hz: f32) -> Self {
        let mut smoother = Self {
            state: 0.0,
            coeff: 0.0,
            cutoff_hz,
            sample_rate,
        };
        smoother.recalculate_coeff();
        smoother
    }

    /// Sets the cutoff frequency in Hz.
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        self.cutoff_hz = cutoff_hz;
        self.recalculate_coeff();
    }

    /// Sets the sample rate, keeping the cutoff.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    /// Clears the filter state.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    /// Current filter state (the last output).
    #[inline]
    pub fn state(&self) -> f32 {
        self.state
    }

    /// Filters one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state = input + self.coeff * (self.state - input);
        if self.state.abs() < 1e-20 {
            self.state = 0.0;
        }
        self.state
    }

    fn recalculate_coeff(&mut self) {
        if self.cutoff_hz <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 0.0;
        } else {
            self.coeff =
                expf(-2.0 * core::f32::consts::PI * self.cutoff_hz / self.sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_reaches_target_in_window() {
        let mut ramp = LinearRamp::new(0.0, 48000.0, 0.010);
        ramp.set_target(1.0);

        let samples = (48000.0 * 0.010) as usize;
        for _ in 0..samples {
            ramp.advance();
        }
        assert!((ramp.get() - 1.0).abs() < 1e-5);
        assert!(ramp.is_settled());
    }

    #[test]
    fn ramp_constant_rate_midpoint() {
        let mut ramp = LinearRamp::new(0.0, 48000.0, 0.010);
        ramp.set_target(1.0);

        for _ in 0..(48000.0 * 0.005) as usize {
            ramp.advance();
        }
        assert!((ramp.get() - 0.5).abs() < 0.01);
    }

    #[test]
    fn ramp_zero_window_is_instant() {
        let mut ramp = LinearRamp::new(0.2, 48000.0, 0.0);
        ramp.set_target(0.9);
        assert!((ramp.advance() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn ramp_repeated_target_does_not_restart_the_window() {
        let mut ramp = LinearRamp::new(0.0, 48000.0, 0.005);
        ramp.set_target(1.0);

        // A value node repeats its target at every block boundary; the
        // 240-sample window must still complete on schedule.
        let mut advanced = 0;
        while !ramp.is_settled() {
            ramp.set_target(1.0);
            for _ in 0..64 {
                ramp.advance();
                advanced += 1;
            }
            assert!(advanced <= 320, "ramp never settles: {advanced} samples");
        }
        assert!((ramp.get() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn ramp_retarget_mid_transition_is_continuous() {
        let mut ramp = LinearRamp::new(0.0, 48000.0, 0.010);
        ramp.set_target(1.0);
        for _ in 0..100 {
            ramp.advance();
        }
        let before = ramp.get();
        ramp.set_target(-1.0);
        let after = ramp.advance();
        assert!(
            (after - before).abs() < 0.01,
            "retarget must not step: {before} -> {after}"
        );
    }

    #[test]
    fn smoother_settles_on_constant_input() {
        let mut lp = OnePoleSmoother::new(48000.0, 500.0);
        let mut last = 0.0;
        for _ in 0..48000 {
            last = lp.process(1.0);
        }
        assert!((last - 1.0).abs() < 1e-3);
    }

    #[test]
    fn smoother_rounds_off_steps() {
        let mut lp = OnePoleSmoother::new(48000.0, 500.0);
        let first = lp.process(1.0);
        assert!(first < 0.1, "a full-scale step must be heavily attenuated");
    }
}

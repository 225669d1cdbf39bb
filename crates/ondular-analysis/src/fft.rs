//! FFT wrapper over rustfft for real signals.

use rustfft::{FftPlanner, num_complex::Complex};
use std::sync::Arc;

use crate::Window;

/// FFT processor with cached plans for one transform size.
pub struct Fft {
    planner: FftPlanner<f32>,
    fft: Arc<dyn rustfft::Fft<f32>>,
    ifft: Arc<dyn rustfft::Fft<f32>>,
    size: usize,
}

impl Fft {
    /// Creates a processor for the given transform size.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);
        Self {
            planner,
            fft,
            ifft,
            size,
        }
    }

    /// Transform size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Switches to a new transform size, replanning if needed.
    pub fn resize(&mut self, size: usize) {
        if size != self.size {
            self.fft = self.planner.plan_fft_forward(size);
            self.ifft = self.planner.plan_fft_inverse(size);
            self.size = size;
        }
    }

    /// Forward FFT of a real signal, padded or truncated to the transform
    /// size. Returns the positive-frequency half spectrum
    /// (`size / 2 + 1` bins, DC through Nyquist).
    pub fn forward(&self, input: &[f32]) -> Vec<Complex<f32>> {
        let mut buffer: Vec<Complex<f32>> =
            input.iter().map(|&x| Complex::new(x, 0.0)).collect();
        buffer.resize(self.size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        buffer.truncate(self.size / 2 + 1);
        buffer
    }

    /// Windows a frame with the given analysis window, then transforms it.
    pub fn forward_windowed(&self, input: &[f32], window: Window) -> Vec<Complex<f32>> {
        let mut frame = input.to_vec();
        frame.resize(self.size, 0.0);
        for (sample, w) in frame
            .iter_mut()
            .zip(window.periodic_coefficients(self.size))
        {
            *sample *= w;
        }
        self.forward(&frame)
    }

    /// Inverse FFT of a half spectrum back to a real signal, assuming
    /// conjugate symmetry for the negative frequencies.
    pub fn inverse(&self, spectrum: &[Complex<f32>]) -> Vec<f32> {
        let mut buffer = vec![Complex::new(0.0, 0.0); self.size];
        let bins = spectrum.len().min(self.size / 2 + 1);
        buffer[..bins].copy_from_slice(&spectrum[..bins]);
        for i in 1..bins {
            if i < self.size - i {
                buffer[self.size - i] = spectrum[i].conj();
            }
        }

        self.ifft.process(&mut buffer);

        let scale = 1.0 / self.size as f32;
        buffer.iter().map(|c| c.re * scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn forward_then_inverse_reconstructs_the_signal() {
        let fft = Fft::new(256);
        let input: Vec<f32> = (0..256)
            .map(|i| (2.0 * PI * 10.0 * i as f32 / 256.0).sin())
            .collect();

        let spectrum = fft.forward(&input);
        assert_eq!(spectrum.len(), 129);
        let reconstructed = fft.inverse(&spectrum);

        for (a, b) in input.iter().zip(reconstructed.iter()) {
            assert!((a - b).abs() < 0.01, "mismatch: {a} vs {b}");
        }
    }

    #[test]
    fn dc_lands_in_bin_zero() {
        let fft = Fft::new(256);
        let spectrum = fft.forward(&vec![1.0; 256]);

        let dc_mag = spectrum[0].norm();
        let other_mag: f32 = spectrum[1..].iter().map(|c| c.norm()).sum();
        assert!(dc_mag > other_mag * 10.0);
    }

    #[test]
    fn pure_tone_peaks_at_its_bin() {
        let fft = Fft::new(128);
        let input: Vec<f32> = (0..128)
            .map(|i| (2.0 * PI * 16.0 * i as f32 / 128.0).cos())
            .collect();

        let spectrum = fft.forward_windowed(&input, Window::Hann);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 16);
    }

    #[test]
    fn resize_replans_and_changes_output_length() {
        let mut fft = Fft::new(64);
        assert_eq!(fft.forward(&[1.0]).len(), 33);
        fft.resize(128);
        assert_eq!(fft.size(), 128);
        assert_eq!(fft.forward(&[1.0]).len(), 65);
    }
}

//! Analysis window generation.

use std::f32::consts::PI;

/// Window function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Rectangular (no windowing).
    Rectangular,
    /// Hann window (raised cosine).
    Hann,
    /// Hamming window.
    Hamming,
    /// Blackman window.
    Blackman,
    /// Blackman-Harris window (better sidelobe suppression).
    BlackmanHarris,
}

impl Window {
    fn value(self, x: f32) -> f32 {
        match self {
            Window::Rectangular => 1.0,
            Window::Hann => 0.5 * (1.0 - x.cos()),
            Window::Hamming => 0.54 - 0.46 * x.cos(),
            Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            Window::BlackmanHarris => {
                0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos()
                    - 0.01168 * (3.0 * x).cos()
            }
        }
    }

    /// Symmetric window coefficients: first and last sample mirror each
    /// other. Use for filter design and one-shot spectra.
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        if len <= 1 {
            return vec![1.0; len];
        }
        let denom = (len - 1) as f32;
        (0..len)
            .map(|i| self.value(2.0 * PI * i as f32 / denom))
            .collect()
    }

    /// Periodic (DFT-even) coefficients: one period of the window, as if
    /// `len + 1` symmetric samples had their last dropped. Use for STFT
    /// framing where hops overlap-add.
    pub fn periodic_coefficients(self, len: usize) -> Vec<f32> {
        if len == 0 {
            return Vec::new();
        }
        let denom = len as f32;
        (0..len)
            .map(|i| self.value(2.0 * PI * i as f32 / denom))
            .collect()
    }

    /// Multiplies the buffer by the symmetric window in place.
    pub fn apply(self, buffer: &mut [f32]) {
        if self == Window::Rectangular {
            return;
        }
        let coeffs = self.coefficients(buffer.len());
        for (sample, w) in buffer.iter_mut().zip(coeffs) {
            *sample *= w;
        }
    }

    /// Average overlap-add gain of the periodic window at the given hop.
    /// Divide reconstructed frames by this to normalize an STFT round trip.
    pub fn overlap_gain(self, len: usize, hop: usize) -> f32 {
        assert!(hop > 0 && hop <= len, "hop must be in 1..=len");
        let w = self.periodic_coefficients(len);
        let mut acc = vec![0.0f32; hop];
        let mut offset = 0;
        while offset < len {
            for (i, slot) in acc.iter_mut().enumerate() {
                if offset + i < len {
                    *slot += w[offset + i];
                }
            }
            offset += hop;
        }
        acc.iter().sum::<f32>() / hop as f32
    }
}

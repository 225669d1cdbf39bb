//! Offline analysis helpers for ondular: window generation and FFT.
//!
//! [`Window`] generates symmetric or periodic (DFT-even) coefficient sets
//! for the common analysis windows; [`Fft`] wraps rustfft for real signals
//! with half-spectrum output and windowed framing.

mod fft;
mod window;

pub use fft::Fft;
pub use window::Window;

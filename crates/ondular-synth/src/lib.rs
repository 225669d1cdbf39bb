//! Sound-generating nodes for the ondular signal graph.
//!
//! Three families live here:
//!
//! - [`AdsrNode`] — an attack-decay-sustain-release envelope, driveable by
//!   hand or by note events from an `ondular-midi` manager.
//! - [`Wavetable`] and [`WavetableNode`] — multi-cycle waveform grids with
//!   bilinear lookup, loadable from in-memory cycles or mono WAV assets.
//! - [`Phasor`] — a phase accumulator whose frequency is itself a signal.
//!
//! A typical voice chains a note-frequency node into a [`Phasor`], the
//! phasor into a [`WavetableNode`], and multiplies by an [`AdsrNode`].

mod envelope;
mod oscillator;
mod wavetable;

pub use envelope::{AdsrNode, DEFAULT_ENVELOPE_CUTOFF, EnvStage};
pub use oscillator::Phasor;
pub use wavetable::{Wavetable, WavetableNode, WrapMode};

/// Error types for synthesis nodes and wavetable assets.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    /// Graph-level error (invalid range, malformed table, rate trouble).
    #[error(transparent)]
    Graph(#[from] ondular_graph::GraphError),

    /// WAV asset could not be read.
    #[error("wavetable asset error: {0}")]
    Asset(#[from] ondular_io::Error),
}

/// Convenience result type for synthesis operations.
pub type Result<T> = std::result::Result<T, SynthError>;

//! Audio file I/O for the ondular signal graph.
//!
//! This crate reads and writes WAV files with [`hound`], normalizing
//! everything to f32 on the way in:
//!
//! - [`read_wav`] loads interleaved samples plus a [`WavSpec`]
//! - [`read_wav_mono`] averages multi-channel files down to one channel
//! - [`read_wav_info`] extracts metadata without loading sample data
//! - [`write_wav_mono`] saves a mono buffer as float or quantized PCM

mod wav;

pub use wav::{
    WavFormat, WavInfo, WavSpec, read_wav, read_wav_info, read_wav_mono, write_wav_mono,
};

/// Error types for audio file operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio file operations.
pub type Result<T> = std::result::Result<T, Error>;

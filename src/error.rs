//! Error types shared across the measurement pipeline.

use thiserror::Error;

/// Failures reported by the audio capture collaborator.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input devices available: {0}")]
    NoDevice(String),

    #[error("input device '{0}' not found")]
    DeviceNotFound(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to open capture stream: {0}")]
    StreamCreationFailed(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("audio stream disconnected")]
    Disconnected,

    #[error("capture failed {failures} times in a row; last error: {last}")]
    RetryBudgetExceeded { failures: u32, last: String },
}

/// Failures writing to one of the persistence sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV writer failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("PCM frame has odd length {0}; expected whole 16-bit samples")]
    PartialFrame(usize),

    #[error("sink already finalized")]
    Finalized,
}

/// Invalid configuration detected before any stream is opened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid preset '{0}' (expected hifi, midfi or lofi)")]
    InvalidPreset(String),

    #[error("{flag} must be between {min} and {max}, got {value}")]
    OutOfRange {
        flag: &'static str,
        min: String,
        max: String,
        value: String,
    },

    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

/// Fatal outcome of a metering run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("aggregation worker panicked")]
    WorkerPanicked,
}

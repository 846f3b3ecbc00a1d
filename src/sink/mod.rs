//! Persistence sinks fed by the aggregation worker.
//!
//! Both sinks are optional. The worker owns them exclusively, so they only need
//! to be `Send`, never `Sync`.

pub mod csv;
pub mod wav;

use crate::aggregator::Measurement;
use crate::config::MeterConfig;
use crate::error::SinkError;
use tracing::info;

pub use self::csv::{CsvMeasurementSink, CSV_HEADER};
pub use self::wav::WavAudioSink;

/// Receives little-endian 16-bit PCM frames, once per packet.
pub trait AudioSink: Send {
    fn write(&mut self, frame: &[u8]) -> Result<(), SinkError>;

    /// Close out the container. Calling it twice is harmless.
    fn finalize(&mut self) -> Result<(), SinkError>;
}

/// Receives one record per completed window.
pub trait MeasurementSink: Send {
    fn append(&mut self, measurement: &Measurement) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError>;
}

/// The optional outputs of a run.
#[derive(Default)]
pub struct Sinks {
    pub audio: Option<Box<dyn AudioSink>>,
    pub measurements: Option<Box<dyn MeasurementSink>>,
}

impl Sinks {
    pub fn none() -> Self {
        Self::default()
    }

    /// Create the file-backed sinks enabled in `config`.
    pub fn from_config(config: &MeterConfig) -> Result<Self, SinkError> {
        let mut sinks = Self::none();
        if let Some(path) = config.wave_path.as_deref() {
            info!(path = %path.display(), sample_rate = config.sample_rate, "writing WAV audio");
            sinks.audio = Some(Box::new(WavAudioSink::create(path, config.sample_rate)?));
        }
        if let Some(path) = config.csv_path.as_deref() {
            info!(path = %path.display(), "writing CSV measurements");
            sinks.measurements = Some(Box::new(CsvMeasurementSink::create(path)?));
        }
        Ok(sinks)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sinks for worker and lifecycle tests.

    use super::{AudioSink, MeasurementSink};
    use crate::aggregator::Measurement;
    use crate::error::SinkError;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub(crate) struct RecordingAudio {
        pub(crate) bytes: Arc<Mutex<Vec<u8>>>,
        pub(crate) writes: Arc<Mutex<usize>>,
        pub(crate) finalized: Arc<Mutex<bool>>,
    }

    impl AudioSink for RecordingAudio {
        fn write(&mut self, frame: &[u8]) -> Result<(), SinkError> {
            self.bytes.lock().unwrap().extend_from_slice(frame);
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }

        fn finalize(&mut self) -> Result<(), SinkError> {
            *self.finalized.lock().unwrap() = true;
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct RecordingMeasurements {
        pub(crate) records: Arc<Mutex<Vec<Measurement>>>,
        pub(crate) flushed: Arc<Mutex<bool>>,
    }

    impl MeasurementSink for RecordingMeasurements {
        fn append(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
            self.records.lock().unwrap().push(*measurement);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), SinkError> {
            *self.flushed.lock().unwrap() = true;
            Ok(())
        }
    }

    /// Audio sink whose writes always fail.
    pub(crate) struct FailingAudio {
        pub(crate) finalized: Arc<Mutex<bool>>,
    }

    impl AudioSink for FailingAudio {
        fn write(&mut self, _frame: &[u8]) -> Result<(), SinkError> {
            Err(SinkError::Io(io::Error::new(io::ErrorKind::Other, "disk full")))
        }

        fn finalize(&mut self) -> Result<(), SinkError> {
            *self.finalized.lock().unwrap() = true;
            Ok(())
        }
    }
}

//! Flat per-window measurement log.

use super::MeasurementSink;
use crate::aggregator::Measurement;
use crate::error::SinkError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column order matches the fields of [`Measurement`].
pub const CSV_HEADER: &str = "TimeStamp(NS),dB,RMS,Average,NumberOfSamples";

pub struct CsvMeasurementSink<W: Write> {
    out: BufWriter<W>,
}

impl CsvMeasurementSink<File> {
    /// Create (or truncate) `path` and write the header line.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Self::new(file)
    }
}

impl<W: Write> CsvMeasurementSink<W> {
    pub fn new(inner: W) -> Result<Self, SinkError> {
        let mut out = BufWriter::new(inner);
        writeln!(out, "{CSV_HEADER}")?;
        Ok(Self { out })
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.out
            .into_inner()
            .map_err(|err| SinkError::Io(err.into_error()))
    }
}

impl<W: Write + Send> MeasurementSink for CsvMeasurementSink<W> {
    fn append(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        writeln!(self.out, "{}", format_record(measurement))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}

pub fn format_record(m: &Measurement) -> String {
    format!(
        "{},{:.6},{:.6},{:.6},{}",
        m.window_end_ns, m.decibel_proxy, m.rms, m.average_power, m.sample_count
    )
}
